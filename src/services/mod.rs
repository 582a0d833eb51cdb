//! Domain services consumed by the completion orchestrator.

pub mod customers;
pub mod gift_cards;
pub mod orders;
pub mod payments;
pub mod plugins;
pub mod pricing;
pub mod stock;
pub mod vouchers;
