//! Checkout completion: enriched views, the order draft and the orchestrator.

pub mod completion;
pub mod draft;
pub mod fetch;
pub mod locks;
