//! Checkout completion core.
//!
//! Converts a mutable checkout session into an immutable order: pricing
//! snapshots, stock reservation and allocation under contention, voucher and
//! gift card accounting, payment orchestration and idempotent order
//! materialization. External concerns (tax calculation, the payment gateway
//! protocol, notifications) are consumed through collaborator traits.
//!
//! The entry point is [`CheckoutCompletionService`], wired from a database
//! connection, configuration and the collaborator implementations:
//!
//! ```no_run
//! use checkout_core::{
//!     establish_connection, CheckoutCompletionService, CheckoutConfig,
//!     CompleteCheckoutParams, FlatRatePricing, NoopHooks,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(gateway: Arc<dyn checkout_core::PaymentGateway>, token: uuid::Uuid)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let config = CheckoutConfig::load()?;
//! let db = establish_connection(&config).await?;
//! let (events, receiver) = checkout_core::events::channel(128);
//! tokio::spawn(checkout_core::events::process_events(receiver));
//!
//! let service = CheckoutCompletionService::new(
//!     db,
//!     config,
//!     Arc::new(FlatRatePricing::tax_free()),
//!     gateway,
//!     Arc::new(NoopHooks),
//!     events,
//! );
//! let outcome = service
//!     .complete_checkout(token, CompleteCheckoutParams::default())
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod money;
pub mod services;

pub use checkout::completion::{
    CheckoutCompletionService, CompleteCheckoutParams, CompletionOutcome,
};
pub use checkout::draft::OrderDraft;
pub use checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
pub use checkout::locks::CheckoutLocks;
pub use config::CheckoutConfig;
pub use db::{create_schema, establish_connection};
pub use errors::{CheckoutError, CheckoutErrorCode, StockShortfall, ValidationFailure};
pub use events::{CommitHooks, Event, EventSender};
pub use money::TaxedMoney;
pub use services::payments::{PaymentGateway, TransactionResult};
pub use services::plugins::{NoopHooks, PluginHooks};
pub use services::pricing::{FlatRatePricing, PriceSnapshot, PricingEngine, ShippingSnapshot};
