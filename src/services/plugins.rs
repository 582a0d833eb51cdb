//! Extension hooks invoked around order creation.
//!
//! Deployments plug tax providers, webhooks and notification channels in
//! behind this trait; the core flow only cares about the failure surface.

use crate::checkout::draft::OrderDraft;
use crate::checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
use crate::entities::order;
use crate::errors::CheckoutError;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait PluginHooks: Send + Sync {
    /// Last chance to reject the draft before anything is persisted. External
    /// tax providers surface their failures here as [`CheckoutError::TaxError`].
    async fn preprocess_order_creation(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
        draft: &OrderDraft,
    ) -> Result<(), CheckoutError>;

    /// Fired after the order row is committed.
    async fn order_created(&self, order: &order::Model);

    async fn send_order_confirmation(&self, order: &order::Model, recipient: &str);
}

/// Default wiring with no external integrations.
pub struct NoopHooks;

#[async_trait]
impl PluginHooks for NoopHooks {
    async fn preprocess_order_creation(
        &self,
        _info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
        _draft: &OrderDraft,
    ) -> Result<(), CheckoutError> {
        Ok(())
    }

    async fn order_created(&self, order: &order::Model) {
        debug!(order_id = %order.id, "order created");
    }

    async fn send_order_confirmation(&self, order: &order::Model, recipient: &str) {
        debug!(order_id = %order.id, %recipient, "order confirmation suppressed");
    }
}
