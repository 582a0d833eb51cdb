//! Checkout completion orchestrator.
//!
//! Two strategies convert a checkout into an order:
//!
//! * **Transaction flow** — payment evidence already exists as transaction
//!   rows (or the channel tolerates unpaid orders). The order is materialized
//!   directly under the checkout lock; the voucher increment runs in its own
//!   short transaction beforehand so a later failure can compensate without
//!   touching order rows.
//! * **Payment flow** — three separately locked phases. Phase one fixes
//!   prices, consumes the voucher and leaves bridging reservations; phase two
//!   calls the gateway with no lock held; phase three re-locks and
//!   materializes, or compensates (release usage, refund/void) when the order
//!   cannot be created.
//!
//! Every domain failure is translated into a field-coded validation error at
//! this boundary; duplicate completion races resolve to the existing order.

use crate::checkout::draft::{build_order_draft, OrderDraft};
use crate::checkout::fetch::{
    fetch_checkout, fetch_checkout_info, fetch_checkout_lines, CheckoutInfo, CheckoutLineInfo,
};
use crate::checkout::locks::CheckoutLocks;
use crate::config::CheckoutConfig;
use crate::entities::channel::MarkAsPaidStrategy;
use crate::entities::checkout::AuthorizeStatus;
use crate::entities::{checkout, checkout_gift_card, checkout_line, order, payment, reservation};
use crate::errors::{CheckoutError, CheckoutErrorCode};
use crate::events::{CommitHooks, Event, EventSender};
use crate::services::payments::{self, PaymentGateway};
use crate::services::plugins::PluginHooks;
use crate::services::pricing::PricingEngine;
use crate::services::stock;
use crate::services::vouchers;
use crate::services::{customers, gift_cards, orders};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde_json::{Map, Value as Json};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Result of a completion attempt. `order` is `None` only when the payment
/// demands further customer action or a refund is already in progress.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub order: Option<order::Model>,
    pub action_required: bool,
    pub action_data: Json,
}

impl CompletionOutcome {
    fn order(order: order::Model) -> Self {
        Self {
            order: Some(order),
            action_required: false,
            action_data: Json::Object(Map::new()),
        }
    }

    fn action_required(action_data: Json) -> Self {
        Self {
            order: None,
            action_required: true,
            action_data,
        }
    }

    fn aborted() -> Self {
        Self {
            order: None,
            action_required: false,
            action_data: Json::Object(Map::new()),
        }
    }
}

/// Caller-supplied completion options.
#[derive(Debug, Clone, Default)]
pub struct CompleteCheckoutParams {
    pub redirect_url: Option<String>,
    pub store_payment_method: bool,
    pub metadata: Option<Json>,
    pub private_metadata: Option<Json>,
}

struct PaymentPhaseState {
    draft: OrderDraft,
    payment: Option<payment::Model>,
}

enum PostPaymentStep {
    /// Checkout gone, another attempt won the race.
    ExistingOrder,
    ActionRequired,
    RefundOngoing,
    Created(order::Model),
}

pub struct CheckoutCompletionService {
    db: DatabaseConnection,
    config: CheckoutConfig,
    pricing: Arc<dyn PricingEngine>,
    gateway: Arc<dyn PaymentGateway>,
    plugins: Arc<dyn PluginHooks>,
    events: EventSender,
    locks: CheckoutLocks,
}

impl CheckoutCompletionService {
    pub fn new(
        db: DatabaseConnection,
        config: CheckoutConfig,
        pricing: Arc<dyn PricingEngine>,
        gateway: Arc<dyn PaymentGateway>,
        plugins: Arc<dyn PluginHooks>,
        events: EventSender,
    ) -> Self {
        Self {
            db,
            config,
            pricing,
            gateway,
            plugins,
            events,
            locks: CheckoutLocks::new(),
        }
    }

    /// Completes a checkout, choosing the transaction or payment flow from
    /// the checkout's payment state and channel configuration.
    #[instrument(skip(self, params), fields(checkout = %token))]
    pub async fn complete_checkout(
        &self,
        token: Uuid,
        params: CompleteCheckoutParams,
    ) -> Result<CompletionOutcome, CheckoutError> {
        self.complete_checkout_inner(token, params)
            .await
            .map_err(CheckoutError::into_validation)
    }

    /// Transaction-flow entry point: materializes the order for a checkout
    /// whose payment evidence already exists. `delete_checkout` keeps the
    /// checkout row around when the caller needs it post-creation.
    #[instrument(skip(self, metadata, private_metadata), fields(checkout = %token))]
    pub async fn create_order_from_checkout(
        &self,
        token: Uuid,
        delete_checkout: bool,
        metadata: Option<Json>,
        private_metadata: Option<Json>,
    ) -> Result<order::Model, CheckoutError> {
        self.create_order_inner(token, delete_checkout, metadata, private_metadata)
            .await
            .map_err(CheckoutError::into_validation)
    }

    /// Maintenance: drops reservations whose hold expired.
    pub async fn cleanup_expired_reservations(&self) -> Result<u64, CheckoutError> {
        stock::cleanup_expired_reservations(&self.db).await
    }

    async fn complete_checkout_inner(
        &self,
        token: Uuid,
        params: CompleteCheckoutParams,
    ) -> Result<CompletionOutcome, CheckoutError> {
        let Some(checkout_row) = fetch_checkout(&self.db, token, false).await? else {
            return Ok(CompletionOutcome::order(self.existing_order(token).await?));
        };
        let mut info = fetch_checkout_info(&self.db, checkout_row).await?;
        validate_channel(&info)?;

        if let Some(redirect_url) = &params.redirect_url {
            validate_redirect_url(redirect_url)?;
            let mut active: checkout::ActiveModel = info.checkout.clone().into();
            active.redirect_url = Set(Some(redirect_url.clone()));
            active.last_change = Set(Utc::now());
            info.checkout = active.update(&self.db).await?;
        }

        let lines = fetch_checkout_lines(&self.db, &info.checkout).await?;
        if lines.is_empty() {
            return Err(CheckoutError::validation(
                "lines",
                CheckoutErrorCode::NotFound,
                "Cannot complete checkout without lines.",
            ));
        }
        validate_checkout_ready(&info, &lines)?;
        customers::assign_checkout_user(&self.db, &mut info).await?;

        let has_transactions = payments::has_payment_transactions(&self.db, token).await?;
        let balance = gift_cards::gift_cards_balance(&self.db, &info.checkout).await?;
        let total = self
            .pricing
            .total_with_gift_cards(&info, &lines, balance)
            .await?;
        let strategy = info.channel.order_mark_as_paid_strategy;

        let take_transaction_flow = has_transactions
            || info.channel.allow_unpaid_orders
            || (total.gross.is_zero() && strategy == MarkAsPaidStrategy::TransactionFlow);

        if take_transaction_flow {
            if !info.channel.allow_unpaid_orders
                && info.checkout.authorize_status != AuthorizeStatus::Full
            {
                return Err(CheckoutError::validation(
                    "id",
                    CheckoutErrorCode::CheckoutNotFullyPaid,
                    "The authorized amount doesn't cover the checkout's total amount.",
                ));
            }
            let order = self
                .create_order_inner(token, true, params.metadata, params.private_metadata)
                .await?;
            return Ok(CompletionOutcome::order(order));
        }

        self.complete_with_payment(token, params).await
    }

    // --- transaction flow -------------------------------------------------

    async fn create_order_inner(
        &self,
        token: Uuid,
        delete_checkout: bool,
        metadata: Option<Json>,
        private_metadata: Option<Json>,
    ) -> Result<order::Model, CheckoutError> {
        let Some(checkout_row) = fetch_checkout(&self.db, token, false).await? else {
            return self.existing_order(token).await;
        };
        let mut info = fetch_checkout_info(&self.db, checkout_row).await?;
        validate_channel(&info)?;
        let lines = fetch_checkout_lines(&self.db, &info.checkout).await?;
        if lines.is_empty() {
            return Err(CheckoutError::validation(
                "lines",
                CheckoutErrorCode::NotFound,
                "Cannot complete checkout without lines.",
            ));
        }
        gift_cards::validate_gift_cards(&self.db, &info.checkout).await?;
        vouchers::get_voucher_for_checkout(&self.db, &info, false).await?;
        customers::assign_checkout_user(&self.db, &mut info).await?;
        let email = info.customer_email();

        // The voucher increment commits on its own so a later materialization
        // failure can compensate without undoing order rows.
        let voucher_txn = self.db.begin().await?;
        let voucher_code = vouchers::increase_voucher_usage(&voucher_txn, &info).await?;
        voucher_txn.commit().await?;
        if let Some(code) = &voucher_code {
            self.emit(Event::VoucherUsageIncreased { code: code.clone() })
                .await;
        }

        let _guard = self.locks.acquire(token).await;
        let txn = self.db.begin().await?;
        let mut commit_hooks = CommitHooks::new();
        let materialized = self
            .materialize_transaction_flow(
                &txn,
                token,
                voucher_code.as_deref(),
                delete_checkout,
                metadata,
                private_metadata,
                &mut commit_hooks,
            )
            .await;

        match materialized {
            Ok(Some(order)) => {
                if let Err(err) = txn.commit().await {
                    commit_hooks.discard();
                    self.release_voucher(voucher_code.as_deref(), email.as_deref())
                        .await;
                    return Err(err.into());
                }
                if delete_checkout {
                    self.locks.forget(token);
                }
                commit_hooks.dispatch().await;
                self.emit(Event::CheckoutCompleted {
                    checkout_token: token,
                    order_id: order.id,
                })
                .await;
                Ok(order)
            }
            Ok(None) => {
                rollback_quietly(txn).await;
                commit_hooks.discard();
                // Another attempt materialized and deleted the checkout;
                // return its usage and hand back the existing order.
                self.release_voucher(voucher_code.as_deref(), email.as_deref())
                    .await;
                self.existing_order(token).await
            }
            Err(err) => {
                rollback_quietly(txn).await;
                commit_hooks.discard();
                self.release_voucher(voucher_code.as_deref(), email.as_deref())
                    .await;
                Err(err)
            }
        }
    }

    /// Locked part of the transaction flow: fresh re-fetch, draft, order
    /// materialization and checkout deletion. `Ok(None)` means the checkout
    /// disappeared before the lock was held.
    async fn materialize_transaction_flow(
        &self,
        txn: &DatabaseTransaction,
        token: Uuid,
        voucher_code: Option<&str>,
        delete_checkout: bool,
        metadata: Option<Json>,
        private_metadata: Option<Json>,
        commit_hooks: &mut CommitHooks,
    ) -> Result<Option<order::Model>, CheckoutError> {
        let Some(fresh) = fetch_checkout(txn, token, true).await? else {
            return Ok(None);
        };
        let mut info = fetch_checkout_info(txn, fresh).await?;
        let lines = fetch_checkout_lines(txn, &info.checkout).await?;
        customers::assign_checkout_user(txn, &mut info).await?;

        let mut draft = build_order_draft(
            txn,
            self.pricing.as_ref(),
            self.plugins.as_ref(),
            &info,
            &lines,
            false,
            true,
        )
        .await?;
        draft.voucher_code = voucher_code.map(str::to_string);

        let order = orders::create_order_from_draft(
            txn,
            orders::OrderCreationInput {
                info: &info,
                lines: &lines,
                draft: &draft,
                transaction_flow: true,
                metadata,
                private_metadata,
            },
            &self.plugins,
            &self.events,
            commit_hooks,
        )
        .await?;

        if delete_checkout {
            delete_checkout_rows(txn, &lines, token).await?;
        }
        Ok(Some(order))
    }

    // --- payment flow -----------------------------------------------------

    async fn complete_with_payment(
        &self,
        token: Uuid,
        params: CompleteCheckoutParams,
    ) -> Result<CompletionOutcome, CheckoutError> {
        // Phase 1, locked: fix prices, consume voucher, reserve stock.
        let Some(state) = self.payment_flow_prepare(token).await? else {
            return Ok(CompletionOutcome::order(self.existing_order(token).await?));
        };
        let email = if state.draft.user_email.is_empty() {
            None
        } else {
            Some(state.draft.user_email.clone())
        };

        // Phase 2, unlocked: the gateway call may block for seconds.
        let mut action_required = false;
        let mut action_data = Json::Object(Map::new());
        if let Some(payment_row) = &state.payment {
            let processed = payments::process_checkout_payment(
                &self.db,
                self.gateway.as_ref(),
                payment_row,
                token,
                state.draft.total.gross,
                params.store_payment_method,
            )
            .await;
            let result = match processed {
                Ok(result) => result,
                Err(err) => {
                    self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                        .await;
                    return Err(err);
                }
            };
            self.emit(Event::PaymentProcessed {
                payment_id: payment_row.id,
                success: result.is_success,
            })
            .await;
            action_required = result.action_required;
            action_data = result.action_required_data;

            // A payment deactivated mid-call must not fund an order.
            let refreshed = payment::Entity::find_by_id(payment_row.id)
                .one(&self.db)
                .await?;
            if let Some(refreshed) = refreshed {
                if !refreshed.is_active {
                    payments::refund_or_void_payment(
                        &self.db,
                        self.gateway.as_ref(),
                        &refreshed,
                        token,
                    )
                    .await?;
                    self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                        .await;
                    return Err(CheckoutError::validation(
                        "payment",
                        CheckoutErrorCode::InactivePayment,
                        "Provided payment method is inactive.",
                    ));
                }
            }
        }

        // Phase 3, re-locked: materialize or compensate.
        let _guard = self.locks.acquire(token).await;
        let txn = self.db.begin().await?;
        let mut commit_hooks = CommitHooks::new();
        let step = self
            .payment_flow_materialize(
                &txn,
                token,
                &state.draft,
                state.payment.as_ref(),
                action_required,
                &params,
                &mut commit_hooks,
            )
            .await;

        match step {
            Ok(PostPaymentStep::Created(order)) => {
                if let Err(err) = txn.commit().await {
                    commit_hooks.discard();
                    self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                        .await;
                    return Err(err.into());
                }
                self.locks.forget(token);
                commit_hooks.dispatch().await;
                self.emit(Event::CheckoutCompleted {
                    checkout_token: token,
                    order_id: order.id,
                })
                .await;
                Ok(CompletionOutcome::order(order))
            }
            Ok(PostPaymentStep::ExistingOrder) => {
                rollback_quietly(txn).await;
                commit_hooks.discard();
                self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                    .await;
                Ok(CompletionOutcome::order(self.existing_order(token).await?))
            }
            Ok(PostPaymentStep::ActionRequired) => {
                txn.commit().await?;
                commit_hooks.discard();
                self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                    .await;
                info!(checkout = %token, "payment requires further customer action");
                Ok(CompletionOutcome::action_required(action_data))
            }
            Ok(PostPaymentStep::RefundOngoing) => {
                txn.commit().await?;
                commit_hooks.discard();
                self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                    .await;
                warn!(checkout = %token, "refund in progress, order not created");
                Ok(CompletionOutcome::aborted())
            }
            Err(err) => {
                rollback_quietly(txn).await;
                commit_hooks.discard();
                self.release_voucher(state.draft.voucher_code.as_deref(), email.as_deref())
                    .await;
                // Money must not stay captured for an order that cannot exist.
                if let Some(payment_row) = &state.payment {
                    if let Err(refund_err) = payments::refund_or_void_payment(
                        &self.db,
                        self.gateway.as_ref(),
                        payment_row,
                        token,
                    )
                    .await
                    {
                        warn!(error = %refund_err, "refund after materialization failure failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Phase 1: under the checkout lock, re-fetch everything fresh, validate
    /// the payment preconditions, build the draft (consuming the voucher) and
    /// leave bridging reservations behind. Returns `None` when the checkout
    /// is already gone.
    async fn payment_flow_prepare(
        &self,
        token: Uuid,
    ) -> Result<Option<PaymentPhaseState>, CheckoutError> {
        let _guard = self.locks.acquire(token).await;
        let txn = self.db.begin().await?;
        match self.payment_flow_prepare_in_txn(&txn, token).await {
            Ok(Some(state)) => {
                txn.commit().await?;
                if self.config.reservations_enabled {
                    self.emit(Event::ReservationsCreated {
                        checkout_token: token,
                        count: state.draft.lines.len(),
                    })
                    .await;
                }
                if let Some(code) = &state.draft.voucher_code {
                    self.emit(Event::VoucherUsageIncreased { code: code.clone() })
                        .await;
                }
                Ok(Some(state))
            }
            Ok(None) => {
                rollback_quietly(txn).await;
                Ok(None)
            }
            Err(err) => {
                rollback_quietly(txn).await;
                // A pre-authorized payment must not keep holding funds when
                // the checkout cannot proceed to the gateway.
                self.refund_payment_if_any(token).await;
                Err(err)
            }
        }
    }

    /// Refunds or voids the checkout's last active payment, if there is one.
    /// Compensation trouble is logged and never masks the original failure.
    async fn refund_payment_if_any(&self, token: Uuid) {
        match payments::get_last_active_payment(&self.db, token).await {
            Ok(Some(payment_row)) => {
                if let Err(err) = payments::refund_or_void_payment(
                    &self.db,
                    self.gateway.as_ref(),
                    &payment_row,
                    token,
                )
                .await
                {
                    warn!(error = %err, "refund after preparation failure failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "payment lookup for compensation failed");
            }
        }
    }

    async fn payment_flow_prepare_in_txn(
        &self,
        txn: &DatabaseTransaction,
        token: Uuid,
    ) -> Result<Option<PaymentPhaseState>, CheckoutError> {
        let Some(fresh) = fetch_checkout(txn, token, true).await? else {
            return Ok(None);
        };
        let mut info = fetch_checkout_info(txn, fresh).await?;
        let lines = fetch_checkout_lines(txn, &info.checkout).await?;
        customers::assign_checkout_user(txn, &mut info).await?;

        let payment_row = payments::get_last_active_payment(txn, token).await?;

        let draft = build_order_draft(
            txn,
            self.pricing.as_ref(),
            self.plugins.as_ref(),
            &info,
            &lines,
            true,
            true,
        )
        .await?;

        if !draft.is_zero_total() {
            let Some(payment_row) = &payment_row else {
                return Err(CheckoutError::validation(
                    "payment",
                    CheckoutErrorCode::PaymentError,
                    "Provided payment methods can not cover the checkout's total amount",
                ));
            };
            payments::require_active_payment(payment_row, draft.total.gross)?;
        }

        if self.config.reservations_enabled {
            stock::reserve_stocks_without_availability_check(
                txn,
                &info,
                &lines,
                self.config.reserve_duration(),
            )
            .await?;
        }

        Ok(Some(PaymentPhaseState {
            draft,
            payment: payment_row,
        }))
    }

    /// Phase 3 body, inside the re-locked transaction. Prices were fixed in
    /// phase 1; only freshness and compensation decisions happen here.
    async fn payment_flow_materialize(
        &self,
        txn: &DatabaseTransaction,
        token: Uuid,
        draft: &OrderDraft,
        payment_row: Option<&payment::Model>,
        action_required: bool,
        params: &CompleteCheckoutParams,
        commit_hooks: &mut CommitHooks,
    ) -> Result<PostPaymentStep, CheckoutError> {
        let Some(fresh) = fetch_checkout(txn, token, true).await? else {
            return Ok(PostPaymentStep::ExistingOrder);
        };
        let mut info = fetch_checkout_info(txn, fresh).await?;

        // The voucher usage is consumed; the code must not apply twice.
        if info.checkout.voucher_code.is_some() {
            let mut active: checkout::ActiveModel = info.checkout.clone().into();
            active.voucher_code = Set(None);
            active.last_change = Set(Utc::now());
            info.checkout = active.update(txn).await?;
        }

        if action_required {
            return Ok(PostPaymentStep::ActionRequired);
        }
        if let Some(payment_row) = payment_row {
            if payments::is_refund_ongoing(txn, payment_row.id).await? {
                return Ok(PostPaymentStep::RefundOngoing);
            }
        }

        let lines = fetch_checkout_lines(txn, &info.checkout).await?;
        customers::assign_checkout_user(txn, &mut info).await?;

        let order = orders::create_order_from_draft(
            txn,
            orders::OrderCreationInput {
                info: &info,
                lines: &lines,
                draft,
                transaction_flow: false,
                metadata: params.metadata.clone(),
                private_metadata: params.private_metadata.clone(),
            },
            &self.plugins,
            &self.events,
            commit_hooks,
        )
        .await?;

        delete_checkout_rows(txn, &lines, token).await?;
        Ok(PostPaymentStep::Created(order))
    }

    // --- shared helpers ---------------------------------------------------

    async fn existing_order(&self, token: Uuid) -> Result<order::Model, CheckoutError> {
        orders::get_order_by_checkout_token(&self.db, token)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("Checkout {token}")))
    }

    async fn release_voucher(&self, code: Option<&str>, email: Option<&str>) {
        let Some(code) = code else {
            return;
        };
        match vouchers::release_voucher_usage(&self.db, Some(code), email).await {
            Ok(()) => {
                self.emit(Event::VoucherUsageReleased {
                    code: code.to_string(),
                })
                .await;
            }
            Err(err) => warn!(code, error = %err, "voucher usage release failed"),
        }
    }

    async fn emit(&self, event: Event) {
        if let Err(err) = self.events.send(event).await {
            warn!(error = %err, "event dropped");
        }
    }
}

async fn rollback_quietly(txn: DatabaseTransaction) {
    if let Err(err) = txn.rollback().await {
        warn!(error = %err, "transaction rollback failed");
    }
}

/// Removes the checkout and everything hanging off it once an order owns the
/// data: lines, the lines' reservations and gift card links.
async fn delete_checkout_rows<C: ConnectionTrait>(
    db: &C,
    lines: &[CheckoutLineInfo],
    token: Uuid,
) -> Result<(), CheckoutError> {
    let line_ids: Vec<Uuid> = lines.iter().map(|l| l.line.id).collect();
    if !line_ids.is_empty() {
        reservation::Entity::delete_many()
            .filter(reservation::Column::CheckoutLineId.is_in(line_ids.clone()))
            .exec(db)
            .await?;
        checkout_line::Entity::delete_many()
            .filter(checkout_line::Column::Id.is_in(line_ids))
            .exec(db)
            .await?;
    }
    checkout_gift_card::Entity::delete_many()
        .filter(checkout_gift_card::Column::CheckoutToken.eq(token))
        .exec(db)
        .await?;
    checkout::Entity::delete_by_id(token).exec(db).await?;
    Ok(())
}

fn validate_channel(info: &CheckoutInfo) -> Result<(), CheckoutError> {
    if !info.channel.is_active {
        return Err(CheckoutError::validation(
            "channel",
            CheckoutErrorCode::ChannelInactive,
            "Cannot complete checkout with inactive channel.",
        ));
    }
    Ok(())
}

fn validate_redirect_url(redirect_url: &str) -> Result<(), CheckoutError> {
    let parsed = Url::parse(redirect_url).map_err(|e| {
        CheckoutError::validation(
            "redirect_url",
            CheckoutErrorCode::InvalidRedirectUrl,
            format!("Invalid redirect url: {e}."),
        )
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CheckoutError::validation(
            "redirect_url",
            CheckoutErrorCode::InvalidRedirectUrl,
            "Invalid redirect url: unsupported scheme.",
        ));
    }
    Ok(())
}

/// Field-level readiness checks run before either flow starts.
fn validate_checkout_ready(
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
) -> Result<(), CheckoutError> {
    if info.customer_email().is_none() {
        return Err(CheckoutError::validation(
            "email",
            CheckoutErrorCode::EmailNotSet,
            "Email is required to complete checkout.",
        ));
    }
    if info.billing_address.is_none() {
        return Err(CheckoutError::validation(
            "billing_address",
            CheckoutErrorCode::BillingAddressNotSet,
            "Billing address is not set.",
        ));
    }

    let shipping_required = lines.iter().any(|l| l.variant.is_shipping_required);
    if shipping_required {
        if info.shipping_method.is_none() && info.collection_point.is_none() {
            return Err(CheckoutError::validation(
                "shipping_method",
                CheckoutErrorCode::ShippingMethodNotSet,
                "Shipping method is not set.",
            ));
        }
        if info.collection_point.is_none() && info.shipping_address.is_none() {
            return Err(CheckoutError::validation(
                "shipping_address",
                CheckoutErrorCode::ShippingAddressNotSet,
                "Shipping address is not set.",
            ));
        }
        if let Some(method) = &info.shipping_method {
            if method.channel_id != info.channel.id {
                return Err(CheckoutError::validation(
                    "shipping_method",
                    CheckoutErrorCode::InvalidShippingMethod,
                    "Shipping method is not valid for this checkout.",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_url_requires_http_scheme() {
        assert!(validate_redirect_url("https://shop.example.com/done").is_ok());
        assert!(validate_redirect_url("http://localhost:3000/done").is_ok());
        assert!(validate_redirect_url("ftp://shop.example.com").is_err());
        assert!(validate_redirect_url("not a url").is_err());
    }

    #[test]
    fn redirect_url_failure_is_field_coded() {
        match validate_redirect_url("definitely not a url") {
            Err(CheckoutError::Validation(failure)) => {
                assert_eq!(failure.field, "redirect_url");
                assert_eq!(failure.code, CheckoutErrorCode::InvalidRedirectUrl);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
