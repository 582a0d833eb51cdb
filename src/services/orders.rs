//! Order materializer.
//!
//! Consumes an [`OrderDraft`] and persists the order aggregate in one pass:
//! header, lines, discounts, stock allocations, gift cards, payment
//! reassignment and aggregate charge/authorize totals. The lookup by checkout
//! token is the idempotency guard: at most one order exists per token, and a
//! racing duplicate call returns the existing order unchanged.

use crate::checkout::draft::OrderDraft;
use crate::checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
use crate::entities::channel::MarkAsPaidStrategy;
use crate::entities::order::{OrderOrigin, OrderStatus, PaymentCoverage};
use crate::entities::payment_transaction::TransactionKind;
use crate::entities::{
    order, order_discount, order_line, order_line_discount, payment, payment_transaction,
};
use crate::errors::CheckoutError;
use crate::events::{CommitHooks, Event, EventSender};
use crate::services::plugins::PluginHooks;
use crate::services::stock::{self, AllocationLine};
use crate::services::{customers, gift_cards, payments};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Inputs for one materialization, fixed before the call.
pub struct OrderCreationInput<'a> {
    pub info: &'a CheckoutInfo,
    pub lines: &'a [CheckoutLineInfo],
    pub draft: &'a OrderDraft,
    /// Transaction flow tightens the status decision: auto-confirm alone is
    /// not enough, at least one payment transaction must already exist.
    pub transaction_flow: bool,
    pub metadata: Option<Json>,
    pub private_metadata: Option<Json>,
}

pub async fn get_order_by_checkout_token<C: ConnectionTrait>(
    db: &C,
    checkout_token: Uuid,
) -> Result<Option<order::Model>, CheckoutError> {
    Ok(order::Entity::find()
        .filter(order::Column::CheckoutToken.eq(checkout_token))
        .one(db)
        .await?)
}

fn order_status(
    auto_confirm: bool,
    transaction_flow: bool,
    has_payment_transactions: bool,
) -> OrderStatus {
    if auto_confirm && (!transaction_flow || has_payment_transactions) {
        OrderStatus::Unfulfilled
    } else {
        OrderStatus::Unconfirmed
    }
}

fn generate_order_number() -> String {
    format!("ORD-{}", Uuid::new_v4().simple())
}

/// Shallow merge: caller-supplied keys win over the checkout's own metadata.
fn merge_metadata(base: &Json, extra: Option<&Json>) -> Json {
    match (base, extra) {
        (Json::Object(base_map), Some(Json::Object(extra_map))) => {
            let mut merged = base_map.clone();
            for (key, value) in extra_map {
                merged.insert(key.clone(), value.clone());
            }
            Json::Object(merged)
        }
        (_, Some(extra)) if !extra.is_null() => extra.clone(),
        _ => base.clone(),
    }
}

fn build_search_document(
    number: &str,
    user_email: &str,
    lines: &[order_line::Model],
) -> String {
    let mut parts: Vec<String> = vec![number.to_lowercase(), user_email.to_lowercase()];
    for line in lines {
        parts.push(line.product_name.to_lowercase());
        if !line.variant_name.is_empty() {
            parts.push(line.variant_name.to_lowercase());
        }
        if let Some(sku) = &line.product_sku {
            parts.push(sku.to_lowercase());
        }
    }
    parts.join(" ")
}

fn coverage(covered: Decimal, total: Decimal) -> PaymentCoverage {
    if covered <= Decimal::ZERO {
        PaymentCoverage::None
    } else if covered >= total {
        PaymentCoverage::Full
    } else {
        PaymentCoverage::Partial
    }
}

/// Marks an order fully paid through a manual payment record, used when the
/// order total is zero and the channel settles through the payment flow.
pub async fn mark_order_as_paid<C: ConnectionTrait>(
    db: &C,
    order: &order::Model,
) -> Result<(), CheckoutError> {
    let now = Utc::now();
    let manual_payment = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        checkout_token: Set(None),
        order_id: Set(Some(order.id)),
        gateway: Set("manual".to_string()),
        is_active: Set(true),
        to_confirm: Set(false),
        token: Set(None),
        psp_reference: Set(None),
        currency: Set(order.currency.clone()),
        total: Set(order.total_gross),
        captured_amount: Set(order.total_gross),
        charge_status: Set("fully-charged".to_string()),
        created_at: Set(now),
        modified_at: Set(now),
    }
    .insert(db)
    .await?;

    payment_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(Some(manual_payment.id)),
        checkout_token: Set(None),
        order_id: Set(Some(order.id)),
        kind: Set(TransactionKind::Capture),
        is_success: Set(true),
        amount: Set(order.total_gross),
        currency: Set(order.currency.clone()),
        action_required: Set(false),
        action_required_data: Set(Json::Object(Default::default())),
        customer_id: Set(None),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let mut active: order::ActiveModel = order.clone().into();
    active.total_charged = Set(order.total_gross);
    active.charge_status = Set(PaymentCoverage::Full);
    active.authorize_status = Set(PaymentCoverage::Full);
    active.update(db).await?;
    info!(order_id = %order.id, "order marked as paid");
    Ok(())
}

/// Charged/authorized aggregates computed from the order's successful
/// transactions.
async fn payment_totals<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> Result<(Decimal, Decimal), CheckoutError> {
    let transactions = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::OrderId.eq(order_id))
        .filter(payment_transaction::Column::IsSuccess.eq(true))
        .all(db)
        .await?;
    let mut charged = Decimal::ZERO;
    let mut authorized = Decimal::ZERO;
    for txn in transactions {
        match txn.kind {
            TransactionKind::Capture => charged += txn.amount,
            TransactionKind::Auth => authorized += txn.amount,
            TransactionKind::Refund => charged -= txn.amount,
            TransactionKind::RefundOngoing | TransactionKind::Void => {}
        }
    }
    Ok((charged, authorized))
}

/// Persists the order aggregate from a draft. Idempotent by checkout token.
///
/// Runs inside the caller's transaction; side effects (plugin hooks,
/// confirmation, events) are enqueued on `commit_hooks` and dispatched by the
/// caller strictly after commit.
#[instrument(skip_all, fields(checkout = %input.info.checkout.token))]
pub async fn create_order_from_draft<C: ConnectionTrait>(
    db: &C,
    input: OrderCreationInput<'_>,
    plugins: &Arc<dyn PluginHooks>,
    events: &EventSender,
    commit_hooks: &mut CommitHooks,
) -> Result<order::Model, CheckoutError> {
    let info = input.info;
    let draft = input.draft;
    let checkout = &info.checkout;

    if let Some(existing) = get_order_by_checkout_token(db, checkout.token).await? {
        info!(order_id = %existing.id, "order already exists for checkout, returning it");
        return Ok(existing);
    }

    let has_transactions = payments::has_payment_transactions(db, checkout.token).await?;
    let status = order_status(
        info.channel.automatically_confirm_all_new_orders,
        input.transaction_flow,
        has_transactions,
    );

    let billing_address_id = customers::materialize_order_address(
        db,
        info.user.as_ref(),
        info.billing_address.as_ref(),
    )
    .await?;
    let shipping_address_id = customers::materialize_order_address(
        db,
        info.user.as_ref(),
        info.shipping_address.as_ref(),
    )
    .await?;

    let order_id = Uuid::new_v4();
    let number = generate_order_number();
    let order_row = order::ActiveModel {
        id: Set(order_id),
        number: Set(number.clone()),
        checkout_token: Set(checkout.token),
        status: Set(status),
        origin: Set(OrderOrigin::Checkout),
        channel_id: Set(info.channel.id),
        user_id: Set(info.user.as_ref().map(|u| u.id)),
        user_email: Set(draft.user_email.clone()),
        billing_address_id: Set(billing_address_id),
        shipping_address_id: Set(shipping_address_id),
        shipping_method_id: Set(checkout.shipping_method_id),
        shipping_method_name: Set(info.shipping_method.as_ref().map(|m| m.name.clone())),
        collection_point_id: Set(checkout.collection_point_id),
        base_shipping_price: Set(draft.shipping.base_shipping_price),
        shipping_price_net: Set(draft.shipping.shipping_price.net),
        shipping_price_gross: Set(draft.shipping.shipping_price.gross),
        shipping_tax_rate: Set(draft.shipping.shipping_tax_rate),
        currency: Set(draft.currency.clone()),
        total_net: Set(draft.total.net),
        total_gross: Set(draft.total.gross),
        undiscounted_total_net: Set(draft.undiscounted_total.net),
        undiscounted_total_gross: Set(draft.undiscounted_total.gross),
        total_charged: Set(Decimal::ZERO),
        total_authorized: Set(Decimal::ZERO),
        charge_status: Set(PaymentCoverage::None),
        authorize_status: Set(PaymentCoverage::None),
        tax_exemption: Set(checkout.tax_exemption),
        customer_note: Set(checkout.note.clone()),
        redirect_url: Set(checkout.redirect_url.clone()),
        language_code: Set(checkout.language_code.clone()),
        tracking_client_id: Set(checkout.tracking_code.clone().unwrap_or_default()),
        metadata: Set(merge_metadata(&checkout.metadata, input.metadata.as_ref())),
        private_metadata: Set(merge_metadata(
            &checkout.private_metadata,
            input.private_metadata.as_ref(),
        )),
        search_document: Set(String::new()),
        should_refresh_prices: Set(false),
        created_at: Set(Utc::now()),
    };
    let mut order_model = order_row.insert(db).await?;

    let mut persisted_lines = Vec::with_capacity(draft.lines.len());
    let mut allocation_lines = Vec::with_capacity(draft.lines.len());
    for snapshot in &draft.lines {
        let line_id = Uuid::new_v4();
        let line_row = order_line::ActiveModel {
            id: Set(line_id),
            order_id: Set(order_id),
            variant_id: Set(Some(snapshot.variant_id)),
            product_name: Set(snapshot.product_name.clone()),
            variant_name: Set(snapshot.variant_name.clone()),
            translated_product_name: Set(snapshot.translated_product_name.clone()),
            translated_variant_name: Set(snapshot.translated_variant_name.clone()),
            product_sku: Set(snapshot.product_sku.clone()),
            quantity: Set(snapshot.quantity),
            currency: Set(draft.currency.clone()),
            base_unit_price: Set(snapshot.base_unit_price),
            undiscounted_base_unit_price: Set(snapshot.undiscounted_base_unit_price),
            unit_price_net: Set(snapshot.unit_price.net),
            unit_price_gross: Set(snapshot.unit_price.gross),
            undiscounted_unit_price_net: Set(snapshot.undiscounted_unit_price.net),
            undiscounted_unit_price_gross: Set(snapshot.undiscounted_unit_price.gross),
            undiscounted_total_price_net: Set(snapshot.undiscounted_total_price.net),
            undiscounted_total_price_gross: Set(snapshot.undiscounted_total_price.gross),
            total_price_net: Set(snapshot.total_price.net),
            total_price_gross: Set(snapshot.total_price.gross),
            tax_rate: Set(snapshot.tax_rate),
            unit_discount_amount: Set(snapshot.unit_discount_amount),
            unit_discount_reason: Set(snapshot.unit_discount_reason.clone()),
            voucher_code: Set(snapshot.voucher_code.clone()),
            sale_id: Set(snapshot.sale_id.clone()),
            is_shipping_required: Set(snapshot.is_shipping_required),
            is_gift_card: Set(snapshot.is_gift_card),
            metadata: Set(snapshot.metadata.clone()),
            private_metadata: Set(snapshot.private_metadata.clone()),
        };
        let persisted = line_row.insert(db).await?;

        for discount in &snapshot.line_discounts {
            order_line_discount::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_line_id: Set(line_id),
                promotion_rule_id: Set(Some(discount.promotion_rule_id)),
                amount: Set(discount.amount),
                currency: Set(discount.currency.clone()),
                reason: Set(discount.reason.clone()),
            }
            .insert(db)
            .await?;
        }

        let variant = input
            .lines
            .iter()
            .find(|l| l.line.id == snapshot.checkout_line_id)
            .map(|l| l.variant.clone())
            .ok_or_else(|| {
                CheckoutError::NotFound(format!("Checkout line {}", snapshot.checkout_line_id))
            })?;
        allocation_lines.push(AllocationLine {
            order_line_id: line_id,
            checkout_line_id: Some(snapshot.checkout_line_id),
            variant,
            quantity: snapshot.quantity,
        });
        persisted_lines.push(persisted);
    }

    stock::allocate_stocks(
        db,
        &allocation_lines,
        info.country_code(),
        &info.channel,
        info.preferred_warehouse(),
        true,
    )
    .await?;
    stock::allocate_preorders(db, &allocation_lines, info.channel.id).await?;

    if checkout.discount_amount > Decimal::ZERO {
        order_discount::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            discount_type: Set("voucher".to_string()),
            value_type: Set("fixed".to_string()),
            value: Set(checkout.discount_amount),
            name: Set(checkout.discount_name.clone()),
            translated_name: Set(checkout.translated_discount_name.clone()),
            currency: Set(draft.currency.clone()),
            amount: Set(checkout.discount_amount),
        }
        .insert(db)
        .await?;
    }

    gift_cards::add_gift_cards_to_order(
        db,
        checkout,
        &order_model,
        draft.total_without_gift_cards.gross,
    )
    .await?;

    payments::reassign_payments_to_order(db, checkout.token, order_id).await?;
    let (total_charged, total_authorized) = payment_totals(db, order_id).await?;

    let search_document = build_search_document(&number, &draft.user_email, &persisted_lines);
    let mut active: order::ActiveModel = order_model.clone().into();
    active.total_charged = Set(total_charged);
    active.total_authorized = Set(total_authorized);
    active.charge_status = Set(coverage(total_charged, draft.total.gross));
    active.authorize_status = Set(coverage(
        total_charged + total_authorized,
        draft.total.gross,
    ));
    active.search_document = Set(search_document);
    order_model = active.update(db).await?;

    if draft.is_zero_total()
        && info.channel.order_mark_as_paid_strategy == MarkAsPaidStrategy::PaymentFlow
    {
        mark_order_as_paid(db, &order_model).await?;
        order_model = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("Order {order_id}")))?;
    }

    let allocated_units: i64 = allocation_lines.iter().map(|l| l.quantity as i64).sum();
    enqueue_post_commit(plugins, events, commit_hooks, &order_model, allocated_units);
    info!(order_id = %order_id, number = %order_model.number, "order materialized");
    Ok(order_model)
}

/// Queues the order-created hook, the confirmation and the domain event to
/// run strictly after the surrounding transaction commits.
fn enqueue_post_commit(
    plugins: &Arc<dyn PluginHooks>,
    events: &EventSender,
    commit_hooks: &mut CommitHooks,
    order: &order::Model,
    allocated_units: i64,
) {
    let plugins_for_created = Arc::clone(plugins);
    let created_order = order.clone();
    commit_hooks.on_commit(async move {
        plugins_for_created.order_created(&created_order).await;
    });

    if !order.user_email.is_empty() {
        let plugins_for_confirmation = Arc::clone(plugins);
        let confirmation_order = order.clone();
        commit_hooks.on_commit(async move {
            let recipient = confirmation_order.user_email.clone();
            plugins_for_confirmation
                .send_order_confirmation(&confirmation_order, &recipient)
                .await;
        });
    }

    let events = events.clone();
    let order_id = order.id;
    commit_hooks.on_commit(async move {
        if let Err(err) = events.send(Event::OrderCreated(order_id)).await {
            warn!(error = %err, "order created event dropped");
        }
        if allocated_units > 0 {
            if let Err(err) = events
                .send(Event::StockAllocated {
                    order_id,
                    units: allocated_units,
                })
                .await
            {
                warn!(error = %err, "stock allocated event dropped");
            }
        }
    });
}
