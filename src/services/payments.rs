//! Payment gateway seam and transaction bookkeeping.

use crate::entities::{payment, payment_transaction};
use crate::entities::payment_transaction::TransactionKind;
use crate::errors::{CheckoutError, CheckoutErrorCode};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value as Json;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Outcome of a single gateway call.
#[derive(Clone, Debug)]
pub struct TransactionResult {
    pub kind: TransactionKind,
    pub is_success: bool,
    pub amount: Decimal,
    pub currency: String,
    pub error: Option<String>,
    /// Gateway-side customer handle to persist for reuse.
    pub customer_id: Option<String>,
    /// The shopper must complete an extra step (3DS redirect etc.) before the
    /// charge lands.
    pub action_required: bool,
    pub action_required_data: Json,
}

/// Processor integration. Called outside any checkout lock, so implementations
/// are free to block on slow remote calls.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Completes a previously initiated charge (`to_confirm` payments).
    async fn confirm(
        &self,
        payment: &payment::Model,
        amount: Decimal,
    ) -> Result<TransactionResult, CheckoutError>;

    /// Charges or authorizes a fresh payment for the given amount.
    async fn process_payment(
        &self,
        payment: &payment::Model,
        amount: Decimal,
        store_payment_method: bool,
    ) -> Result<TransactionResult, CheckoutError>;

    /// Compensation when a charge succeeded but no order can be materialized.
    async fn refund_or_void(&self, payment: &payment::Model)
        -> Result<TransactionResult, CheckoutError>;
}

/// Most recent active payment attached to the checkout, if any.
pub async fn get_last_active_payment<C: ConnectionTrait>(
    db: &C,
    checkout_token: Uuid,
) -> Result<Option<payment::Model>, CheckoutError> {
    Ok(payment::Entity::find()
        .filter(payment::Column::CheckoutToken.eq(checkout_token))
        .filter(payment::Column::IsActive.eq(true))
        .order_by_desc(payment::Column::CreatedAt)
        .one(db)
        .await?)
}

pub async fn has_payment_transactions<C: ConnectionTrait>(
    db: &C,
    checkout_token: Uuid,
) -> Result<bool, CheckoutError> {
    Ok(payment_transaction::Entity::find()
        .filter(payment_transaction::Column::CheckoutToken.eq(checkout_token))
        .one(db)
        .await?
        .is_some())
}

/// Rejects a payment that went inactive between phases, or whose captured
/// total no longer matches the checkout.
pub fn require_active_payment(
    payment: &payment::Model,
    checkout_total: Decimal,
) -> Result<(), CheckoutError> {
    if !payment.is_active {
        return Err(CheckoutError::validation(
            "payment",
            CheckoutErrorCode::InactivePayment,
            "Provided payment methods can not cover the checkout's total amount",
        ));
    }
    if payment.total < checkout_total {
        return Err(CheckoutError::validation(
            "payment",
            CheckoutErrorCode::CheckoutNotFullyPaid,
            "Provided payment methods can not cover the checkout's total amount",
        ));
    }
    Ok(())
}

/// Runs the gateway call for phase two: `confirm` when the payment was
/// initiated client-side, a fresh `process_payment` otherwise. The resulting
/// transaction row stays attached to the checkout until an order exists.
#[instrument(skip(db, gateway, payment), fields(payment_id = %payment.id))]
pub async fn process_checkout_payment<C: ConnectionTrait>(
    db: &C,
    gateway: &dyn PaymentGateway,
    payment: &payment::Model,
    checkout_token: Uuid,
    amount: Decimal,
    store_payment_method: bool,
) -> Result<TransactionResult, CheckoutError> {
    let result = if payment.to_confirm {
        gateway.confirm(payment, amount).await?
    } else {
        gateway.process_payment(payment, amount, store_payment_method).await?
    };
    record_transaction(db, Some(payment.id), Some(checkout_token), None, &result).await?;

    if !result.is_success {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "Payment processing failed".to_string());
        return Err(CheckoutError::PaymentError(message));
    }
    Ok(result)
}

/// Persists a gateway result as a transaction row.
pub async fn record_transaction<C: ConnectionTrait>(
    db: &C,
    payment_id: Option<Uuid>,
    checkout_token: Option<Uuid>,
    order_id: Option<Uuid>,
    result: &TransactionResult,
) -> Result<payment_transaction::Model, CheckoutError> {
    let row = payment_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(payment_id),
        checkout_token: Set(checkout_token),
        order_id: Set(order_id),
        kind: Set(result.kind),
        is_success: Set(result.is_success),
        amount: Set(result.amount),
        currency: Set(result.currency.clone()),
        action_required: Set(result.action_required),
        action_required_data: Set(result.action_required_data.clone()),
        customer_id: Set(result.customer_id.clone()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// A refund kicked off while completion was in flight blocks order creation.
pub async fn is_refund_ongoing<C: ConnectionTrait>(
    db: &C,
    payment_id: Uuid,
) -> Result<bool, CheckoutError> {
    Ok(payment_transaction::Entity::find()
        .filter(payment_transaction::Column::PaymentId.eq(payment_id))
        .filter(payment_transaction::Column::Kind.eq(TransactionKind::RefundOngoing))
        .filter(payment_transaction::Column::IsSuccess.eq(true))
        .one(db)
        .await?
        .is_some())
}

/// Undoes a settled charge when the order cannot be created. Failures are
/// logged rather than propagated: the caller is already on an error path.
pub async fn refund_or_void_payment<C: ConnectionTrait>(
    db: &C,
    gateway: &dyn PaymentGateway,
    payment: &payment::Model,
    checkout_token: Uuid,
) -> Result<(), CheckoutError> {
    match gateway.refund_or_void(payment).await {
        Ok(result) => {
            record_transaction(db, Some(payment.id), Some(checkout_token), None, &result).await?;
        }
        Err(err) => {
            warn!(payment_id = %payment.id, error = %err, "refund_or_void failed");
        }
    }
    Ok(())
}

/// Moves checkout-scoped payments and transactions onto the order.
pub async fn reassign_payments_to_order<C: ConnectionTrait>(
    db: &C,
    checkout_token: Uuid,
    order_id: Uuid,
) -> Result<(), CheckoutError> {
    use sea_orm::sea_query::Expr;

    payment::Entity::update_many()
        .col_expr(payment::Column::OrderId, Expr::value(order_id))
        .col_expr(payment::Column::CheckoutToken, Expr::value(Option::<Uuid>::None))
        .filter(payment::Column::CheckoutToken.eq(checkout_token))
        .exec(db)
        .await?;
    payment_transaction::Entity::update_many()
        .col_expr(payment_transaction::Column::OrderId, Expr::value(order_id))
        .col_expr(
            payment_transaction::Column::CheckoutToken,
            Expr::value(Option::<Uuid>::None),
        )
        .filter(payment_transaction::Column::CheckoutToken.eq(checkout_token))
        .exec(db)
        .await?;
    Ok(())
}
