//! Voucher usage ledger.
//!
//! Usage increments run under a row lock on the voucher so two concurrent
//! checkouts cannot both pass a usage-limit check for the last remaining use.
//! `release_voucher_usage` is the compensating action for every completion
//! failure that happens after an increment; it is idempotent-safe with a
//! missing voucher.

use crate::checkout::fetch::CheckoutInfo;
use crate::db::supports_row_locks;
use crate::entities::{voucher, voucher_customer};
use crate::errors::CheckoutError;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::{instrument, warn};
use uuid::Uuid;

/// Fetches the active voucher for a code, optionally holding a row lock for
/// the remainder of the surrounding transaction.
pub async fn get_voucher<C: ConnectionTrait>(
    db: &C,
    code: &str,
    lock: bool,
) -> Result<Option<voucher::Model>, CheckoutError> {
    let mut query = voucher::Entity::find()
        .filter(voucher::Column::Code.eq(code))
        .filter(voucher::Column::IsActive.eq(true));
    if lock && supports_row_locks(db) {
        query = query.lock_exclusive();
    }
    Ok(query.one(db).await?)
}

/// Resolves the checkout's voucher. A set code with no matching active
/// voucher means it expired in the meantime and order placement must abort.
pub async fn get_voucher_for_checkout<C: ConnectionTrait>(
    db: &C,
    info: &CheckoutInfo,
    lock: bool,
) -> Result<Option<voucher::Model>, CheckoutError> {
    match info.checkout.voucher_code.as_deref() {
        Some(code) => {
            let voucher = get_voucher(db, code, lock).await?;
            if voucher.is_none() {
                return Err(CheckoutError::VoucherNotApplicable(
                    "Voucher expired in meantime. Order placement aborted.".to_string(),
                ));
            }
            Ok(voucher)
        }
        None => Ok(None),
    }
}

/// Increments voucher usage for a checkout under a row lock. Returns the
/// voucher code that was consumed (for later compensation), or None when the
/// checkout carries no voucher.
///
/// Must be called inside a transaction; the surrounding flow decides whether
/// that transaction is dedicated (transaction flow) or the phase-one
/// transaction (payment flow).
#[instrument(skip_all, fields(checkout = %info.checkout.token))]
pub async fn increase_voucher_usage<C: ConnectionTrait>(
    db: &C,
    info: &CheckoutInfo,
) -> Result<Option<String>, CheckoutError> {
    let Some(voucher) = get_voucher_for_checkout(db, info, true).await? else {
        return Ok(None);
    };

    if voucher.apply_once_per_customer {
        let email = info.customer_email().ok_or_else(|| {
            CheckoutError::VoucherNotApplicable(
                "Customer email is required to use this voucher.".to_string(),
            )
        })?;
        add_voucher_usage_by_customer(db, &voucher, &email).await?;
    }

    if let Some(limit) = voucher.usage_limit {
        if voucher.used >= limit {
            return Err(CheckoutError::VoucherNotApplicable(
                "Voucher usage limit has been reached.".to_string(),
            ));
        }
        let mut active: voucher::ActiveModel = voucher.clone().into();
        active.used = Set(voucher.used + 1);
        active.update(db).await?;
    }

    Ok(Some(voucher.code))
}

/// Records a redemption for an `apply_once_per_customer` voucher, rejecting a
/// second redemption by the same email.
pub async fn add_voucher_usage_by_customer<C: ConnectionTrait>(
    db: &C,
    voucher: &voucher::Model,
    customer_email: &str,
) -> Result<(), CheckoutError> {
    let existing = voucher_customer::Entity::find()
        .filter(voucher_customer::Column::VoucherId.eq(voucher.id))
        .filter(voucher_customer::Column::CustomerEmail.eq(customer_email))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(CheckoutError::VoucherNotApplicable(
            "This offer is only valid once per customer.".to_string(),
        ));
    }
    voucher_customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        voucher_id: Set(voucher.id),
        customer_email: Set(customer_email.to_string()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Compensating action: returns a previously incremented usage. Safe to call
/// with no voucher code (no-op) and safe to call more than once — the
/// decrement never drives `used` below zero.
#[instrument(skip(db))]
pub async fn release_voucher_usage<C: ConnectionTrait>(
    db: &C,
    voucher_code: Option<&str>,
    customer_email: Option<&str>,
) -> Result<(), CheckoutError> {
    let Some(code) = voucher_code else {
        return Ok(());
    };
    let Some(voucher) = voucher::Entity::find()
        .filter(voucher::Column::Code.eq(code))
        .one(db)
        .await?
    else {
        warn!(code, "voucher disappeared before usage release");
        return Ok(());
    };

    if voucher.usage_limit.is_some() {
        voucher::Entity::update_many()
            .col_expr(
                voucher::Column::Used,
                Expr::col(voucher::Column::Used).sub(1),
            )
            .filter(voucher::Column::Id.eq(voucher.id))
            .filter(voucher::Column::Used.gt(0))
            .exec(db)
            .await?;
    }

    if voucher.apply_once_per_customer {
        if let Some(email) = customer_email {
            voucher_customer::Entity::delete_many()
                .filter(voucher_customer::Column::VoucherId.eq(voucher.id))
                .filter(voucher_customer::Column::CustomerEmail.eq(email))
                .exec(db)
                .await?;
        }
    }
    Ok(())
}
