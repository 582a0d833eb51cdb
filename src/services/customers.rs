//! Customer resolution and address book materialization.

use crate::checkout::fetch::CheckoutInfo;
use crate::entities::{address, customer, customer_address};
use crate::errors::CheckoutError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::instrument;
use uuid::Uuid;

pub async fn retrieve_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<customer::Model>, CheckoutError> {
    Ok(customer::Entity::find()
        .filter(customer::Column::Email.eq(email))
        .one(db)
        .await?)
}

/// Resolves the checkout user: an explicitly assigned user wins; otherwise an
/// active account matching the guest email is adopted. Runs once, before any
/// completion lock is taken.
#[instrument(skip_all, fields(checkout = %info.checkout.token))]
pub async fn assign_checkout_user<C: ConnectionTrait>(
    db: &C,
    info: &mut CheckoutInfo,
) -> Result<(), CheckoutError> {
    if info.user.is_some() {
        return Ok(());
    }
    let Some(email) = info.checkout.email.clone() else {
        return Ok(());
    };
    if let Some(existing) = retrieve_user_by_email(db, &email).await? {
        if existing.is_active {
            info.user = Some(existing);
        }
    }
    Ok(())
}

/// Saves an address into the user's book when it is not there yet.
pub async fn store_user_address<C: ConnectionTrait>(
    db: &C,
    user: &customer::Model,
    address: &address::Model,
) -> Result<(), CheckoutError> {
    let exists = customer_address::Entity::find()
        .filter(customer_address::Column::CustomerId.eq(user.id))
        .filter(customer_address::Column::AddressId.eq(address.id))
        .one(db)
        .await?;
    if exists.is_some() {
        return Ok(());
    }
    customer_address::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(user.id),
        address_id: Set(address.id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Persists a private copy of an address for the order. The order never
/// shares a row with the user's address book, so later edits or deletions of
/// the book entry cannot touch the order.
pub async fn copy_address_for_order<C: ConnectionTrait>(
    db: &C,
    address: &address::Model,
) -> Result<Uuid, CheckoutError> {
    let copy = address.private_copy();
    let inserted = copy.insert(db).await?;
    Ok(inserted.id)
}

/// Stores the address into an authenticated user's book (when present) and
/// returns the id of the order's private copy.
pub async fn materialize_order_address<C: ConnectionTrait>(
    db: &C,
    user: Option<&customer::Model>,
    address: Option<&address::Model>,
) -> Result<Option<Uuid>, CheckoutError> {
    let Some(address) = address else {
        return Ok(None);
    };
    if let Some(user) = user {
        store_user_address(db, user, address).await?;
    }
    Ok(Some(copy_address_for_order(db, address).await?))
}
