//! Gift card validation and order attachment.

use crate::entities::{checkout, checkout_gift_card, gift_card, order};
use crate::errors::CheckoutError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};

pub async fn checkout_gift_cards<C: ConnectionTrait>(
    db: &C,
    checkout: &checkout::Model,
) -> Result<Vec<gift_card::Model>, CheckoutError> {
    let links = checkout_gift_card::Entity::find()
        .filter(checkout_gift_card::Column::CheckoutToken.eq(checkout.token))
        .all(db)
        .await?;
    if links.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<_> = links.iter().map(|l| l.gift_card_id).collect();
    Ok(gift_card::Entity::find()
        .filter(gift_card::Column::Id.is_in(ids))
        .all(db)
        .await?)
}

fn card_usable(card: &gift_card::Model, currency: &str) -> Result<(), CheckoutError> {
    if !card.is_active {
        return Err(CheckoutError::GiftCardNotApplicable {
            message: format!("Gift card {} is inactive.", card.code),
            code: "gift_card_inactive".to_string(),
        });
    }
    if let Some(expiry) = card.expiry_date {
        if expiry < Utc::now().date_naive() {
            return Err(CheckoutError::GiftCardNotApplicable {
                message: format!("Gift card {} has expired.", card.code),
                code: "gift_card_expired".to_string(),
            });
        }
    }
    if card.currency != currency {
        return Err(CheckoutError::GiftCardNotApplicable {
            message: format!(
                "Gift card {} uses {} but the checkout is in {}.",
                card.code, card.currency, currency
            ),
            code: "gift_card_currency_mismatch".to_string(),
        });
    }
    Ok(())
}

/// Every gift card attached to the checkout must be active, unexpired and in
/// the checkout currency.
pub async fn validate_gift_cards<C: ConnectionTrait>(
    db: &C,
    checkout: &checkout::Model,
) -> Result<(), CheckoutError> {
    for card in checkout_gift_cards(db, checkout).await? {
        card_usable(&card, &checkout.currency)?;
    }
    Ok(())
}

/// Combined remaining balance of the checkout's usable gift cards.
pub async fn gift_cards_balance<C: ConnectionTrait>(
    db: &C,
    checkout: &checkout::Model,
) -> Result<Decimal, CheckoutError> {
    let mut balance = Decimal::ZERO;
    for card in checkout_gift_cards(db, checkout).await? {
        if card_usable(&card, &checkout.currency).is_ok() {
            balance += card.current_balance_amount;
        }
    }
    Ok(balance)
}

/// Spends the checkout's gift cards against the remaining order total and
/// attaches them to the order. Fails with `GiftCardNotApplicable` when a card
/// stopped being usable between validation and materialization.
#[instrument(skip_all, fields(order_id = %order.id))]
pub async fn add_gift_cards_to_order<C: ConnectionTrait>(
    db: &C,
    checkout: &checkout::Model,
    order: &order::Model,
    mut total_price_left: Decimal,
) -> Result<Decimal, CheckoutError> {
    let mut spent_total = Decimal::ZERO;
    for card in checkout_gift_cards(db, checkout).await? {
        card_usable(&card, &checkout.currency)?;
        if total_price_left <= Decimal::ZERO {
            break;
        }
        let spend = card.current_balance_amount.min(total_price_left);
        if spend <= Decimal::ZERO {
            continue;
        }

        let balance = card.current_balance_amount - spend;
        let code = card.code.clone();
        let mut active: gift_card::ActiveModel = card.into();
        active.current_balance_amount = Set(balance);
        active.used_in_order_id = Set(Some(order.id));
        active.last_used_on = Set(Some(Utc::now()));
        active.update(db).await?;

        total_price_left -= spend;
        spent_total += spend;
        info!(code, %spend, "gift card applied to order");
    }
    Ok(spent_total)
}
