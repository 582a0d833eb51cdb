//! Immutable order draft.
//!
//! The draft is computed once, inside a locked phase, and threaded through
//! the remaining phases as a value. Phases never mutate shared
//! partially-constructed order state; materialization is a single step that
//! consumes the draft.

use crate::checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
use crate::errors::CheckoutError;
use crate::money::TaxedMoney;
use crate::services::gift_cards;
use crate::services::plugins::PluginHooks;
use crate::services::pricing::{
    self, PriceSnapshot, PricingEngine, ShippingSnapshot,
};
use crate::services::stock;
use crate::services::vouchers;
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use tracing::{instrument, warn};

/// Everything the materializer needs to persist an order, fixed at
/// draft-build time.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub lines: Vec<PriceSnapshot>,
    pub shipping: ShippingSnapshot,

    pub subtotal: TaxedMoney,
    /// Total after the checkout-level discount, before gift cards.
    pub total_without_gift_cards: TaxedMoney,
    /// Final total after gift card balances, floored at zero.
    pub total: TaxedMoney,
    pub undiscounted_total: TaxedMoney,
    pub gift_cards_balance: Decimal,

    /// Voucher code whose usage was consumed while building this draft.
    /// Carried so every later failure path can compensate with a release.
    pub voucher_code: Option<String>,
    pub user_email: String,
    pub currency: String,
}

impl OrderDraft {
    pub fn is_zero_total(&self) -> bool {
        self.total.gross.is_zero()
    }
}

/// Builds the draft: availability check, price snapshots, totals, gift card
/// validation, optional voucher consumption and the pre-creation hook.
///
/// Runs inside the caller's transaction. When `consume_voucher` is set the
/// voucher usage increment commits together with that transaction; a hook
/// failure after the increment still releases explicitly so the accounting
/// holds even when the increment was already committed by an earlier phase.
#[instrument(skip_all, fields(checkout = %info.checkout.token))]
pub async fn build_order_draft<C: ConnectionTrait>(
    db: &C,
    engine: &dyn PricingEngine,
    hooks: &dyn PluginHooks,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
    consume_voucher: bool,
    check_reservations: bool,
) -> Result<OrderDraft, CheckoutError> {
    stock::check_availability_bulk(db, info, lines, true, check_reservations).await?;

    gift_cards::validate_gift_cards(db, &info.checkout).await?;
    let gift_cards_balance = gift_cards::gift_cards_balance(db, &info.checkout).await?;

    let line_snapshots = pricing::build_line_snapshots(engine, info, lines).await?;
    let shipping = pricing::build_shipping_snapshot(engine, info, lines).await?;
    let subtotal = engine.subtotal(info, lines).await?;

    let mut total_without_gift_cards = subtotal + shipping.shipping_price;
    total_without_gift_cards.net -= info.checkout.discount_amount;
    total_without_gift_cards.gross -= info.checkout.discount_amount;
    let total = engine
        .total_with_gift_cards(info, lines, gift_cards_balance)
        .await?;

    let undiscounted_total = line_snapshots
        .iter()
        .map(|s| s.undiscounted_total_price)
        .sum::<TaxedMoney>()
        + shipping.shipping_price;

    let voucher_code = if consume_voucher {
        vouchers::increase_voucher_usage(db, info).await?
    } else {
        vouchers::get_voucher_for_checkout(db, info, false)
            .await?
            .map(|v| v.code)
    };

    let draft = OrderDraft {
        lines: line_snapshots,
        shipping,
        subtotal,
        total_without_gift_cards,
        total,
        undiscounted_total,
        gift_cards_balance,
        voucher_code: voucher_code.clone(),
        user_email: info.customer_email().unwrap_or_default(),
        currency: info.checkout.currency.clone(),
    };

    if let Err(err) = hooks.preprocess_order_creation(info, lines, &draft).await {
        if consume_voucher {
            let email = info.customer_email();
            if let Err(release_err) =
                vouchers::release_voucher_usage(db, voucher_code.as_deref(), email.as_deref())
                    .await
            {
                warn!(error = %release_err, "voucher release after hook failure failed");
            }
        }
        return Err(err);
    }

    Ok(draft)
}
