//! Pricing snapshot builder.
//!
//! Produces immutable monetary snapshots for checkout lines and shipping by
//! consulting the external pricing engine exactly once per price component
//! per invocation. The engine is pure given persisted state; repeated
//! invocations are idempotent.

use crate::checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
use crate::errors::CheckoutError;
use crate::money::TaxedMoney;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use uuid::Uuid;

/// External tax/price calculation engine. May fail with
/// [`CheckoutError::TaxError`] when tax data cannot be resolved.
#[async_trait]
pub trait PricingEngine: Send + Sync {
    async fn line_unit_price(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
        line: &CheckoutLineInfo,
    ) -> Result<TaxedMoney, CheckoutError>;

    async fn line_total_price(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
        line: &CheckoutLineInfo,
    ) -> Result<TaxedMoney, CheckoutError>;

    async fn line_tax_rate(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
        line: &CheckoutLineInfo,
    ) -> Result<Decimal, CheckoutError>;

    async fn shipping_price(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
    ) -> Result<TaxedMoney, CheckoutError>;

    async fn shipping_tax_rate(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
    ) -> Result<Decimal, CheckoutError>;

    async fn subtotal(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
    ) -> Result<TaxedMoney, CheckoutError>;

    /// Checkout total after the checkout-level discount and gift card
    /// balances are applied, floored at zero.
    async fn total_with_gift_cards(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
        gift_cards_balance: Decimal,
    ) -> Result<TaxedMoney, CheckoutError> {
        let subtotal = self.subtotal(info, lines).await?;
        let shipping = self.shipping_price(info, lines).await?;
        let mut total = subtotal + shipping;
        total.net -= info.checkout.discount_amount + gift_cards_balance;
        total.gross -= info.checkout.discount_amount + gift_cards_balance;
        if total.net < Decimal::ZERO {
            total.net = Decimal::ZERO;
        }
        if total.gross < Decimal::ZERO {
            total.gross = Decimal::ZERO;
        }
        Ok(total)
    }
}

/// Promotion-sourced discount record attached to one order line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDiscount {
    pub promotion_rule_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reason: Option<String>,
}

/// Immutable per-line monetary and identity snapshot.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub checkout_line_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,

    pub product_name: String,
    pub variant_name: String,
    pub translated_product_name: String,
    pub translated_variant_name: String,
    pub product_sku: Option<String>,
    pub is_shipping_required: bool,
    pub is_gift_card: bool,

    pub base_unit_price: Decimal,
    pub undiscounted_base_unit_price: Decimal,
    pub unit_price: TaxedMoney,
    pub total_price: TaxedMoney,
    pub undiscounted_unit_price: TaxedMoney,
    pub undiscounted_total_price: TaxedMoney,
    pub tax_rate: Decimal,

    pub unit_discount_amount: Decimal,
    pub unit_discount_reason: Option<String>,
    pub voucher_code: Option<String>,
    pub sale_id: Option<String>,
    pub line_discounts: Vec<LineDiscount>,

    pub metadata: Json,
    pub private_metadata: Json,
}

/// Shipping price snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ShippingSnapshot {
    pub base_shipping_price: Decimal,
    pub shipping_price: TaxedMoney,
    pub shipping_tax_rate: Decimal,
}

/// A translated name equal to the canonical one is stored empty, not as a
/// duplicate.
fn translation_or_empty(translated: Option<&str>, base: &str) -> String {
    match translated {
        Some(t) if t != base => t.to_string(),
        _ => String::new(),
    }
}

fn promotion_discount_reason(rule: &crate::entities::promotion_rule::Model) -> String {
    format!("Promotion: {}", rule.sale_id())
}

/// Builds the snapshot for a single line. Engine methods are each called
/// exactly once.
pub async fn build_line_snapshot(
    engine: &dyn PricingEngine,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
    line_info: &CheckoutLineInfo,
) -> Result<PriceSnapshot, CheckoutError> {
    let line = &line_info.line;
    let variant = &line_info.variant;
    let quantity = Decimal::from(line.quantity);

    let base_unit_price = line_info.listing.price_amount;
    let undiscounted_base_unit_price = line_info.listing.undiscounted_price_amount;
    let undiscounted_unit_price = TaxedMoney::flat(undiscounted_base_unit_price);
    let undiscounted_total_price = TaxedMoney::flat(undiscounted_base_unit_price * quantity);

    let unit_price = engine.line_unit_price(info, lines, line_info).await?;
    let total_price = engine.line_total_price(info, lines, line_info).await?;
    let tax_rate = engine.line_tax_rate(info, lines, line_info).await?;

    let discount = undiscounted_unit_price - unit_price;
    let unit_discount_amount = discount.in_basis(info.channel.prices_entered_with_tax);

    let mut unit_discount_reason = line_info
        .voucher_code
        .as_ref()
        .map(|code| format!("Voucher code: {code}"));

    let mut sale_id = None;
    let mut line_discounts = Vec::new();
    if let Some(rule) = &line_info.promotion_rule {
        // Only one promotion can contribute a discount per line; downstream
        // totals assume this, so it is kept explicit rather than generalized.
        sale_id = Some(rule.sale_id());
        let reason = promotion_discount_reason(rule);
        unit_discount_reason = Some(match unit_discount_reason {
            Some(existing) => format!("{existing} & {reason}"),
            None => reason.clone(),
        });
        line_discounts.push(LineDiscount {
            promotion_rule_id: rule.id,
            amount: (undiscounted_base_unit_price - base_unit_price) * quantity,
            currency: info.checkout.currency.clone(),
            reason: Some(reason),
        });
    }

    Ok(PriceSnapshot {
        checkout_line_id: line.id,
        variant_id: variant.id,
        quantity: line.quantity,
        product_name: variant.product_name.clone(),
        variant_name: variant.name.clone(),
        translated_product_name: translation_or_empty(
            line_info.translated_product_name.as_deref(),
            &variant.product_name,
        ),
        translated_variant_name: translation_or_empty(
            line_info.translated_variant_name.as_deref(),
            &variant.name,
        ),
        product_sku: variant.sku.clone(),
        is_shipping_required: variant.is_shipping_required,
        is_gift_card: variant.is_gift_card,
        base_unit_price,
        undiscounted_base_unit_price,
        unit_price,
        total_price,
        undiscounted_unit_price,
        undiscounted_total_price,
        tax_rate,
        unit_discount_amount,
        unit_discount_reason,
        voucher_code: line_info.voucher_code.clone(),
        sale_id,
        line_discounts,
        metadata: line.metadata.clone(),
        private_metadata: line.private_metadata.clone(),
    })
}

/// Builds one snapshot per checkout line.
pub async fn build_line_snapshots(
    engine: &dyn PricingEngine,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
) -> Result<Vec<PriceSnapshot>, CheckoutError> {
    let mut snapshots = Vec::with_capacity(lines.len());
    for line_info in lines {
        snapshots.push(build_line_snapshot(engine, info, lines, line_info).await?);
    }
    Ok(snapshots)
}

/// Builds the shipping snapshot. Engine methods are each called exactly once.
pub async fn build_shipping_snapshot(
    engine: &dyn PricingEngine,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
) -> Result<ShippingSnapshot, CheckoutError> {
    let base_shipping_price = info
        .shipping_method
        .as_ref()
        .map(|m| m.price_amount)
        .unwrap_or(Decimal::ZERO);
    let shipping_price = engine.shipping_price(info, lines).await?;
    let shipping_tax_rate = engine.shipping_tax_rate(info, lines).await?;
    Ok(ShippingSnapshot {
        base_shipping_price,
        shipping_price,
        shipping_tax_rate,
    })
}

/// Pricing engine applying the channel listing price with a flat tax rate.
/// Suitable for channels without an external tax provider, and for tests.
pub struct FlatRatePricing {
    pub tax_rate: Decimal,
}

impl FlatRatePricing {
    pub fn tax_free() -> Self {
        Self {
            tax_rate: Decimal::ZERO,
        }
    }

    fn taxed(&self, amount: Decimal, prices_entered_with_tax: bool) -> TaxedMoney {
        if self.tax_rate.is_zero() {
            return TaxedMoney::flat(amount);
        }
        let factor = Decimal::ONE + self.tax_rate;
        if prices_entered_with_tax {
            TaxedMoney::new(amount / factor, amount)
        } else {
            TaxedMoney::new(amount, amount * factor)
        }
    }
}

#[async_trait]
impl PricingEngine for FlatRatePricing {
    async fn line_unit_price(
        &self,
        info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
        line: &CheckoutLineInfo,
    ) -> Result<TaxedMoney, CheckoutError> {
        Ok(self.taxed(line.listing.price_amount, info.channel.prices_entered_with_tax))
    }

    async fn line_total_price(
        &self,
        info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
        line: &CheckoutLineInfo,
    ) -> Result<TaxedMoney, CheckoutError> {
        let total = line.listing.price_amount * Decimal::from(line.line.quantity);
        Ok(self.taxed(total, info.channel.prices_entered_with_tax))
    }

    async fn line_tax_rate(
        &self,
        _info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
        _line: &CheckoutLineInfo,
    ) -> Result<Decimal, CheckoutError> {
        Ok(self.tax_rate)
    }

    async fn shipping_price(
        &self,
        info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
    ) -> Result<TaxedMoney, CheckoutError> {
        let base = info
            .shipping_method
            .as_ref()
            .map(|m| m.price_amount)
            .unwrap_or(Decimal::ZERO);
        Ok(self.taxed(base, info.channel.prices_entered_with_tax))
    }

    async fn shipping_tax_rate(
        &self,
        _info: &CheckoutInfo,
        _lines: &[CheckoutLineInfo],
    ) -> Result<Decimal, CheckoutError> {
        Ok(self.tax_rate)
    }

    async fn subtotal(
        &self,
        info: &CheckoutInfo,
        lines: &[CheckoutLineInfo],
    ) -> Result<TaxedMoney, CheckoutError> {
        let mut subtotal = TaxedMoney::ZERO;
        for line in lines {
            subtotal = subtotal + self.line_total_price(info, lines, line).await?;
        }
        Ok(subtotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        address, channel, channel_listing, checkout, checkout_line, product_variant,
        promotion_rule,
    };
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn channel_model(prices_entered_with_tax: bool) -> channel::Model {
        channel::Model {
            id: Uuid::new_v4(),
            slug: "default".into(),
            name: "Default".into(),
            is_active: true,
            currency: "USD".into(),
            default_country: "US".into(),
            automatically_confirm_all_new_orders: true,
            allow_unpaid_orders: false,
            order_mark_as_paid_strategy: channel::MarkAsPaidStrategy::PaymentFlow,
            prices_entered_with_tax,
        }
    }

    fn checkout_model(channel: &channel::Model) -> checkout::Model {
        checkout::Model {
            token: Uuid::new_v4(),
            channel_id: channel.id,
            user_id: None,
            email: Some("buyer@example.com".into()),
            currency: "USD".into(),
            country_code: "US".into(),
            language_code: "en".into(),
            billing_address_id: None,
            shipping_address_id: None,
            shipping_method_id: None,
            collection_point_id: None,
            voucher_code: None,
            discount_amount: Decimal::ZERO,
            discount_name: None,
            translated_discount_name: None,
            redirect_url: None,
            note: String::new(),
            tracking_code: None,
            tax_exemption: false,
            authorize_status: checkout::AuthorizeStatus::None,
            metadata: json!({}),
            private_metadata: json!({}),
            created_at: Utc::now(),
            last_change: Utc::now(),
        }
    }

    fn line_info(
        checkout: &checkout::Model,
        price: Decimal,
        undiscounted: Decimal,
        quantity: i32,
    ) -> CheckoutLineInfo {
        let variant_id = Uuid::new_v4();
        CheckoutLineInfo {
            line: checkout_line::Model {
                id: Uuid::new_v4(),
                checkout_token: checkout.token,
                variant_id,
                quantity,
                promotion_rule_id: None,
                voucher_applies: false,
                metadata: json!({}),
                private_metadata: json!({}),
                created_at: Utc::now(),
            },
            variant: product_variant::Model {
                id: variant_id,
                sku: Some("SKU-1".into()),
                name: "Small".into(),
                product_name: "T-Shirt".into(),
                track_inventory: true,
                is_shipping_required: true,
                is_gift_card: false,
                is_preorder: false,
                preorder_global_threshold: None,
            },
            listing: channel_listing::Model {
                id: Uuid::new_v4(),
                variant_id,
                channel_id: checkout.channel_id,
                price_amount: price,
                undiscounted_price_amount: undiscounted,
                preorder_quantity_threshold: None,
                preorder_quantity_allocated: 0,
            },
            promotion_rule: None,
            translated_product_name: None,
            translated_variant_name: None,
            voucher_code: None,
        }
    }

    fn info(channel: channel::Model, checkout: checkout::Model) -> CheckoutInfo {
        CheckoutInfo {
            checkout,
            channel,
            user: None,
            billing_address: None,
            shipping_address: None,
            shipping_method: None,
            collection_point: None,
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn discount_amount_is_unit_difference_in_channel_basis(
        #[case] prices_entered_with_tax: bool,
    ) {
        let channel = channel_model(prices_entered_with_tax);
        let checkout = checkout_model(&channel);
        let line = line_info(&checkout, dec!(8.00), dec!(10.00), 2);
        let info = info(channel, checkout);
        let engine = FlatRatePricing { tax_rate: dec!(0.23) };

        let snapshot = build_line_snapshot(&engine, &info, std::slice::from_ref(&line), &line)
            .await
            .expect("snapshot");

        let expected =
            (snapshot.undiscounted_unit_price - snapshot.unit_price).in_basis(prices_entered_with_tax);
        assert_eq!(snapshot.unit_discount_amount, expected);
        assert!(snapshot.undiscounted_unit_price.gross >= snapshot.unit_price.gross);
    }

    #[tokio::test]
    async fn translated_name_equal_to_base_is_stored_empty() {
        let channel = channel_model(false);
        let checkout = checkout_model(&channel);
        let mut line = line_info(&checkout, dec!(5), dec!(5), 1);
        line.translated_product_name = Some("T-Shirt".into());
        line.translated_variant_name = Some("Klein".into());
        let info = info(channel, checkout);
        let engine = FlatRatePricing::tax_free();

        let snapshot = build_line_snapshot(&engine, &info, std::slice::from_ref(&line), &line)
            .await
            .expect("snapshot");

        assert_eq!(snapshot.translated_product_name, "");
        assert_eq!(snapshot.translated_variant_name, "Klein");
    }

    #[tokio::test]
    async fn voucher_and_promotion_reasons_are_joined() {
        let channel = channel_model(false);
        let checkout = checkout_model(&channel);
        let mut line = line_info(&checkout, dec!(7), dec!(10), 3);
        line.voucher_code = Some("SUMMER".into());
        line.promotion_rule = Some(promotion_rule::Model {
            id: Uuid::new_v4(),
            promotion_name: "Clearance".into(),
            old_sale_id: Some("sale-42".into()),
        });
        let info = info(channel, checkout);
        let engine = FlatRatePricing::tax_free();

        let snapshot = build_line_snapshot(&engine, &info, std::slice::from_ref(&line), &line)
            .await
            .expect("snapshot");

        assert_eq!(
            snapshot.unit_discount_reason.as_deref(),
            Some("Voucher code: SUMMER & Promotion: sale-42")
        );
        assert_eq!(snapshot.sale_id.as_deref(), Some("sale-42"));
        assert_eq!(snapshot.line_discounts.len(), 1);
        assert_eq!(snapshot.line_discounts[0].amount, dec!(9));
    }

    #[tokio::test]
    async fn promotion_without_voucher_uses_promotion_reason_alone() {
        let channel = channel_model(false);
        let checkout = checkout_model(&channel);
        let mut line = line_info(&checkout, dec!(7), dec!(10), 1);
        line.promotion_rule = Some(promotion_rule::Model {
            id: Uuid::new_v4(),
            promotion_name: "Clearance".into(),
            old_sale_id: None,
        });
        let rule_id = line.promotion_rule.as_ref().map(|r| r.id);
        let info = info(channel, checkout);
        let engine = FlatRatePricing::tax_free();

        let snapshot = build_line_snapshot(&engine, &info, std::slice::from_ref(&line), &line)
            .await
            .expect("snapshot");

        let expected_rule = rule_id.map(|id| format!("Promotion: {id}"));
        assert_eq!(snapshot.unit_discount_reason, expected_rule);
    }

    #[tokio::test]
    async fn no_discount_yields_zero_amount_and_no_reason() {
        let channel = channel_model(false);
        let checkout = checkout_model(&channel);
        let line = line_info(&checkout, dec!(5), dec!(5), 1);
        let info = info(channel, checkout);
        let engine = FlatRatePricing::tax_free();

        let snapshot = build_line_snapshot(&engine, &info, std::slice::from_ref(&line), &line)
            .await
            .expect("snapshot");

        assert_eq!(snapshot.unit_discount_amount, Decimal::ZERO);
        assert!(snapshot.unit_discount_reason.is_none());
        assert!(snapshot.line_discounts.is_empty());
    }

    #[tokio::test]
    async fn shipping_snapshot_uses_method_base_price() {
        let channel = channel_model(false);
        let mut checkout = checkout_model(&channel);
        let method_id = Uuid::new_v4();
        checkout.shipping_method_id = Some(method_id);
        let mut info = info(channel, checkout);
        info.shipping_method = Some(crate::entities::shipping_method::Model {
            id: method_id,
            name: "Standard".into(),
            channel_id: info.channel.id,
            price_amount: dec!(4.99),
        });
        let engine = FlatRatePricing::tax_free();

        let snapshot = build_shipping_snapshot(&engine, &info, &[])
            .await
            .expect("shipping snapshot");
        assert_eq!(snapshot.base_shipping_price, dec!(4.99));
        assert_eq!(snapshot.shipping_price, TaxedMoney::flat(dec!(4.99)));
    }

    #[test]
    fn tax_address_prefers_shipping() {
        let channel = channel_model(false);
        let checkout = checkout_model(&channel);
        let mut info = info(channel, checkout);
        assert!(info.tax_address().is_none());

        let billing = address::Model {
            id: Uuid::new_v4(),
            first_name: "A".into(),
            last_name: "B".into(),
            company: None,
            street_address_1: "1 Main St".into(),
            street_address_2: None,
            city: "Town".into(),
            postal_code: "00001".into(),
            country_code: "US".into(),
            phone: None,
            created_at: Utc::now(),
        };
        info.billing_address = Some(billing.clone());
        assert_eq!(info.tax_address().map(|a| a.id), Some(billing.id));
    }
}
