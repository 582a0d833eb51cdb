//! Enriched read views of a checkout and its lines.
//!
//! Every locked phase of the completion flow re-fetches these views fresh so
//! mutations committed by a concurrent attempt between phases are observed.

use crate::db::supports_row_locks;
use crate::entities::{
    address, channel, channel_listing, checkout, checkout_line, customer, product_variant,
    promotion_rule, shipping_method, variant_translation, warehouse,
};
use crate::errors::CheckoutError;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use std::collections::HashMap;
use uuid::Uuid;

/// Enriched view of a checkout line with resolved variant, channel pricing,
/// promotion and translation data.
#[derive(Debug, Clone)]
pub struct CheckoutLineInfo {
    pub line: checkout_line::Model,
    pub variant: product_variant::Model,
    pub listing: channel_listing::Model,
    pub promotion_rule: Option<promotion_rule::Model>,
    pub translated_product_name: Option<String>,
    pub translated_variant_name: Option<String>,
    /// The checkout voucher code when it applies to this line.
    pub voucher_code: Option<String>,
}

/// Enriched view of the checkout aggregate.
#[derive(Debug, Clone)]
pub struct CheckoutInfo {
    pub checkout: checkout::Model,
    pub channel: channel::Model,
    pub user: Option<customer::Model>,
    pub billing_address: Option<address::Model>,
    pub shipping_address: Option<address::Model>,
    pub shipping_method: Option<shipping_method::Model>,
    pub collection_point: Option<warehouse::Model>,
}

impl CheckoutInfo {
    /// The user's account email when assigned, else the guest email.
    pub fn customer_email(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| u.email.clone())
            .or_else(|| self.checkout.email.clone())
    }

    /// Country used for warehouse lookup: the shipping destination when
    /// present, else the checkout's own country.
    pub fn country_code(&self) -> &str {
        self.shipping_address
            .as_ref()
            .map(|a| a.country_code.as_str())
            .unwrap_or(self.checkout.country_code.as_str())
    }

    /// Address handed to the pricing engine.
    pub fn tax_address(&self) -> Option<&address::Model> {
        self.shipping_address
            .as_ref()
            .or(self.billing_address.as_ref())
    }

    /// The warehouse allocation should prefer, when the buyer chose pickup.
    pub fn preferred_warehouse(&self) -> Option<Uuid> {
        self.collection_point.as_ref().map(|w| w.id)
    }
}

/// Fetches a checkout row, optionally with a pessimistic row lock where the
/// backend supports one. Callers hold the per-token mutex regardless.
pub async fn fetch_checkout<C: ConnectionTrait>(
    db: &C,
    token: Uuid,
    lock: bool,
) -> Result<Option<checkout::Model>, CheckoutError> {
    let mut query = checkout::Entity::find_by_id(token);
    if lock && supports_row_locks(db) {
        query = query.lock_exclusive();
    }
    Ok(query.one(db).await?)
}

pub async fn fetch_checkout_info<C: ConnectionTrait>(
    db: &C,
    checkout: checkout::Model,
) -> Result<CheckoutInfo, CheckoutError> {
    let channel = channel::Entity::find_by_id(checkout.channel_id)
        .one(db)
        .await?
        .ok_or_else(|| CheckoutError::NotFound(format!("Channel {}", checkout.channel_id)))?;

    let user = match checkout.user_id {
        Some(user_id) => customer::Entity::find_by_id(user_id).one(db).await?,
        None => None,
    };

    let billing_address = match checkout.billing_address_id {
        Some(id) => address::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let shipping_address = match checkout.shipping_address_id {
        Some(id) => address::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let shipping_method = match checkout.shipping_method_id {
        Some(id) => shipping_method::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let collection_point = match checkout.collection_point_id {
        Some(id) => warehouse::Entity::find_by_id(id).one(db).await?,
        None => None,
    };

    Ok(CheckoutInfo {
        checkout,
        channel,
        user,
        billing_address,
        shipping_address,
        shipping_method,
        collection_point,
    })
}

pub async fn fetch_checkout_lines<C: ConnectionTrait>(
    db: &C,
    checkout: &checkout::Model,
) -> Result<Vec<CheckoutLineInfo>, CheckoutError> {
    let lines = checkout_line::Entity::find()
        .filter(checkout_line::Column::CheckoutToken.eq(checkout.token))
        .all(db)
        .await?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let variant_ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();

    let variants: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
        .filter(product_variant::Column::Id.is_in(variant_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let listings: HashMap<Uuid, channel_listing::Model> = channel_listing::Entity::find()
        .filter(channel_listing::Column::VariantId.is_in(variant_ids.clone()))
        .filter(channel_listing::Column::ChannelId.eq(checkout.channel_id))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.variant_id, l))
        .collect();

    let translations: HashMap<Uuid, variant_translation::Model> =
        variant_translation::Entity::find()
            .filter(variant_translation::Column::VariantId.is_in(variant_ids.clone()))
            .filter(variant_translation::Column::LanguageCode.eq(checkout.language_code.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.variant_id, t))
            .collect();

    let rule_ids: Vec<Uuid> = lines.iter().filter_map(|l| l.promotion_rule_id).collect();
    let rules: HashMap<Uuid, promotion_rule::Model> = if rule_ids.is_empty() {
        HashMap::new()
    } else {
        promotion_rule::Entity::find()
            .filter(promotion_rule::Column::Id.is_in(rule_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect()
    };

    let mut infos = Vec::with_capacity(lines.len());
    for line in lines {
        let variant = variants.get(&line.variant_id).cloned().ok_or_else(|| {
            CheckoutError::NotFound(format!("Product variant {}", line.variant_id))
        })?;
        let listing = listings.get(&line.variant_id).cloned().ok_or_else(|| {
            CheckoutError::NotFound(format!(
                "Channel listing for variant {} on channel {}",
                line.variant_id, checkout.channel_id
            ))
        })?;
        let translation = translations.get(&line.variant_id);
        let promotion_rule = line.promotion_rule_id.and_then(|id| rules.get(&id).cloned());
        let voucher_code = if line.voucher_applies {
            checkout.voucher_code.clone()
        } else {
            None
        };

        infos.push(CheckoutLineInfo {
            translated_product_name: translation.and_then(|t| t.product_name.clone()),
            translated_variant_name: translation.and_then(|t| t.variant_name.clone()),
            promotion_rule,
            voucher_code,
            line,
            variant,
            listing,
        });
    }
    Ok(infos)
}
