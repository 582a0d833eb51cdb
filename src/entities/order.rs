use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "unconfirmed")]
    Unconfirmed,
    #[sea_orm(string_value = "unfulfilled")]
    Unfulfilled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderOrigin {
    #[sea_orm(string_value = "checkout")]
    Checkout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentCoverage {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "full")]
    Full,
}

/// Immutable post-checkout commercial record. At most one exists per checkout
/// token; the lookup by `checkout_token` is the idempotency guard.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub number: String,

    pub checkout_token: Uuid,
    pub status: OrderStatus,
    pub origin: OrderOrigin,
    pub channel_id: Uuid,

    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub billing_address_id: Option<Uuid>,
    pub shipping_address_id: Option<Uuid>,

    pub shipping_method_id: Option<Uuid>,
    pub shipping_method_name: Option<String>,
    pub collection_point_id: Option<Uuid>,
    pub base_shipping_price: Decimal,
    pub shipping_price_net: Decimal,
    pub shipping_price_gross: Decimal,
    pub shipping_tax_rate: Decimal,

    pub currency: String,
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub undiscounted_total_net: Decimal,
    pub undiscounted_total_gross: Decimal,
    pub total_charged: Decimal,
    pub total_authorized: Decimal,
    pub charge_status: PaymentCoverage,
    pub authorize_status: PaymentCoverage,

    pub tax_exemption: bool,
    pub customer_note: String,
    pub redirect_url: Option<String>,
    pub language_code: String,
    pub tracking_client_id: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub private_metadata: Json,

    /// Denormalized search text recomputed after lines are persisted.
    pub search_document: String,
    pub should_refresh_prices: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
