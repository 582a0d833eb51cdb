use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable price/identity snapshot of a checkout line, owned by its order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub order_id: Uuid,
    pub variant_id: Option<Uuid>,

    pub product_name: String,
    pub variant_name: String,
    /// Empty when the translation equals the base name.
    pub translated_product_name: String,
    pub translated_variant_name: String,
    pub product_sku: Option<String>,

    pub quantity: i32,
    pub currency: String,

    pub base_unit_price: Decimal,
    pub undiscounted_base_unit_price: Decimal,
    pub unit_price_net: Decimal,
    pub unit_price_gross: Decimal,
    pub undiscounted_unit_price_net: Decimal,
    pub undiscounted_unit_price_gross: Decimal,
    pub undiscounted_total_price_net: Decimal,
    pub undiscounted_total_price_gross: Decimal,
    pub total_price_net: Decimal,
    pub total_price_gross: Decimal,
    pub tax_rate: Decimal,

    pub unit_discount_amount: Decimal,
    pub unit_discount_reason: Option<String>,
    pub voucher_code: Option<String>,
    pub sale_id: Option<String>,

    pub is_shipping_required: bool,
    pub is_gift_card: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub private_metadata: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
