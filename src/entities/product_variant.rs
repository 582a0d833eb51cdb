use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub sku: Option<String>,
    pub name: String,
    pub product_name: String,
    pub track_inventory: bool,
    pub is_shipping_required: bool,
    pub is_gift_card: bool,
    pub is_preorder: bool,
    /// Global cap on preorder units across all channels; None means unbounded.
    pub preorder_global_threshold: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
