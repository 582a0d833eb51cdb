use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-channel pricing for a variant. `price_amount` already carries any
/// promotion discount; `undiscounted_price_amount` is the catalog price.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variant_channel_listings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub variant_id: Uuid,
    pub channel_id: Uuid,
    pub price_amount: Decimal,
    pub undiscounted_price_amount: Decimal,
    /// Channel-scoped cap on preorder units; None means unbounded.
    pub preorder_quantity_threshold: Option<i32>,
    /// Preorder units already allocated on this channel.
    pub preorder_quantity_allocated: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
