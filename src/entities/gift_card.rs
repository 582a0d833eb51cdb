use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gift_cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub code: String,

    pub is_active: bool,
    pub expiry_date: Option<Date>,
    pub currency: String,
    pub initial_balance_amount: Decimal,
    pub current_balance_amount: Decimal,
    /// Set when the card was spent on an order at checkout completion.
    pub used_in_order_id: Option<Uuid>,
    pub last_used_on: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
