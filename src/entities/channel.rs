use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel strategy for how payment capture relates to order confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum MarkAsPaidStrategy {
    #[sea_orm(string_value = "payment_flow")]
    PaymentFlow,
    #[sea_orm(string_value = "transaction_flow")]
    TransactionFlow,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub slug: String,

    pub name: String,
    pub is_active: bool,
    pub currency: String,
    pub default_country: String,
    pub automatically_confirm_all_new_orders: bool,
    pub allow_unpaid_orders: bool,
    pub order_mark_as_paid_strategy: MarkAsPaidStrategy,
    /// Whether catalog prices on this channel are entered tax-inclusive.
    pub prices_entered_with_tax: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
