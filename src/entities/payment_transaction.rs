use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TransactionKind {
    #[sea_orm(string_value = "auth")]
    Auth,
    #[sea_orm(string_value = "capture")]
    Capture,
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "refund_ongoing")]
    RefundOngoing,
    #[sea_orm(string_value = "void")]
    Void,
}

/// A gateway or transaction-flow money movement. Rows created during checkout
/// reference the checkout token and are reassigned to the order on completion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub payment_id: Option<Uuid>,
    pub checkout_token: Option<Uuid>,
    pub order_id: Option<Uuid>,

    pub kind: TransactionKind,
    pub is_success: bool,
    pub amount: Decimal,
    pub currency: String,

    pub action_required: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub action_required_data: Json,
    pub customer_id: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
