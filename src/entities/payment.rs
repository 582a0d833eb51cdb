use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub checkout_token: Option<Uuid>,
    pub order_id: Option<Uuid>,

    pub gateway: String,
    pub is_active: bool,
    /// Gateway requires a confirm step instead of a fresh process call.
    pub to_confirm: bool,
    pub token: Option<String>,
    pub psp_reference: Option<String>,

    pub currency: String,
    pub total: Decimal,
    pub captured_amount: Decimal,
    pub charge_status: String,

    pub created_at: DateTimeUtc,
    pub modified_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
