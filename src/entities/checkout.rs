use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much of the checkout total the associated payment transactions cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AuthorizeStatus {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "full")]
    Full,
}

/// Mutable pre-order shopping session, identified by token. Deleted once an
/// order is successfully materialized for it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkouts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub token: Uuid,

    pub channel_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub currency: String,
    pub country_code: String,
    pub language_code: String,

    pub billing_address_id: Option<Uuid>,
    pub shipping_address_id: Option<Uuid>,
    pub shipping_method_id: Option<Uuid>,
    /// Click-and-collect warehouse when the buyer picks up in person.
    pub collection_point_id: Option<Uuid>,

    pub voucher_code: Option<String>,
    pub discount_amount: Decimal,
    pub discount_name: Option<String>,
    pub translated_discount_name: Option<String>,

    pub redirect_url: Option<String>,
    pub note: String,
    pub tracking_code: Option<String>,
    pub tax_exemption: bool,
    pub authorize_status: AuthorizeStatus,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub private_metadata: Json,

    pub created_at: DateTimeUtc,
    pub last_change: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
