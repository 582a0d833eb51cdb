use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub street_address_1: String,
    pub street_address_2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
    pub phone: Option<String>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// A fresh row with identical postal fields and a new identity. Orders
    /// always own a private copy so later edits to a customer's address book
    /// cannot mutate the order.
    pub fn private_copy(&self) -> ActiveModel {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(self.first_name.clone()),
            last_name: Set(self.last_name.clone()),
            company: Set(self.company.clone()),
            street_address_1: Set(self.street_address_1.clone()),
            street_address_2: Set(self.street_address_2.clone()),
            city: Set(self.city.clone()),
            postal_code: Set(self.postal_code.clone()),
            country_code: Set(self.country_code.clone()),
            phone: Set(self.phone.clone()),
            created_at: Set(Utc::now()),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
