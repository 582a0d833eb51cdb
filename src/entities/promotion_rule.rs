use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotion_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    pub promotion_name: String,
    /// Identifier of the legacy sale this promotion was migrated from, if any.
    pub old_sale_id: Option<String>,
}

impl Model {
    /// Stable identifier used in discount reasons and order line snapshots.
    pub fn sale_id(&self) -> String {
        self.old_sale_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
