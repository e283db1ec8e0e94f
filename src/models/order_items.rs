// ============================================================================
// MODEL : ORDER ITEMS
// ============================================================================
//
// One row per cart line, inserted only inside the order creation
// transaction and never updated afterwards. product_* is a snapshot of what
// the customer picked; options holds the item's free-form key/value choices
// serialized as JSON text.
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: Uuid,
    pub product_name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub product_description: Option<String>,
    pub product_icon: Option<String>,
    pub quantity: i32,
    #[sea_orm(column_type = "Text")]
    pub options: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
