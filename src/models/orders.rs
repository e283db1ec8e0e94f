// ============================================================================
// MODEL : ORDERS
// ============================================================================
//
// Order header. The customer_* columns are a snapshot of the contact details
// submitted with the cart, not a live reference to users. user_id is only
// set when the cart was posted with a valid session credential.
//
// Points of attention:
//   - id is a v4 UUID generated before the transaction opens
//   - status is always 'pending' at creation, only admins change it
//   - total_amount starts at 0 (pricing is quoted by the shop afterwards)
//   - order_items rows reference this table with ON DELETE CASCADE
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[sea_orm(string_value = "pickup")]
    Pickup,
    #[sea_orm(string_value = "delivery")]
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "urgent")]
    Urgent,
    #[sea_orm(string_value = "rush")]
    Rush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    #[sea_orm(string_value = "phone")]
    Phone,
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "whatsapp")]
    Whatsapp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ContactTime {
    #[sea_orm(string_value = "morning")]
    Morning,
    #[sea_orm(string_value = "afternoon")]
    Afternoon,
    #[sea_orm(string_value = "evening")]
    Evening,
    #[sea_orm(string_value = "anytime")]
    Anytime,
}

/// Maps a free-form client value onto an enumerated column, falling back to
/// `default` for anything missing or unknown.
pub fn enum_or_default<E: ActiveEnum<Value = String>>(raw: Option<&str>, default: E) -> E {
    raw.and_then(|value| E::try_from_value(&value.to_string()).ok())
        .unwrap_or(default)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub customer_address: Option<String>,
    pub delivery_type: DeliveryType,
    #[sea_orm(column_type = "Text", nullable)]
    pub delivery_address: Option<String>,
    pub delivery_date: Option<Date>,
    pub delivery_time: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub special_instructions: Option<String>,
    pub urgency: Urgency,
    pub contact_method: ContactMethod,
    pub preferred_contact_time: ContactTime,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values_are_kept() {
        assert_eq!(enum_or_default(Some("delivery"), DeliveryType::Pickup), DeliveryType::Delivery);
        assert_eq!(enum_or_default(Some("rush"), Urgency::Normal), Urgency::Rush);
        assert_eq!(enum_or_default(Some("whatsapp"), ContactMethod::Phone), ContactMethod::Whatsapp);
    }

    #[test]
    fn test_unknown_or_missing_values_fall_back() {
        assert_eq!(enum_or_default(Some("drone"), DeliveryType::Pickup), DeliveryType::Pickup);
        assert_eq!(enum_or_default(None, ContactTime::Anytime), ContactTime::Anytime);
        assert_eq!(enum_or_default(Some(""), Urgency::Normal), Urgency::Normal);
    }
}
