use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::*;
use uuid::Uuid;

use crate::models::dto::{CustomerInfo, DeliveryInfo, OrderItemInput, OrderWithItems, Preferences};
use crate::models::orders::{self, ContactMethod, ContactTime, DeliveryType, OrderStatus, Urgency, enum_or_default};
use crate::models::order_items;
use crate::utils::text::non_empty;

/// A validated cart, ready to persist.
pub struct NewOrder<'a> {
    pub items: &'a [OrderItemInput],
    pub customer: &'a CustomerInfo,
    pub delivery: Option<&'a DeliveryInfo>,
    pub preferences: Option<&'a Preferences>,
    /// Set when a signed-in customer placed the order.
    pub user_id: Option<i32>,
}

pub struct OrderService;

impl OrderService {
    /// Persists the header and every item atomically and returns the new id.
    ///
    /// Any failing insert drops the transaction, which rolls back the header
    /// and the items already written.
    pub async fn create(db: &DatabaseConnection, order: NewOrder<'_>) -> Result<Uuid, DbErr> {
        // 1. Id assigned before the transaction so failures can be logged with it
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let delivery = order.delivery;
        let preferences = order.preferences;

        let header = orders::ActiveModel {
            id: Set(order_id),
            user_id: Set(order.user_id),
            customer_name: Set(order.customer.name.clone()),
            customer_email: Set(order.customer.email.clone()),
            customer_phone: Set(non_empty(order.customer.phone.as_deref())),
            customer_company: Set(non_empty(order.customer.company.as_deref())),
            customer_address: Set(non_empty(order.customer.address.as_deref())),
            delivery_type: Set(enum_or_default(
                delivery.and_then(|d| d.delivery_type.as_deref()),
                DeliveryType::Pickup,
            )),
            delivery_address: Set(non_empty(delivery.and_then(|d| d.delivery_address.as_deref()))),
            delivery_date: Set(delivery.and_then(|d| parse_date(d.delivery_date.as_deref()))),
            delivery_time: Set(non_empty(delivery.and_then(|d| d.delivery_time.as_deref()))),
            special_instructions: Set(non_empty(delivery.and_then(|d| d.special_instructions.as_deref()))),
            urgency: Set(enum_or_default(preferences.and_then(|p| p.urgency.as_deref()), Urgency::Normal)),
            contact_method: Set(enum_or_default(
                preferences.and_then(|p| p.contact_method.as_deref()),
                ContactMethod::Phone,
            )),
            preferred_contact_time: Set(enum_or_default(
                preferences.and_then(|p| p.preferred_contact_time.as_deref()),
                ContactTime::Anytime,
            )),
            status: Set(OrderStatus::Pending),
            total_amount: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // 2. Header then items, in input order, inside one transaction
        let txn = db.begin().await?;

        orders::Entity::insert(header).exec_without_returning(&txn).await?;

        for item in order.items {
            let row = order_items::ActiveModel {
                order_id: Set(order_id),
                product_name: Set(item.name.clone()),
                product_description: Set(non_empty(item.description.as_deref())),
                product_icon: Set(non_empty(item.icon.as_deref())),
                quantity: Set(item.quantity_or_default()),
                options: Set(item.options_text()),
                created_at: Set(now),
                ..Default::default()
            };
            order_items::Entity::insert(row).exec_without_returning(&txn).await?;
        }

        // 3. Commit
        txn.commit().await?;

        tracing::info!(%order_id, item_count = order.items.len(), "Order created");

        Ok(order_id)
    }

    /// Header plus items, items in insertion order.
    pub async fn find_with_items(db: &DatabaseConnection, order_id: Uuid) -> Result<Option<OrderWithItems>, DbErr> {
        let Some(order) = orders::Entity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .order_by_asc(order_items::Column::Id)
            .all(db)
            .await?;

        Ok(Some(OrderWithItems::new(order, items)))
    }

    /// Every order, newest first.
    pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<OrderWithItems>, DbErr> {
        let orders = orders::Entity::find()
            .order_by_desc(orders::Column::CreatedAt)
            .all(db)
            .await?;

        Self::attach_items(db, orders).await
    }

    /// Orders placed with the given contact email, newest first.
    pub async fn list_for_email(db: &DatabaseConnection, email: &str) -> Result<Vec<OrderWithItems>, DbErr> {
        let orders = orders::Entity::find()
            .filter(orders::Column::CustomerEmail.eq(email))
            .order_by_desc(orders::Column::CreatedAt)
            .all(db)
            .await?;

        Self::attach_items(db, orders).await
    }

    /// Loads the items of all given orders in one query and groups them.
    async fn attach_items(db: &DatabaseConnection, orders: Vec<orders::Model>) -> Result<Vec<OrderWithItems>, DbErr> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.is_in(ids))
            .order_by_asc(order_items::Column::Id)
            .all(db)
            .await?;

        let mut by_order: HashMap<Uuid, Vec<order_items::Model>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems::new(order, items)
            })
            .collect())
    }
}

/// `YYYY-MM-DD`; anything else is dropped.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::debug!(value = raw, "Ignoring unparseable delivery date");
            None
        }
    }
}
