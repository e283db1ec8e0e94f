use chrono::Utc;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::*;
use uuid::Uuid;

use crate::models::contact_messages::{self, ContactStatus};
use crate::models::orders::{self, OrderStatus};
use crate::models::users::{self, Role, UserStatus};
use crate::models::{email_verification_tokens, order_items, otp_codes, password_reset_tokens, user_addresses};

/// Mutations behind the admin panel. Every multi-table delete runs in one
/// transaction so a failure leaves no orphaned rows. A `false`/`0` result
/// means the target did not exist.
pub struct AdminService;

impl AdminService {
    pub async fn update_order_status(db: &DatabaseConnection, order_id: Uuid, status: OrderStatus) -> Result<bool, DbErr> {
        let result = orders::Entity::update_many()
            .col_expr(orders::Column::Status, Expr::value(status))
            .col_expr(orders::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(orders::Column::Id.eq(order_id))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Items first, then the header.
    pub async fn delete_order(db: &DatabaseConnection, order_id: Uuid) -> Result<bool, DbErr> {
        let txn = db.begin().await?;

        order_items::Entity::delete_many()
            .filter(order_items::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;

        let deleted = orders::Entity::delete_many()
            .filter(orders::Column::Id.eq(order_id))
            .exec(&txn)
            .await?;

        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        txn.commit().await?;
        tracing::info!(%order_id, "Order deleted");

        Ok(true)
    }

    /// Deletes every order currently in `status` and returns how many went.
    pub async fn delete_orders_by_status(db: &DatabaseConnection, status: OrderStatus) -> Result<u64, DbErr> {
        let txn = db.begin().await?;

        let ids: Vec<Uuid> = orders::Entity::find()
            .select_only()
            .column(orders::Column::Id)
            .filter(orders::Column::Status.eq(status))
            .into_tuple()
            .all(&txn)
            .await?;

        if ids.is_empty() {
            txn.rollback().await?;
            return Ok(0);
        }

        let deleted = Self::delete_orders_in(&txn, ids).await?;

        txn.commit().await?;
        tracing::info!(?status, deleted, "Orders deleted by status");

        Ok(deleted)
    }

    pub async fn update_user_status(db: &DatabaseConnection, user_id: i32, status: UserStatus) -> Result<bool, DbErr> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value(status))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Removes a customer and everything hanging off the account: orders
    /// (owned or placed with the account email) and their items, saved
    /// addresses, verification/reset tokens and one-time codes.
    pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<bool, DbErr> {
        let txn = db.begin().await?;

        // 1. The account itself, for its email
        let Some(user) = users::Entity::find_by_id(user_id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(false);
        };

        // 2. Orders and their items
        let order_ids: Vec<Uuid> = orders::Entity::find()
            .select_only()
            .column(orders::Column::Id)
            .filter(
                Condition::any()
                    .add(orders::Column::UserId.eq(user_id))
                    .add(orders::Column::CustomerEmail.eq(user.email.as_str())),
            )
            .into_tuple()
            .all(&txn)
            .await?;
        let order_count = if order_ids.is_empty() {
            0
        } else {
            Self::delete_orders_in(&txn, order_ids).await?
        };

        // 3. Per-user rows
        user_addresses::Entity::delete_many()
            .filter(user_addresses::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        email_verification_tokens::Entity::delete_many()
            .filter(email_verification_tokens::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        password_reset_tokens::Entity::delete_many()
            .filter(password_reset_tokens::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        otp_codes::Entity::delete_many()
            .filter(otp_codes::Column::Email.eq(user.email.as_str()))
            .exec(&txn)
            .await?;

        // 4. The user
        users::Entity::delete_by_id(user_id).exec(&txn).await?;

        txn.commit().await?;
        tracing::info!(user_id, order_count, "User and related data deleted");

        Ok(true)
    }

    /// Customers only, newest first.
    pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Role.eq(Role::User))
            .order_by_desc(users::Column::CreatedAt)
            .all(db)
            .await
    }

    pub async fn list_contacts(db: &DatabaseConnection) -> Result<Vec<contact_messages::Model>, DbErr> {
        contact_messages::Entity::find()
            .order_by_desc(contact_messages::Column::CreatedAt)
            .all(db)
            .await
    }

    pub async fn update_contact_status(db: &DatabaseConnection, contact_id: i32, status: ContactStatus) -> Result<bool, DbErr> {
        let result = contact_messages::Entity::update_many()
            .col_expr(contact_messages::Column::Status, Expr::value(status))
            .col_expr(contact_messages::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(contact_messages::Column::Id.eq(contact_id))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete_orders_in(txn: &DatabaseTransaction, ids: Vec<Uuid>) -> Result<u64, DbErr> {
        order_items::Entity::delete_many()
            .filter(order_items::Column::OrderId.is_in(ids.clone()))
            .exec(txn)
            .await?;

        let deleted = orders::Entity::delete_many()
            .filter(orders::Column::Id.is_in(ids))
            .exec(txn)
            .await?;

        Ok(deleted.rows_affected)
    }
}
