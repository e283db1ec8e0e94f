use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::models::dto::AddressRequest;
use crate::models::{user_addresses, users};
use crate::utils::text::non_empty;

const DEFAULT_COUNTRY: &str = "India";

/// Self-service reads and writes for a signed-in customer.
pub struct AccountService;

impl AccountService {
    pub async fn profile(db: &DatabaseConnection, user_id: i32) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(user_id).one(db).await
    }

    /// Default address first, then newest first.
    pub async fn list_addresses(db: &DatabaseConnection, user_id: i32) -> Result<Vec<user_addresses::Model>, DbErr> {
        user_addresses::Entity::find()
            .filter(user_addresses::Column::UserId.eq(user_id))
            .order_by_desc(user_addresses::Column::IsDefault)
            .order_by_desc(user_addresses::Column::CreatedAt)
            .all(db)
            .await
    }

    /// Saves an address. A new default clears the flag on the user's other
    /// addresses in the same transaction.
    pub async fn add_address(
        db: &DatabaseConnection,
        user_id: i32,
        req: &AddressRequest,
    ) -> Result<user_addresses::Model, DbErr> {
        let txn = db.begin().await?;

        if req.is_default {
            user_addresses::Entity::update_many()
                .col_expr(user_addresses::Column::IsDefault, Expr::value(false))
                .filter(user_addresses::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;
        }

        let address = user_addresses::ActiveModel {
            user_id: Set(user_id),
            name: Set(req.name.clone()),
            phone: Set(req.phone.clone()),
            address: Set(req.address.clone()),
            city: Set(non_empty(req.city.as_deref())),
            state: Set(non_empty(req.state.as_deref())),
            pincode: Set(non_empty(req.pincode.as_deref())),
            country: Set(non_empty(req.country.as_deref()).unwrap_or_else(|| DEFAULT_COUNTRY.to_string())),
            is_default: Set(req.is_default),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        Ok(address)
    }
}
