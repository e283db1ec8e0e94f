// ============================================================================
// MODEL : PASSWORD RESET TOKENS
// ============================================================================
//
// Columns of the password_reset_tokens table:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id (INTEGER, NOT NULL, FK to users, ON DELETE CASCADE)
//   - reset_token (VARCHAR, UNIQUE, NOT NULL) - 64 hex chars
//   - expires_at (TIMESTAMPTZ, NOT NULL) - created_at + 1 hour
//   - used (BOOLEAN, DEFAULT FALSE, NOT NULL)
//   - created_at (TIMESTAMPTZ)
//
// Workflow:
//   1. POST /api/auth/forgot-password with "method": "link"
//   2. Previous tokens of the user are deleted, a new one is stored
//   3. Link ${FRONTEND_URL}/reset-password?token=xxx is mailed
//   4. POST /api/auth/reset-password with token + newPassword
//   5. Token is marked used and the password changed in one transaction
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "password_reset_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    #[sea_orm(unique)]
    pub reset_token: String,

    pub expires_at: DateTimeUtc,

    pub used: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
