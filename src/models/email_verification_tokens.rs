// ============================================================================
// MODEL : EMAIL VERIFICATIONS
// ============================================================================
//
// Columns of the email_verifications table:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id (INTEGER, NOT NULL, FK to users, ON DELETE CASCADE)
//   - email (VARCHAR, NOT NULL) - address the link was mailed to
//   - verification_token (VARCHAR, UNIQUE, NOT NULL) - 64 hex chars
//   - expires_at (TIMESTAMPTZ, NOT NULL) - created_at + 24 hours
//   - verified (BOOLEAN, DEFAULT FALSE, NOT NULL)
//   - created_at (TIMESTAMPTZ)
//
// Workflow:
//   1. POST /api/auth/send-verification deletes the user's previous tokens
//   2. A fresh 256-bit token is stored and mailed as
//      ${FRONTEND_URL}/verify-email?token=xxx
//   3. GET /api/auth/verify-email?token=xxx checks: exists, not expired, not verified
//   4. users.email_verified = true, users.status = active, verified = true
//
// Points of attention:
//   - A token can only be consumed once (verified = true)
//   - Expired tokens are never swept, they just stop matching
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_verifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    pub email: String,

    #[sea_orm(unique)]
    pub verification_token: String,

    pub expires_at: DateTimeUtc,

    pub verified: bool,

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
