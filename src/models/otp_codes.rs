// ============================================================================
// MODEL : OTP CODES
// ============================================================================
//
// Columns of the otp_codes table:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - email (VARCHAR, NOT NULL)
//   - otp_code (VARCHAR(6), NOT NULL) - 100000..=999999
//   - purpose ('login' | 'password_reset' | 'email_verification')
//   - expires_at (TIMESTAMPTZ, NOT NULL) - created_at + 10 minutes
//   - used (BOOLEAN, DEFAULT FALSE, NOT NULL)
//   - created_at (TIMESTAMPTZ)
//
// There is no FK to users: codes are addressed by email so that a code can
// be issued before the account row is committed (registration).
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    #[sea_orm(string_value = "login")]
    Login,
    #[sea_orm(string_value = "password_reset")]
    PasswordReset,
    #[sea_orm(string_value = "email_verification")]
    EmailVerification,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "otp_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub email: String,
    #[sea_orm(column_type = "String(StringLen::N(6))")]
    pub otp_code: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTimeUtc,
    pub used: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
