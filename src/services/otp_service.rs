use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::models::otp_codes::{self, OtpPurpose};
use crate::models::{email_verification_tokens, password_reset_tokens};
use crate::utils::codes::{generate_link_token, generate_otp};

pub const OTP_TTL: Duration = Duration::minutes(10);
pub const VERIFICATION_LINK_TTL: Duration = Duration::hours(24);
pub const RESET_LINK_TTL: Duration = Duration::hours(1);

/// Issue and consumption of one-time codes and link tokens.
///
/// Every issuance replaces the previous unused code/token of the same
/// subject inside one transaction, holding a per-subject advisory lock so
/// concurrent issuers queue instead of both inserting. Every consumption is
/// a conditional update on the row id, so a code produces at most one side
/// effect even when two verifications race.
pub struct OtpService;

impl OtpService {
    /// Stores a fresh 6-digit code for (email, purpose) and returns it.
    pub async fn issue_code(
        db: &DatabaseConnection,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<String, DbErr> {
        let code = generate_otp();
        let now = Utc::now();

        let txn = db.begin().await?;
        lock_subject(&txn, &format!("otp:{email}:{}", purpose.to_value())).await?;

        // 1. Invalidate previous codes for the same purpose
        otp_codes::Entity::delete_many()
            .filter(otp_codes::Column::Email.eq(email))
            .filter(otp_codes::Column::Purpose.eq(purpose))
            .filter(otp_codes::Column::Used.eq(false))
            .exec(&txn)
            .await?;

        // 2. Store the new one
        let record = otp_codes::ActiveModel {
            email: Set(email.to_string()),
            otp_code: Set(code.clone()),
            purpose: Set(purpose),
            expires_at: Set(now + OTP_TTL),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        };
        otp_codes::Entity::insert(record)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;

        Ok(code)
    }

    /// Marks a matching, unused, unexpired code as used.
    ///
    /// `None` covers unknown, expired, already used, and lost races alike.
    pub async fn consume_code<C: ConnectionTrait>(
        conn: &C,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<otp_codes::Model>, DbErr> {
        let record = otp_codes::Entity::find()
            .filter(otp_codes::Column::Email.eq(email))
            .filter(otp_codes::Column::OtpCode.eq(code))
            .filter(otp_codes::Column::Purpose.eq(purpose))
            .filter(otp_codes::Column::Used.eq(false))
            .filter(otp_codes::Column::ExpiresAt.gt(Utc::now()))
            .one(conn)
            .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let result = otp_codes::Entity::update_many()
            .col_expr(otp_codes::Column::Used, Expr::value(true))
            .filter(otp_codes::Column::Id.eq(record.id))
            .filter(otp_codes::Column::Used.eq(false))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Replaces the user's verification tokens with a new 24h one.
    pub async fn issue_verification_token(
        db: &DatabaseConnection,
        user_id: i32,
        email: &str,
    ) -> Result<String, DbErr> {
        let token = generate_link_token();
        let now = Utc::now();

        let txn = db.begin().await?;
        lock_subject(&txn, &format!("verification:{user_id}")).await?;

        email_verification_tokens::Entity::delete_many()
            .filter(email_verification_tokens::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let record = email_verification_tokens::ActiveModel {
            user_id: Set(user_id),
            email: Set(email.to_string()),
            verification_token: Set(token.clone()),
            expires_at: Set(now + VERIFICATION_LINK_TTL),
            verified: Set(false),
            created_at: Set(now),
            ..Default::default()
        };
        email_verification_tokens::Entity::insert(record)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;

        Ok(token)
    }

    pub async fn consume_verification_token<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<Option<email_verification_tokens::Model>, DbErr> {
        let record = email_verification_tokens::Entity::find()
            .filter(email_verification_tokens::Column::VerificationToken.eq(token))
            .filter(email_verification_tokens::Column::Verified.eq(false))
            .filter(email_verification_tokens::Column::ExpiresAt.gt(Utc::now()))
            .one(conn)
            .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let result = email_verification_tokens::Entity::update_many()
            .col_expr(email_verification_tokens::Column::Verified, Expr::value(true))
            .filter(email_verification_tokens::Column::Id.eq(record.id))
            .filter(email_verification_tokens::Column::Verified.eq(false))
            .exec(conn)
            .await?;

        Ok((result.rows_affected > 0).then_some(record))
    }

    /// Replaces the user's reset tokens with a new 1h one.
    pub async fn issue_reset_token(db: &DatabaseConnection, user_id: i32) -> Result<String, DbErr> {
        let token = generate_link_token();
        let now = Utc::now();

        let txn = db.begin().await?;
        lock_subject(&txn, &format!("reset:{user_id}")).await?;

        password_reset_tokens::Entity::delete_many()
            .filter(password_reset_tokens::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let record = password_reset_tokens::ActiveModel {
            user_id: Set(user_id),
            reset_token: Set(token.clone()),
            expires_at: Set(now + RESET_LINK_TTL),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        };
        password_reset_tokens::Entity::insert(record)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;

        Ok(token)
    }

    pub async fn consume_reset_token<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<Option<password_reset_tokens::Model>, DbErr> {
        let record = password_reset_tokens::Entity::find()
            .filter(password_reset_tokens::Column::ResetToken.eq(token))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(Utc::now()))
            .one(conn)
            .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let result = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Id.eq(record.id))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .exec(conn)
            .await?;

        Ok((result.rows_affected > 0).then_some(record))
    }
}

/// Blocks other issuers of the same subject until `txn` ends. Under READ
/// COMMITTED a waiting issuer's delete then sees the row committed ahead of
/// it.
async fn lock_subject(txn: &DatabaseTransaction, subject: &str) -> Result<(), DbErr> {
    txn.execute(Statement::from_sql_and_values(
        txn.get_database_backend(),
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        [subject.into()],
    ))
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn otp_row(purpose: OtpPurpose) -> otp_codes::Model {
        let now = Utc::now();
        otp_codes::Model {
            id: 7,
            email: "asha@example.com".to_string(),
            otp_code: "482913".to_string(),
            purpose,
            expires_at: now + OTP_TTL,
            used: false,
            created_at: now,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected }
    }

    #[tokio::test]
    async fn test_issue_code_replaces_unused_codes_under_lock() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0), exec(1), exec(1)])
            .into_connection();

        let code = OtpService::issue_code(&db, "asha@example.com", OtpPurpose::Login)
            .await
            .unwrap();
        assert_eq!(code.len(), 6);

        // lock, delete and insert grouped under a single BEGIN/COMMIT
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);

        let lock = sql.find("pg_advisory_xact_lock").unwrap();
        let delete = sql.find("DELETE FROM \\\"otp_codes\\\"").unwrap();
        let insert = sql.find("INSERT INTO \\\"otp_codes\\\"").unwrap();
        let commit = sql.find("COMMIT").unwrap();
        assert!(lock < delete && delete < insert && insert < commit);
        assert!(sql.contains("otp:asha@example.com:login"));

        // only unused codes of this email and purpose are removed
        let delete_stmt = &sql[delete..insert];
        assert!(delete_stmt.contains("\\\"email\\\""));
        assert!(delete_stmt.contains("\\\"purpose\\\""));
        assert!(delete_stmt.contains("\\\"used\\\""));
        assert!(delete_stmt.contains("Bool(Some(false))"));
    }

    #[tokio::test]
    async fn test_reset_token_issue_is_locked_per_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0), exec(1), exec(1)])
            .into_connection();

        let token = OtpService::issue_reset_token(&db, 42).await.unwrap();
        assert_eq!(token.len(), 64);

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("reset:42"));
        assert!(sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_consume_unknown_code() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<otp_codes::Model>::new()])
            .into_connection();

        let consumed = OtpService::consume_code(&db, "asha@example.com", "000000", OtpPurpose::Login)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn test_consume_marks_used_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::Login)]])
            .append_exec_results([exec(1)])
            .into_connection();

        let consumed = OtpService::consume_code(&db, "asha@example.com", "482913", OtpPurpose::Login)
            .await
            .unwrap();
        assert_eq!(consumed.map(|c| c.id), Some(7));
    }

    #[tokio::test]
    async fn test_consume_lost_race_is_rejected() {
        // The row was visible, but a concurrent verification flipped it first
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::Login)]])
            .append_exec_results([exec(0)])
            .into_connection();

        let consumed = OtpService::consume_code(&db, "asha@example.com", "482913", OtpPurpose::Login)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn test_consume_used_reset_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<password_reset_tokens::Model>::new()])
            .into_connection();

        let consumed = OtpService::consume_reset_token(&db, "deadbeef").await.unwrap();
        assert!(consumed.is_none());
    }
}
