use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use thiserror::Error;

use crate::error::AppError;
use crate::models::dto::{RegisterRequest, ResetMethod, ResetPasswordRequest};
use crate::models::otp_codes::OtpPurpose;
use crate::models::users::{self, Role, UserStatus};
use crate::services::email_service::{self, Notification, Notifier};
use crate::services::otp_service::OtpService;
use crate::utils::jwt::{ADMIN_TOKEN_TTL, JwtKeys, USER_TOKEN_TTL};
use crate::utils::password::{self, PasswordError};
use crate::utils::text::non_empty;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password share this variant.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Email, OTP, and new password are required")]
    MissingResetProof,

    #[error("User not found")]
    UserNotFound,

    #[error("User with this email already exists")]
    UserExists,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Invalid admin credentials")]
    InvalidAdminCredentials,

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::EmailNotVerified
            | AuthError::InvalidAdminCredentials => AppError::Unauthorized(err.to_string()),
            AuthError::InvalidOtp
            | AuthError::InvalidVerificationToken
            | AuthError::InvalidResetToken
            | AuthError::MissingResetProof
            | AuthError::AlreadyVerified => AppError::BadRequest(err.to_string()),
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::UserExists => AppError::Conflict(err.to_string()),
            AuthError::Database(e) => AppError::Database(e),
            AuthError::Password(e) => e.into(),
            AuthError::Token(e) => e.into(),
        }
    }
}

/// A freshly authenticated user and the session credential issued for it.
#[derive(Debug)]
pub struct Session {
    pub user: users::Model,
    pub token: String,
}

#[derive(Debug)]
pub struct Registration {
    pub user: users::Model,
    pub email_sent: bool,
}

pub struct AuthService;

impl AuthService {
    /// Creates a pending account and mails an email-verification code.
    pub async fn register(
        db: &DatabaseConnection,
        notifier: &dyn Notifier,
        req: &RegisterRequest,
    ) -> Result<Registration, AuthError> {
        // 1. Reject duplicates up front (the unique index catches races)
        if Self::find_by_email(db, &req.email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        // 2. Create the account
        let hashed = password::hash_password(&req.password)?;
        let now = Utc::now();
        let user = users::ActiveModel {
            name: Set(req.name.clone()),
            email: Set(req.email.clone()),
            password: Set(hashed),
            phone: Set(non_empty(req.phone.as_deref())),
            company: Set(non_empty(req.company.as_deref())),
            role: Set(Role::User),
            status: Set(UserStatus::Pending),
            email_verified: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AuthError::UserExists,
            _ => AuthError::Database(e),
        })?;

        // 3. Issue and mail the verification code
        let code = OtpService::issue_code(db, &user.email, OtpPurpose::EmailVerification).await?;
        let email_sent = email_service::deliver(
            notifier,
            &Notification::Otp {
                to: user.email.clone(),
                code,
                purpose: OtpPurpose::EmailVerification,
            },
        )
        .await;

        tracing::info!(user_id = user.id, email_sent, "User registered");

        Ok(Registration { user, email_sent })
    }

    /// Password login. The password is checked before any account state so
    /// that unknown and known emails are indistinguishable without it.
    pub async fn login(
        db: &DatabaseConnection,
        keys: &JwtKeys,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let user = Self::find_by_email(db, email).await?;

        let Some(user) = user else {
            password::verify_against_dummy(password);
            tracing::warn!("Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password) {
            tracing::warn!(user_id = user.id, "Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        ensure_can_sign_in(&user)?;

        let token = keys.generate_token(&user, USER_TOKEN_TTL)?;
        tracing::info!(user_id = user.id, "Login successful");

        Ok(Session { user, token })
    }

    pub async fn admin_login(
        db: &DatabaseConnection,
        keys: &JwtKeys,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let admin = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::Role.eq(Role::Admin))
            .one(db)
            .await?;

        let Some(admin) = admin else {
            password::verify_against_dummy(password);
            return Err(AuthError::InvalidAdminCredentials);
        };

        if !password::verify_password(password, &admin.password) {
            tracing::warn!(user_id = admin.id, "Admin login rejected");
            return Err(AuthError::InvalidAdminCredentials);
        }

        let token = keys.generate_token(&admin, ADMIN_TOKEN_TTL)?;
        tracing::info!(user_id = admin.id, "Admin login successful");

        Ok(Session { user: admin, token })
    }

    /// Mails a login code to an existing account. Returns whether the mail
    /// went out; the code is stored either way.
    pub async fn send_login_otp(
        db: &DatabaseConnection,
        notifier: &dyn Notifier,
        email: &str,
    ) -> Result<bool, AuthError> {
        let user = Self::find_by_email(db, email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let code = OtpService::issue_code(db, &user.email, OtpPurpose::Login).await?;
        let notification = Notification::Otp { to: user.email, code, purpose: OtpPurpose::Login };

        Ok(email_service::deliver(notifier, &notification).await)
    }

    /// Exchanges a login code for a session. A refused login (unknown or
    /// inactive account) rolls back, leaving the code unused.
    pub async fn verify_login_otp(
        db: &DatabaseConnection,
        keys: &JwtKeys,
        email: &str,
        otp: &str,
    ) -> Result<Session, AuthError> {
        let txn = db.begin().await?;

        OtpService::consume_code(&txn, email, otp, OtpPurpose::Login)
            .await?
            .ok_or(AuthError::InvalidOtp)?;

        let user = Self::find_by_email(&txn, email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.status == UserStatus::Inactive {
            txn.rollback().await?;
            return Err(AuthError::AccountInactive);
        }

        let token = keys.generate_token(&user, USER_TOKEN_TTL)?;
        txn.commit().await?;
        tracing::info!(user_id = user.id, "OTP login successful");

        Ok(Session { user, token })
    }

    /// Consumes an email-verification code and activates the account, both
    /// in one transaction.
    pub async fn verify_email_otp(db: &DatabaseConnection, email: &str, otp: &str) -> Result<(), AuthError> {
        let txn = db.begin().await?;

        OtpService::consume_code(&txn, email, otp, OtpPurpose::EmailVerification)
            .await?
            .ok_or(AuthError::InvalidOtp)?;

        users::Entity::update_many()
            .col_expr(users::Column::EmailVerified, Expr::value(true))
            .col_expr(users::Column::Status, Expr::value(UserStatus::Active))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Email.eq(email))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        tracing::info!("Email verified by OTP");

        Ok(())
    }

    pub async fn resend_verification_otp(
        db: &DatabaseConnection,
        notifier: &dyn Notifier,
        email: &str,
    ) -> Result<bool, AuthError> {
        let user = Self::unverified_user(db, email).await?;

        let code = OtpService::issue_code(db, &user.email, OtpPurpose::EmailVerification).await?;
        let notification = Notification::Otp {
            to: user.email,
            code,
            purpose: OtpPurpose::EmailVerification,
        };

        Ok(email_service::deliver(notifier, &notification).await)
    }

    pub async fn send_verification_link(
        db: &DatabaseConnection,
        notifier: &dyn Notifier,
        frontend_url: &str,
        email: &str,
    ) -> Result<bool, AuthError> {
        let user = Self::unverified_user(db, email).await?;

        let token = OtpService::issue_verification_token(db, user.id, &user.email).await?;
        let notification = Notification::VerificationLink {
            to: user.email,
            url: format!("{frontend_url}/verify-email?token={token}"),
        };

        Ok(email_service::deliver(notifier, &notification).await)
    }

    pub async fn verify_email_token(db: &DatabaseConnection, token: &str) -> Result<(), AuthError> {
        let txn = db.begin().await?;

        let record = OtpService::consume_verification_token(&txn, token)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        users::Entity::update_many()
            .col_expr(users::Column::EmailVerified, Expr::value(true))
            .col_expr(users::Column::Status, Expr::value(UserStatus::Active))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(record.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        tracing::info!(user_id = record.user_id, "Email verified by link");

        Ok(())
    }

    /// Starts a password reset, by code (default) or by link.
    pub async fn forgot_password(
        db: &DatabaseConnection,
        notifier: &dyn Notifier,
        frontend_url: &str,
        email: &str,
        method: ResetMethod,
    ) -> Result<bool, AuthError> {
        let user = Self::find_by_email(db, email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let notification = match method {
            ResetMethod::Otp => {
                let code = OtpService::issue_code(db, &user.email, OtpPurpose::PasswordReset).await?;
                Notification::Otp { to: user.email, code, purpose: OtpPurpose::PasswordReset }
            }
            ResetMethod::Link => {
                let token = OtpService::issue_reset_token(db, user.id).await?;
                Notification::PasswordResetLink {
                    to: user.email,
                    url: format!("{frontend_url}/reset-password?token={token}"),
                }
            }
        };

        Ok(email_service::deliver(notifier, &notification).await)
    }

    /// Changes the password if the proof (link token, or email + code) is
    /// valid. The proof is consumed in the same transaction as the update.
    pub async fn reset_password(db: &DatabaseConnection, req: &ResetPasswordRequest) -> Result<(), AuthError> {
        let hashed = password::hash_password(&req.new_password)?;

        let txn = db.begin().await?;

        let user_id = match (non_empty(req.token.as_deref()), &req.email, &req.otp) {
            (Some(token), _, _) => {
                OtpService::consume_reset_token(&txn, &token)
                    .await?
                    .ok_or(AuthError::InvalidResetToken)?
                    .user_id
            }
            (None, Some(email), Some(otp)) if !email.is_empty() && !otp.is_empty() => {
                OtpService::consume_code(&txn, email, otp, OtpPurpose::PasswordReset)
                    .await?
                    .ok_or(AuthError::InvalidOtp)?;

                // Dropping the transaction here rolls the consumption back
                Self::find_by_email(&txn, email)
                    .await?
                    .ok_or(AuthError::UserNotFound)?
                    .id
            }
            _ => return Err(AuthError::MissingResetProof),
        };

        users::Entity::update_many()
            .col_expr(users::Column::Password, Expr::value(hashed))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        tracing::info!(user_id, "Password reset");

        Ok(())
    }

    async fn find_by_email<C: ConnectionTrait>(conn: &C, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(conn)
            .await
    }

    async fn unverified_user(db: &DatabaseConnection, email: &str) -> Result<users::Model, AuthError> {
        let user = Self::find_by_email(db, email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        Ok(user)
    }
}

fn ensure_can_sign_in(user: &users::Model) -> Result<(), AuthError> {
    if user.status != UserStatus::Active {
        tracing::warn!(user_id = user.id, status = ?user.status, "Login rejected: account not active");
        return Err(if user.email_verified {
            AuthError::AccountInactive
        } else {
            AuthError::EmailNotVerified
        });
    }
    if !user.email_verified {
        return Err(AuthError::EmailNotVerified);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{email_verification_tokens, otp_codes, password_reset_tokens};
    use crate::services::email_service::tests::RecordingNotifier;
    use crate::services::otp_service::tests::otp_row;
    use crate::services::otp_service::{RESET_LINK_TTL, VERIFICATION_LINK_TTL};
    use crate::utils::jwt::tests::{test_keys, test_user};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected }
    }

    fn verification_row() -> email_verification_tokens::Model {
        let now = Utc::now();
        email_verification_tokens::Model {
            id: 3,
            user_id: 31,
            email: "asha@example.com".into(),
            verification_token: "a1b2c3".into(),
            expires_at: now + VERIFICATION_LINK_TTL,
            verified: false,
            created_at: now,
        }
    }

    fn reset_row() -> password_reset_tokens::Model {
        let now = Utc::now();
        password_reset_tokens::Model {
            id: 4,
            user_id: 31,
            reset_token: "deadbeef".into(),
            expires_at: now + RESET_LINK_TTL,
            used: false,
            created_at: now,
        }
    }

    fn user_with_password(password: &str) -> users::Model {
        users::Model {
            password: password::hash_password(password).unwrap(),
            ..test_user(Role::User)
        }
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let keys = test_keys();

        let unknown = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let unknown_err = AuthService::login(&unknown, &keys, "nobody@example.com", "whatever")
            .await
            .unwrap_err();

        let existing = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_with_password("right-password")]])
            .into_connection();
        let wrong_err = AuthService::login(&existing, &keys, "asha@example.com", "wrong-password")
            .await
            .unwrap_err();

        assert!(matches!(unknown_err, AuthError::InvalidCredentials));
        assert!(matches!(wrong_err, AuthError::InvalidCredentials));

        let (a, b): (AppError, AppError) = (unknown_err.into(), wrong_err.into());
        assert_eq!(a.to_string(), b.to_string());
        assert!(matches!((a, b), (AppError::Unauthorized(_), AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_login_success_issues_session() {
        let keys = test_keys();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_with_password("right-password")]])
            .into_connection();

        let session = AuthService::login(&db, &keys, "asha@example.com", "right-password")
            .await
            .unwrap();

        let claims = keys.verify_token(&session.token).unwrap();
        assert_eq!(claims.sub, session.user.id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn test_login_requires_verified_active_account() {
        let pending = users::Model {
            status: UserStatus::Pending,
            email_verified: false,
            ..user_with_password("pw")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pending]])
            .into_connection();

        let err = AuthService::login(&db, &test_keys(), "asha@example.com", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_user(Role::User)]])
            .into_connection();
        let notifier = RecordingNotifier::default();
        let req = RegisterRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: "pw".into(),
            phone: None,
            company: None,
        };

        let err = AuthService::register(&db, &notifier, &req).await.unwrap_err();
        assert_eq!(AppError::from(err).to_string(), "User with this email already exists");
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_login_otp_is_rejected() {
        // Expired rows are filtered out by the query, so nothing comes back
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<otp_codes::Model>::new()])
            .into_connection();

        let err = AuthService::verify_login_otp(&db, &test_keys(), "asha@example.com", "482913")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired OTP");

        // the code is never marked used
        let sql = format!("{:?}", db.into_transaction_log());
        assert!(!sql.contains("UPDATE"));
        assert!(!sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_login_otp_for_inactive_account_is_not_spent() {
        let inactive = users::Model { status: UserStatus::Inactive, ..test_user(Role::User) };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::Login)]])
            .append_exec_results([exec(1)])
            .append_query_results([vec![inactive]])
            .into_connection();

        let err = AuthService::verify_login_otp(&db, &test_keys(), "asha@example.com", "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive));

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("ROLLBACK"));
        assert!(!sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_login_otp_success_commits() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::Login)]])
            .append_exec_results([exec(1)])
            .append_query_results([vec![test_user(Role::User)]])
            .into_connection();

        let session = AuthService::verify_login_otp(&db, &test_keys(), "asha@example.com", "482913")
            .await
            .unwrap();
        assert_eq!(session.user.id, test_user(Role::User).id);

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("UPDATE \\\"otp_codes\\\""));
        assert!(sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_email_otp_verification_activates_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::EmailVerification)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();

        AuthService::verify_email_otp(&db, "asha@example.com", "482913")
            .await
            .unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);
        let consume = sql.find("UPDATE \\\"otp_codes\\\"").unwrap();
        let activate = sql.find("UPDATE \\\"users\\\"").unwrap();
        let commit = sql.find("COMMIT").unwrap();
        assert!(consume < activate && activate < commit);
        assert!(sql.contains("String(Some(\"active\"))"));
    }

    #[tokio::test]
    async fn test_wrong_email_otp_changes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<otp_codes::Model>::new()])
            .into_connection();

        let err = AuthService::verify_email_otp(&db, "asha@example.com", "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(!sql.contains("UPDATE"));
        assert!(!sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_verification_link_activates_token_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![verification_row()]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();

        AuthService::verify_email_token(&db, "a1b2c3").await.unwrap();

        let sql = format!("{:?}", db.into_transaction_log());
        let consume = sql.find("UPDATE \\\"email_verifications\\\"").unwrap();
        let activate = sql.find("UPDATE \\\"users\\\"").unwrap();
        assert!(consume < activate);
        assert!(sql.contains("Int(Some(31))"));
        assert!(sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_used_verification_link_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<email_verification_tokens::Model>::new()])
            .into_connection();

        let err = AuthService::verify_email_token(&db, "a1b2c3").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidVerificationToken));
        assert!(!format!("{:?}", db.into_transaction_log()).contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_issued_code() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_user(Role::User)]])
            .append_exec_results([exec(0), exec(0), exec(1)])
            .into_connection();
        let notifier = RecordingNotifier::failing();

        let sent = AuthService::send_login_otp(&db, &notifier, "asha@example.com")
            .await
            .unwrap();

        assert!(!sent);
        assert_eq!(notifier.sent().len(), 1);
    }

    fn reset_request(email: Option<&str>, otp: Option<&str>, token: Option<&str>) -> ResetPasswordRequest {
        ResetPasswordRequest {
            email: email.map(str::to_string),
            otp: otp.map(str::to_string),
            token: token.map(str::to_string),
            new_password: "new-pw".into(),
        }
    }

    #[tokio::test]
    async fn test_reset_by_otp_changes_password_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::PasswordReset)]])
            .append_exec_results([exec(1)])
            .append_query_results([vec![test_user(Role::User)]])
            .append_exec_results([exec(1)])
            .into_connection();

        let req = reset_request(Some("asha@example.com"), Some("482913"), None);
        AuthService::reset_password(&db, &req).await.unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);
        let consume = sql.find("UPDATE \\\"otp_codes\\\"").unwrap();
        let change = sql.find("UPDATE \\\"users\\\"").unwrap();
        let commit = sql.find("COMMIT").unwrap();
        assert!(consume < change && change < commit);
        assert_eq!(sql.matches("UPDATE \\\"users\\\"").count(), 1);
        assert!(sql.contains("$pbkdf2-sha256$"));
    }

    #[tokio::test]
    async fn test_reset_by_link_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![reset_row()]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();

        let req = reset_request(None, None, Some("deadbeef"));
        AuthService::reset_password(&db, &req).await.unwrap();

        let sql = format!("{:?}", db.into_transaction_log());
        let consume = sql.find("UPDATE \\\"password_reset_tokens\\\"").unwrap();
        let change = sql.find("UPDATE \\\"users\\\"").unwrap();
        assert!(consume < change);
        assert!(sql.contains("Int(Some(31))"));
        assert!(sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_reset_with_spent_code_keeps_password() {
        // A concurrent reset flipped the code first
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![otp_row(OtpPurpose::PasswordReset)]])
            .append_exec_results([exec(0)])
            .into_connection();

        let req = reset_request(Some("asha@example.com"), Some("482913"), None);
        let err = AuthService::reset_password(&db, &req).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(!sql.contains("UPDATE \\\"users\\\""));
        assert!(!sql.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_reset_without_proof() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let req = ResetPasswordRequest {
            email: Some("asha@example.com".into()),
            otp: None,
            token: None,
            new_password: "new-pw".into(),
        };

        let err = AuthService::reset_password(&db, &req).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingResetProof));
    }
}
