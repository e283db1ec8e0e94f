use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde_json::json;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    AddressRequest, AuthResponse, EmailRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetMethod, ResetPasswordRequest, UserView, VerifyEmailQuery, VerifyOtpRequest,
};
use crate::services::account_service::AccountService;
use crate::services::auth_service::{AuthError, AuthService, Session};
use crate::services::email_service::Notifier;
use crate::services::order_service::OrderService;
use crate::utils::jwt::JwtKeys;

/// Message for an issuing endpoint: the code is stored either way, only
/// the wording changes when the mail did not go out.
fn delivery_message(email_sent: bool, sent: &str) -> String {
    if email_sent {
        sent.to_string()
    } else {
        "Your code was generated but the email could not be delivered. Please try again shortly.".to_string()
    }
}

fn session_response(session: Session, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: message.to_string(),
        token: session.token,
        user: UserView::from(&session.user),
    })
}

/// POST /auth/register - Create a pending account (PUBLIC)
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let registration = AuthService::register(db.get_ref(), notifier.get_ref(), &body).await?;

    let message = if registration.email_sent {
        "User registered successfully. Please check your email for the OTP to verify your account."
    } else {
        "User registered successfully, but the verification email could not be sent. Please request a new OTP."
    };

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": message,
        "requiresVerification": true,
        "verificationType": "otp",
        "emailSent": registration.email_sent,
        "user": UserView::from(&registration.user),
    })))
}

/// POST /auth/login - Password login (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    keys: web::Data<JwtKeys>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    match AuthService::login(db.get_ref(), &keys, &body.email, &body.password).await {
        Ok(session) => Ok(session_response(session, "Login successful")),
        // The storefront switches to the verification screen on this flag
        Err(err @ AuthError::EmailNotVerified) => Ok(HttpResponse::Unauthorized().json(json!({
            "success": false,
            "message": err.to_string(),
            "requiresVerification": true,
        }))),
        Err(err) => Err(err.into()),
    }
}

/// POST /auth/send-otp - Mail a login code (PUBLIC)
#[post("/send-otp")]
pub async fn send_otp(
    body: web::Json<EmailRequest>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email_sent = AuthService::send_login_otp(db.get_ref(), notifier.get_ref(), &body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": delivery_message(email_sent, "OTP sent successfully"),
        "emailSent": email_sent,
    })))
}

/// POST /auth/verify-otp - Log in with a mailed code (PUBLIC)
#[post("/verify-otp")]
pub async fn verify_otp(
    body: web::Json<VerifyOtpRequest>,
    db: web::Data<DatabaseConnection>,
    keys: web::Data<JwtKeys>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let session = AuthService::verify_login_otp(db.get_ref(), &keys, &body.email, &body.otp).await?;

    Ok(session_response(session, "Login successful"))
}

/// POST /auth/verify-email-otp - Confirm the signup code (PUBLIC)
#[post("/verify-email-otp")]
pub async fn verify_email_otp(
    body: web::Json<VerifyOtpRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    AuthService::verify_email_otp(db.get_ref(), &body.email, &body.otp).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Email verified successfully! You can now login to your account.",
    })))
}

/// POST /auth/send-verification - Mail a verification link (PUBLIC)
#[post("/send-verification")]
pub async fn send_verification(
    body: web::Json<EmailRequest>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email_sent =
        AuthService::send_verification_link(db.get_ref(), notifier.get_ref(), &config.frontend_url, &body.email)
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": delivery_message(email_sent, "Verification email sent successfully"),
        "emailSent": email_sent,
    })))
}

/// GET /auth/verify-email?token= - Follow a verification link (PUBLIC)
#[get("/verify-email")]
pub async fn verify_email(
    query: web::Query<VerifyEmailQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Verification token is required".to_string()))?;

    AuthService::verify_email_token(db.get_ref(), token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Email verified successfully",
    })))
}

/// POST /auth/resend-verification-otp - New signup code (PUBLIC)
#[post("/resend-verification-otp")]
pub async fn resend_verification_otp(
    body: web::Json<EmailRequest>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email_sent = AuthService::resend_verification_otp(db.get_ref(), notifier.get_ref(), &body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": delivery_message(email_sent, "OTP sent successfully"),
        "emailSent": email_sent,
    })))
}

/// POST /auth/forgot-password - Start a reset by code or link (PUBLIC)
#[post("/forgot-password")]
pub async fn forgot_password(
    body: web::Json<ForgotPasswordRequest>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email_sent = AuthService::forgot_password(
        db.get_ref(),
        notifier.get_ref(),
        &config.frontend_url,
        &body.email,
        body.method,
    )
    .await?;

    let response = match body.method {
        ResetMethod::Otp => json!({
            "success": true,
            "message": delivery_message(email_sent, "Password reset OTP sent successfully. Please check your email."),
            "requiresOTP": true,
            "email": body.email,
            "emailSent": email_sent,
        }),
        ResetMethod::Link => json!({
            "success": true,
            "message": delivery_message(email_sent, "Password reset link sent successfully. Please check your email."),
            "emailSent": email_sent,
        }),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// POST /auth/reset-password - {email, otp, newPassword} or {token, newPassword} (PUBLIC)
#[post("/reset-password")]
pub async fn reset_password(
    body: web::Json<ResetPasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    AuthService::reset_password(db.get_ref(), &body).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password reset successfully",
    })))
}

/// GET /auth/profile (PROTECTED)
#[get("/profile")]
pub async fn profile(user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let profile = AccountService::profile(db.get_ref(), user.0.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(profile))
}

/// GET /auth/addresses (PROTECTED)
#[get("/addresses")]
pub async fn list_addresses(user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let addresses = AccountService::list_addresses(db.get_ref(), user.0.sub).await?;
    Ok(HttpResponse::Ok().json(addresses))
}

/// POST /auth/addresses (PROTECTED)
#[post("/addresses")]
pub async fn add_address(
    user: AuthUser,
    body: web::Json<AddressRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let address = AccountService::add_address(db.get_ref(), user.0.sub, &body).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Address added successfully",
        "address": address,
    })))
}

/// GET /auth/orders - Orders placed with the caller's email (PROTECTED)
#[get("/orders")]
pub async fn my_orders(user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let orders = OrderService::list_for_email(db.get_ref(), &user.0.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "orders": orders,
    })))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(send_otp)
            .service(verify_otp)
            .service(verify_email_otp)
            .service(send_verification)
            .service(verify_email)
            .service(resend_verification_otp)
            .service(forgot_password)
            .service(reset_password)
            .service(profile)
            .service(list_addresses)
            .service(add_address)
            .service(my_orders),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::{self, Role};
    use crate::routes::tests::send;
    use crate::utils::jwt::tests::{test_keys, test_user};
    use crate::utils::jwt::USER_TOKEN_TTL;
    use actix_web::{http::StatusCode, test::TestRequest};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_register_requires_fields() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let req = TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "a@x.com" }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name, email, and password are required");
    }

    #[actix_web::test]
    async fn test_register_existing_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_user(Role::User)]])
            .into_connection();
        let req = TestRequest::post().uri("/api/auth/register").set_json(json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "pw",
        }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User with this email already exists");
    }

    #[actix_web::test]
    async fn test_verify_email_requires_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (status, body) = send(db, TestRequest::get().uri("/api/auth/verify-email")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Verification token is required");
    }

    #[actix_web::test]
    async fn test_profile_needs_credential() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (status, body) = send(db, TestRequest::get().uri("/api/auth/profile")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access token required");
    }

    #[actix_web::test]
    async fn test_profile_hides_password() {
        let user = users::Model { password: "$pbkdf2-sha256$secret".into(), ..test_user(Role::User) };
        let token = test_keys().generate_token(&user, USER_TOKEN_TTL).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .into_connection();
        let req = TestRequest::get()
            .uri("/api/auth/profile")
            .insert_header(("Authorization", format!("Bearer {token}")));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "asha@example.com");
        assert!(body.get("password").is_none());
    }
}
