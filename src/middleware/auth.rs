use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures::future::{Ready, ready};

use crate::error::AppError;
use crate::utils::jwt::{Capability, Claims, JwtKeys};

/// Authenticated customer, extracted from `Authorization: Bearer <token>`.
/// Use `Option<AuthUser>` on routes where a credential is optional.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Authenticated administrator. Rejects valid non-admin credentials with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

/// What to say for each way the credential can be wrong.
struct Rejections {
    missing: &'static str,
    invalid: &'static str,
}

const USER_REJECTIONS: Rejections = Rejections {
    missing: "Access token required",
    invalid: "Invalid or expired token",
};

const ADMIN_REJECTIONS: Rejections = Rejections {
    missing: "Admin token required",
    invalid: "Invalid admin token",
};

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    // 1. Header present and readable
    let header = req.headers().get("Authorization")?.to_str().ok()?;

    // 2. "Bearer <token>"
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn decode_claims(req: &HttpRequest, rejections: &Rejections) -> Result<Claims, AppError> {
    let token = bearer_token(req).ok_or_else(|| AppError::Unauthorized(rejections.missing.to_string()))?;

    let keys = req
        .app_data::<web::Data<JwtKeys>>()
        .ok_or_else(|| AppError::internal("session keys are not configured"))?;

    keys.verify_token(token).map_err(|e| {
        tracing::warn!(error = %e, path = %req.path(), "Rejected session credential");
        AppError::Unauthorized(rejections.invalid.to_string())
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = decode_claims(req, &USER_REJECTIONS).and_then(|claims| {
            if claims.allows(Capability::SelfService) {
                Ok(AuthUser(claims))
            } else {
                Err(AppError::Forbidden("Access denied".to_string()))
            }
        });
        ready(result)
    }
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = decode_claims(req, &ADMIN_REJECTIONS).and_then(|claims| {
            if claims.allows(Capability::Administration) {
                Ok(AdminUser(claims))
            } else {
                tracing::warn!(user_id = claims.sub, "Admin route refused for non-admin credential");
                Err(AppError::Forbidden("Admin access required".to_string()))
            }
        });
        ready(result)
    }
}
