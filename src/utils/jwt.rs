use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey, Algorithm};
use serde::{Deserialize, Serialize};
use chrono::{Utc, Duration};
use secrecy::{ExposeSecret, SecretString};

use crate::models::users::{self, Role};

/// Lifetime of a customer session credential.
pub const USER_TOKEN_TTL: Duration = Duration::days(7);
/// Lifetime of an admin session credential.
pub const ADMIN_TOKEN_TTL: Duration = Duration::hours(24);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub email: String,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,        // expiration timestamp
}

/// What a credential may be used for. Checked through [`Claims::allows`]
/// instead of comparing role fields at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Profile, addresses and own orders.
    SelfService,
    /// Everything under /api/admin.
    Administration,
}

impl Role {
    pub fn grants(self, capability: Capability) -> bool {
        match capability {
            Capability::SelfService => true,
            Capability::Administration => self == Role::Admin,
        }
    }
}

impl Claims {
    pub fn allows(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }
}

/// HS256 signing and verification keys derived from `JWT_SECRET`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Generates a signed session credential for a user.
    pub fn generate_token(&self, user: &users::Model, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verifies signature and expiry, then decodes the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::users::UserStatus;

    pub(crate) fn test_keys() -> JwtKeys {
        JwtKeys::new(&SecretString::from("test-signing-secret-for-unit-tests".to_string()))
    }

    pub(crate) fn test_user(role: Role) -> users::Model {
        let now = Utc::now();
        users::Model {
            id: 123,
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: String::new(),
            phone: None,
            company: None,
            role,
            status: UserStatus::Active,
            email_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_generate_and_verify_token() {
        let keys = test_keys();
        let token = keys.generate_token(&test_user(Role::User), USER_TOKEN_TTL).unwrap();
        let claims = keys.verify_token(&token).unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.email, "asha@example.com");
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_invalid_token() {
        let result = test_keys().verify_token("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = JwtKeys::new(&SecretString::from("another-secret".to_string()));
        let token = other.generate_token(&test_user(Role::Admin), ADMIN_TOKEN_TTL).unwrap();
        assert!(test_keys().verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = test_keys();
        let token = keys.generate_token(&test_user(Role::User), Duration::hours(-2)).unwrap();
        assert!(keys.verify_token(&token).is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(Role::User.grants(Capability::SelfService));
        assert!(!Role::User.grants(Capability::Administration));
        assert!(Role::Admin.grants(Capability::Administration));
    }
}
