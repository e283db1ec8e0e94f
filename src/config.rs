//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - session credential signing secret
//! - `DATABASE_URL`, or the `DB_*` parts below
//!
//! ## Optional
//! - `DB_HOST` / `DB_PORT` / `DB_USER` / `DB_PASSWORD` / `DB_NAME`
//!   (default: localhost / 5432 / postgres / empty / hugli_printing_db)
//! - `DB_MAX_CONNECTIONS` - pool size (default: 10)
//! - `DB_ACQUIRE_TIMEOUT_SECS` - wait for a free connection (default: 30)
//! - `HOST` / `PORT` - bind address (default: 127.0.0.1 / 5000)
//! - `FRONTEND_URL` - base of verification/reset links (default: http://localhost:3000)
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`.
//!   Without `SMTP_HOST` outgoing mail is only logged.

use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_DB_NAME: &str = "hugli_printing_db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub frontend_url: String,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string (contains the password)
    pub url: SecretString,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests do not have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = get("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let port: u16 = parse_or(&get, "DB_PORT", 5432)?;
                let user = get("DB_USER").unwrap_or_else(|| "postgres".to_string());
                let password = get("DB_PASSWORD").unwrap_or_default();
                let name = get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
                if password.is_empty() {
                    format!("postgres://{user}@{host}:{port}/{name}")
                } else {
                    format!("postgres://{user}:{password}@{host}:{port}/{name}")
                }
            }
        };

        let database = DatabaseConfig {
            url: SecretString::from(url),
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(parse_or(&get, "DB_ACQUIRE_TIMEOUT_SECS", 30)?),
        };

        let jwt_secret = get("JWT_SECRET")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        let email = match get("SMTP_HOST") {
            None => None,
            Some(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: parse_or(&get, "SMTP_PORT", 587)?,
                smtp_username: get("SMTP_USERNAME")
                    .ok_or_else(|| ConfigError::MissingEnvVar("SMTP_USERNAME".to_string()))?,
                smtp_password: get("SMTP_PASSWORD")
                    .map(SecretString::from)
                    .ok_or_else(|| ConfigError::MissingEnvVar("SMTP_PASSWORD".to_string()))?,
                from_address: get("SMTP_FROM")
                    .ok_or_else(|| ConfigError::MissingEnvVar("SMTP_FROM".to_string()))?,
            }),
        };

        Ok(Self {
            database,
            host: parse_or(&get, "HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or(&get, "PORT", 5000)?,
            jwt_secret,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            email,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "s")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(
            config.database.url.expose_secret(),
            "postgres://postgres@localhost:5432/hugli_printing_db"
        );
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert!(config.email.is_none());
    }

    #[test]
    fn test_database_url_wins_over_parts() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://u:p@db/shop"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://u:p@db/shop");
    }

    #[test]
    fn test_parts_with_password() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("DB_HOST", "db"),
            ("DB_USER", "shop"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "printing"),
        ])
        .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://shop:pw@db:5432/printing");
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnvVar(k)) if k == "JWT_SECRET"));
    }

    #[test]
    fn test_invalid_port() {
        let result = load(&[("JWT_SECRET", "s"), ("PORT", "http")]);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));
    }

    #[test]
    fn test_smtp_requires_credentials() {
        let result = load(&[("JWT_SECRET", "s"), ("SMTP_HOST", "smtp.gmail.com")]);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(k)) if k == "SMTP_USERNAME"));

        let config = load(&[
            ("JWT_SECRET", "s"),
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_USERNAME", "shop"),
            ("SMTP_PASSWORD", "pw"),
            ("SMTP_FROM", "Hugli Printing <shop@example.com>"),
            ("FRONTEND_URL", "https://hugli.example/"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(config.frontend_url, "https://hugli.example");
    }
}
