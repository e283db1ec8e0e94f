pub mod admin;
pub mod auth;
pub mod contact;
pub mod health;
pub mod orders;
pub mod products;

use actix_web::web;

use crate::error::AppError;

/// Max accepted JSON body (order payloads can carry large option blobs).
const JSON_LIMIT: usize = 10 * 1024 * 1024;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .service(contact::submit_contact)
            .configure(auth::auth_routes)
            .configure(orders::orders_routes)
            .configure(products::products_routes)
            .configure(admin::admin_routes)
    );
}

/// Malformed bodies answer in the same `{success, message}` shape as every
/// other client error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid request body: {err}")).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid path parameter: {err}")).into())
}
