use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr};

use crate::models::health::{DatabaseHealth, HealthResponse};

#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    match db.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            message: "Hugli printing API is running".to_string(),
            status: "healthy".to_string(),
            time: Utc::now(),
            database: DatabaseHealth { connected: true, error: None },
        }),
        Err(e) => {
            tracing::error!(error = %e, "Health check: database unreachable");
            HttpResponse::ServiceUnavailable().json(unhealthy(&e))
        }
    }
}

fn unhealthy(err: &DbErr) -> HealthResponse {
    HealthResponse {
        message: "Database connection failed".to_string(),
        status: "unhealthy".to_string(),
        time: Utc::now(),
        // Driver detail only leaves the process in debug builds
        database: DatabaseHealth {
            connected: false,
            error: cfg!(debug_assertions).then(|| err.to_string()),
        },
    }
}
