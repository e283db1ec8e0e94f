mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::email_service::{LogNotifier, Notifier, SmtpNotifier};
use crate::utils::jwt::JwtKeys;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().map_err(io::Error::other)?;

    tracing::info!("Connecting to database...");
    let db = db::establish_connection(&config.database)
        .await
        .map_err(io::Error::other)?;
    db::init_schema(&db).await.map_err(io::Error::other)?;
    db::seed_products(&db).await.map_err(io::Error::other)?;
    tracing::info!("Database connected");

    let notifier: Arc<dyn Notifier> = match &config.email {
        Some(email) => Arc::new(SmtpNotifier::new(email).map_err(io::Error::other)?),
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing email will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let bind = (config.host, config.port);
    let keys = web::Data::new(JwtKeys::new(&config.jwt_secret));
    let db = web::Data::new(db);
    let notifier = web::Data::from(notifier);
    let config = web::Data::new(config);

    tracing::info!("Starting server on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(keys.clone())
            .app_data(notifier.clone())
            .app_data(config.clone())
            .app_data(routes::json_config())
            .app_data(routes::path_config())
            .configure(routes::configure_routes)
    })
        .bind(bind)?
        .run()
        .await
}
