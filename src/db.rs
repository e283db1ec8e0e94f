// Database pool, schema bootstrap and catalogue seed

use chrono::Utc;
use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Schema, Set,
};
use secrecy::ExposeSecret;

use crate::config::DatabaseConfig;
use crate::models::{
    contact_messages, email_verification_tokens, order_items, orders, otp_codes, password_reset_tokens, products,
    user_addresses, users,
};

/// (name, description, category, icon)
const CATALOGUE: [(&str, &str, &str, &str); 10] = [
    ("Visiting Cards", "Professional visiting cards for business networking", "Business Cards", "💼"),
    ("Pamphlets & Posters", "High-quality pamphlets and posters for marketing", "Marketing", "📄"),
    ("Garment Tags", "Custom garment tags and labels", "Labels", "🏷️"),
    ("Files", "Professional file folders and organizers", "Office Supplies", "📁"),
    ("Letter Heads", "Custom letterhead designs for business correspondence", "Stationery", "📝"),
    ("Envelopes", "Custom envelopes for professional mailing", "Stationery", "✉️"),
    ("Digital Paper Printing", "High-quality digital printing services", "Printing", "🖨️"),
    ("ATM Pouches", "Secure ATM pouches and banking supplies", "Banking", "🏦"),
    ("Bill Books", "Professional bill books and invoices", "Business", "📋"),
    ("Stickers", "Custom stickers and labels for various purposes", "Labels", "🏷️"),
];

/// Opens the bounded pool. Requests beyond `max_connections` wait up to
/// `acquire_timeout` for a free connection.
pub async fn establish_connection(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.expose_secret().to_string());
    options
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Create statements for every table, parents before children so foreign
/// keys resolve.
fn table_statements(schema: &Schema) -> Vec<TableCreateStatement> {
    vec![
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(products::Entity),
        schema.create_table_from_entity(contact_messages::Entity),
        schema.create_table_from_entity(otp_codes::Entity),
        schema.create_table_from_entity(user_addresses::Entity),
        schema.create_table_from_entity(email_verification_tokens::Entity),
        schema.create_table_from_entity(password_reset_tokens::Entity),
        schema.create_table_from_entity(orders::Entity),
        schema.create_table_from_entity(order_items::Entity),
    ]
}

/// Creates missing tables. Existing tables are left untouched.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    for mut statement in table_statements(&schema) {
        statement.if_not_exists();
        db.execute(backend.build(&statement)).await?;
    }

    tracing::info!("Database schema ready");
    Ok(())
}

/// Inserts the standard catalogue when the products table is empty.
pub async fn seed_products(db: &DatabaseConnection) -> Result<u64, DbErr> {
    if products::Entity::find().count(db).await? > 0 {
        return Ok(0);
    }

    let now = Utc::now();
    let rows = CATALOGUE.iter().map(|(name, description, category, icon)| products::ActiveModel {
        name: Set(name.to_string()),
        description: Set(Some(description.to_string())),
        category: Set(Some(category.to_string())),
        icon: Set(Some(icon.to_string())),
        image_url: Set(None),
        created_at: Set(now),
        ..Default::default()
    });

    products::Entity::insert_many(rows).exec_without_returning(db).await?;

    tracing::info!(count = CATALOGUE.len(), "Product catalogue seeded");
    Ok(CATALOGUE.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::PostgresQueryBuilder;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    #[test]
    fn test_parents_are_created_before_children() {
        let schema = Schema::new(DatabaseBackend::Postgres);
        let sql: Vec<String> = table_statements(&schema)
            .iter()
            .map(|s| s.to_string(PostgresQueryBuilder))
            .collect();

        let position = |table: &str| {
            sql.iter()
                .position(|s| s.starts_with(&format!("CREATE TABLE \"{table}\"")))
                .unwrap()
        };

        assert!(position("users") < position("user_addresses"));
        assert!(position("users") < position("orders"));
        assert!(position("orders") < position("order_items"));
        assert!(sql[position("order_items")].contains("ON DELETE CASCADE"));
    }

    #[tokio::test]
    async fn test_seed_skips_populated_catalogue() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([("num_items", Value::BigInt(Some(10)))])]])
            .into_connection();

        assert_eq!(seed_products(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_fills_empty_catalogue() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([("num_items", Value::BigInt(Some(0)))])]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 10 }])
            .into_connection();

        assert_eq!(seed_products(&db).await.unwrap(), 10);
    }
}
