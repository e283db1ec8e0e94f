use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;

use crate::error::AppError;
use crate::models::contact_messages::{self, ContactStatus};
use crate::models::dto::ContactRequest;
use crate::utils::text::non_empty;

/// POST /contact - Contact form; only the name is required (PUBLIC)
#[post("/contact")]
pub async fn submit_contact(
    body: web::Json<ContactRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }

    let now = Utc::now();
    let message = contact_messages::ActiveModel {
        name: Set(name.to_string()),
        email: Set(non_empty(body.email.as_deref())),
        phone: Set(non_empty(body.phone.as_deref())),
        company: Set(non_empty(body.company.as_deref())),
        subject: Set(non_empty(body.subject.as_deref())),
        message: Set(non_empty(body.message.as_deref())),
        service_type: Set(non_empty(body.service_type.as_deref())),
        status: Set(ContactStatus::New),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    tracing::info!(contact_id = message.id, "Contact message received");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Contact message sent successfully",
        "id": message.id,
    })))
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::send;
    use actix_web::{http::StatusCode, test::TestRequest};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    #[actix_web::test]
    async fn test_blank_name_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let req = TestRequest::post()
            .uri("/api/contact")
            .set_json(json!({ "name": "   ", "email": "a@x.com" }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name is required");
    }
}
