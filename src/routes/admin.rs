use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::{ActiveEnum, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AdminUser;
use crate::models::contact_messages::ContactStatus;
use crate::models::dto::{AuthResponse, LoginRequest, StatusUpdateRequest, UserView};
use crate::models::orders::OrderStatus;
use crate::models::users::UserStatus;
use crate::services::admin_service::AdminService;
use crate::services::auth_service::AuthService;
use crate::services::order_service::OrderService;
use crate::utils::jwt::JwtKeys;

/// Parses a status string against one of the status enums.
fn parse_status<E: ActiveEnum<Value = String>>(raw: &str) -> Result<E, AppError> {
    E::try_from_value(&raw.to_string()).map_err(|_| AppError::BadRequest("Invalid status".to_string()))
}

/// POST /admin/login - Admin credential (PUBLIC)
#[post("/login")]
pub async fn admin_login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    keys: web::Data<JwtKeys>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let session = AuthService::admin_login(db.get_ref(), &keys, &body.email, &body.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: "Admin login successful".to_string(),
        token: session.token,
        user: UserView::from(&session.user),
    }))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[get("/orders")]
pub async fn list_orders(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let orders = OrderService::list_all(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}

#[get("/orders/{order_id}")]
pub async fn get_order(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let order = OrderService::find_with_items(db.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "order": order })))
}

#[put("/orders/{order_id}/status")]
pub async fn update_order_status(
    admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<StatusUpdateRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let status: OrderStatus = parse_status(&body.status)?;

    if !AdminService::update_order_status(db.get_ref(), order_id, status).await? {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    tracing::info!(admin_id = admin.0.sub, %order_id, ?status, "Order status updated");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Order status updated successfully" })))
}

/// Registered before `/orders/{order_id}` so "status" is never read as an id.
#[delete("/orders/status/{status}")]
pub async fn delete_orders_by_status(
    _admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let status: OrderStatus = parse_status(&raw)?;

    let deleted = AdminService::delete_orders_by_status(db.get_ref(), status).await?;

    let message = if deleted == 0 {
        "No orders found with this status".to_string()
    } else {
        format!("Deleted {deleted} orders with status: {raw}")
    };

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message, "deletedCount": deleted })))
}

#[delete("/orders/{order_id}")]
pub async fn delete_order(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    if !AdminService::delete_order(db.get_ref(), path.into_inner()).await? {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Order deleted successfully" })))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[get("/users")]
pub async fn list_users(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let users = AdminService::list_users(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "users": users })))
}

#[put("/users/{user_id}/status")]
pub async fn update_user_status(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<StatusUpdateRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let status: UserStatus = parse_status(&body.status)?;

    if !AdminService::update_user_status(db.get_ref(), path.into_inner(), status).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User status updated successfully" })))
}

#[delete("/users/{user_id}")]
pub async fn delete_user(
    admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    if !AdminService::delete_user(db.get_ref(), user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(admin_id = admin.0.sub, user_id, "User deleted by admin");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User and all related data deleted successfully",
    })))
}

// ---------------------------------------------------------------------------
// Contact messages
// ---------------------------------------------------------------------------

#[get("/contacts")]
pub async fn list_contacts(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let contacts = AdminService::list_contacts(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "contacts": contacts })))
}

#[put("/contacts/{contact_id}/status")]
pub async fn update_contact_status(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<StatusUpdateRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let status: ContactStatus = parse_status(&body.status)?;

    if !AdminService::update_contact_status(db.get_ref(), path.into_inner(), status).await? {
        return Err(AppError::NotFound("Contact message not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Contact status updated successfully" })))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(admin_login)
            .service(list_orders)
            .service(get_order)
            .service(update_order_status)
            .service(delete_orders_by_status)
            .service(delete_order)
            .service(list_users)
            .service(update_user_status)
            .service(delete_user)
            .service(list_contacts)
            .service(update_contact_status),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::Role;
    use crate::routes::tests::send;
    use crate::utils::jwt::tests::{test_keys, test_user};
    use crate::utils::jwt::ADMIN_TOKEN_TTL;
    use actix_web::{http::StatusCode, test::TestRequest};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn bearer(role: Role) -> (&'static str, String) {
        let token = test_keys().generate_token(&test_user(role), ADMIN_TOKEN_TTL).unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    #[actix_web::test]
    async fn test_admin_routes_need_a_credential() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (status, body) = send(db, TestRequest::get().uri("/api/admin/orders")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Admin token required");
    }

    #[actix_web::test]
    async fn test_customer_credential_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let req = TestRequest::delete()
            .uri("/api/admin/users/5")
            .insert_header(bearer(Role::User));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");
    }

    #[actix_web::test]
    async fn test_unknown_status_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let req = TestRequest::put()
            .uri(&format!("/api/admin/orders/{}/status", Uuid::new_v4()))
            .insert_header(bearer(Role::Admin))
            .set_json(json!({ "status": "shipped" }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid status");
    }

    #[actix_web::test]
    async fn test_status_update_on_missing_contact() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 0 }])
            .into_connection();
        let req = TestRequest::put()
            .uri("/api/admin/contacts/41/status")
            .insert_header(bearer(Role::Admin))
            .set_json(json!({ "status": "read" }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Contact message not found");
    }

    #[actix_web::test]
    async fn test_order_status_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let req = TestRequest::put()
            .uri(&format!("/api/admin/orders/{}/status", Uuid::new_v4()))
            .insert_header(bearer(Role::Admin))
            .set_json(json!({ "status": "in_progress" }));

        let (status, body) = send(db, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
}
