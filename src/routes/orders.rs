use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde_json::json;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::CreateOrderRequest;
use crate::services::order_service::{NewOrder, OrderService};

/// POST /orders - Place an order (PUBLIC, credential optional)
#[post("")]
pub async fn create_order(
    body: web::Json<CreateOrderRequest>,
    db: web::Data<DatabaseConnection>,
    user: Option<AuthUser>,
) -> Result<HttpResponse, AppError> {
    // 1. Validate before touching the database
    body.validate()?;
    let customer = body
        .customer_info
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Customer name and email are required".to_string()))?;

    // 2. Header + items in one transaction
    let order = NewOrder {
        items: &body.items,
        customer,
        delivery: body.delivery_info.as_ref(),
        preferences: body.preferences.as_ref(),
        user_id: user.map(|AuthUser(claims)| claims.sub),
    };

    let order_id = match OrderService::create(db.get_ref(), order).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Order creation failed, transaction rolled back");
            return Ok(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Failed to create order. Please try again.",
            })));
        }
    };

    // 3. Read back for the response. The order is committed at this point,
    //    so a failure here must not be reported as a failed order.
    let order = match OrderService::find_with_items(db.get_ref(), order_id).await {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, %order_id, "Order committed but read-back failed");
            None
        }
    };

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "orderId": order_id,
        "order": order,
        "message": "Order placed successfully!",
    })))
}

/// GET /orders - Every order with its items, newest first (PUBLIC)
#[get("")]
pub async fn list_orders(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let orders = OrderService::list_all(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "orders": orders,
    })))
}

pub fn orders_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .service(create_order)
            .service(list_orders),
    );
}
