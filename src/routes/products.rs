use actix_web::{get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};

use crate::error::AppError;
use crate::models::products::{self, Entity as Products};

/// GET /products - The printing catalogue, by name (PUBLIC)
#[get("")]
pub async fn get_products(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let products = Products::find()
        .order_by_asc(products::Column::Name)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(products))
}

pub fn products_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/products").service(get_products));
}
