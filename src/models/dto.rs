// Request bodies and structured responses shared by the routes.
//
// Request DTOs use camelCase on the wire (what the storefront sends) and
// carry their own validation rules; messages are the ones returned to the
// client as-is.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::models::users::{self, Role};
use crate::models::{order_items, orders};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, email, and password are required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, email, and password are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, email, and password are required"))]
    pub password: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and OTP are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and OTP are required"))]
    pub otp: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMethod {
    #[default]
    Otp,
    Link,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    pub method: ResetMethod,
}

/// Either `{email, otp, newPassword}` or `{token, newPassword}`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub token: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email, OTP, and new password are required"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, phone, and address are required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, phone, and address are required"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name, phone, and address are required"))]
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Public view of a user, embedded in auth responses.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

impl From<&users::Model> for UserView {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            company: user.company.clone(),
            role: user.role,
            email_verified: user.email_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserView,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Order items are required"), nested)]
    pub items: Vec<OrderItemInput>,
    #[validate(required(message = "Customer name and email are required"), nested)]
    pub customer_info: Option<CustomerInfo>,
    pub delivery_info: Option<DeliveryInfo>,
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "Each order item must have a name"))]
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    /// Accepted as a number or a numeric string, anything else means 1.
    pub quantity: Option<Value>,
    pub options: Option<Value>,
}

impl OrderItemInput {
    pub fn quantity_or_default(&self) -> i32 {
        let parsed = match &self.quantity {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match parsed {
            Some(q) if q >= 1 => i32::try_from(q).unwrap_or(i32::MAX),
            _ => 1,
        }
    }

    /// Options serialized as JSON text, `{}` when absent.
    pub fn options_text(&self) -> String {
        match &self.options {
            Some(Value::Null) | None => "{}".to_string(),
            Some(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CustomerInfo {
    #[serde(default)]
    #[validate(length(min = 1, message = "Customer name and email are required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Customer name and email are required"))]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub delivery_type: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_date: Option<String>,
    pub delivery_time: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub urgency: Option<String>,
    pub contact_method: Option<String>,
    pub preferred_contact_time: Option<String>,
}

/// Order item as returned to clients, with options parsed back into JSON.
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub id: i32,
    pub order_id: Uuid,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_icon: Option<String>,
    pub quantity: i32,
    pub options: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<order_items::Model> for OrderItemView {
    fn from(item: order_items::Model) -> Self {
        let options = serde_json::from_str(&item.options)
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self {
            id: item.id,
            order_id: item.order_id,
            product_name: item.product_name,
            product_description: item.product_description,
            product_icon: item.product_icon,
            quantity: item.quantity,
            options,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: orders::Model,
    pub items: Vec<OrderItemView>,
}

impl OrderWithItems {
    pub fn new(order: orders::Model, items: Vec<order_items::Model>) -> Self {
        Self {
            order,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Contact / admin
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub service_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}
