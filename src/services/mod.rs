pub mod account_service;
pub mod admin_service;
pub mod auth_service;
pub mod email_service;
pub mod order_service;
pub mod otp_service;
