// ============================================================================
// MODELS - MAIN MODULE
// ============================================================================
//
// Entry point for every data model. Each entity maps one PostgreSQL table
// through SeaORM.
//
// Modules:
//   - health : health check response
//   - dto : request bodies and structured responses
//   - users : customer and admin accounts
//   - user_addresses : saved delivery addresses (FK users, cascade)
//   - otp_codes : 6-digit codes for login / reset / verification (10 min)
//   - email_verification_tokens : link verification tokens (24h)
//   - password_reset_tokens : link reset tokens (1h)
//   - orders : order headers (UUID id, contact snapshot)
//   - order_items : order lines (FK orders, cascade)
//   - contact_messages : contact form submissions
//   - products : printing catalogue
//
// Points of attention:
//   - Enumerated columns are DeriveActiveEnum string enums
//   - db::init_schema creates parent tables before their children
//
// ============================================================================

pub mod health;
pub mod dto;
pub mod users;
pub mod user_addresses;
pub mod otp_codes;
pub mod email_verification_tokens;
pub mod password_reset_tokens;
pub mod orders;
pub mod order_items;
pub mod contact_messages;
pub mod products;
