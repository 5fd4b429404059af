//! HTTP routes for Agora

pub mod admin;
pub mod answers;
pub mod auth_routes;
pub mod common;
pub mod health;
pub mod notifications;
pub mod questions;
pub mod views;

pub use admin::handle_admin_request;
pub use answers::handle_answers_request;
pub use auth_routes::handle_auth_request;
pub use common::{error_response, json_response, not_found_response, FullBody};
pub use health::{health_check, readiness_check};
pub use notifications::handle_notifications_request;
pub use questions::handle_questions_request;
