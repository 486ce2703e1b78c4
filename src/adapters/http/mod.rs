//! HTTP adapters - ingress endpoints and router assembly.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::app_router;
