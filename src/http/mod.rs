//! Axum HTTP server handlers for the client registration registry.

pub mod context;
mod handler_clients;
mod handler_registration;
mod handler_tokens;
pub mod server;
mod utils_errors;

pub use context::AppState;
pub use server::build_router;
