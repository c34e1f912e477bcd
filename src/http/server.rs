//! Main router configuration assembling the registry endpoints.

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    context::AppState,
    handler_clients::{handle_add_domains, handle_delete_client},
    handler_registration::{handle_abandon, handle_complete, handle_register},
    handler_tokens::{handle_renew, handle_token_exists, handle_update_token_domains},
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let registry_routes = Router::new()
        .route("/applications/register", post(handle_register))
        .route("/applications/complete", post(handle_complete))
        .route("/applications/abandon", post(handle_abandon))
        .route("/tokens/renew", post(handle_renew))
        .route("/tokens/domains", put(handle_update_token_domains))
        .route("/tokens/{access_token}/exists", get(handle_token_exists))
        .route("/clients/{consumer_key}", delete(handle_delete_client))
        .route("/clients/{consumer_key}/domains", post(handle_add_domains));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);

    Router::new()
        .nest("/registry", registry_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::test_app_state;

    #[test]
    fn test_build_router_structure() {
        let app_state = test_app_state();
        let _router = build_router(app_state);
        // Verifies that the route and middleware setup builds without panicking
    }
}
