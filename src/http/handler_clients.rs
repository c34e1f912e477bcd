//! Handles the client management endpoints under /registry/clients

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::context::AppState;
use crate::http::utils_errors::registry_error_response;

#[derive(Debug, Deserialize)]
pub struct AddDomainsBody {
    pub domains: Vec<String>,
}

/// DELETE /registry/clients/{consumer_key}
pub async fn handle_delete_client(
    State(state): State<AppState>,
    Path(consumer_key): Path<String>,
) -> Result<StatusCode, (StatusCode, ResponseJson<Value>)> {
    match state.coordinator.delete_client(&consumer_key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(registry_error_response(err)),
    }
}

/// POST /registry/clients/{consumer_key}/domains
pub async fn handle_add_domains(
    State(state): State<AppState>,
    Path(consumer_key): Path<String>,
    Json(body): Json<AddDomainsBody>,
) -> Result<ResponseJson<Value>, (StatusCode, ResponseJson<Value>)> {
    match state
        .domain_guard
        .add_allowed_domains(&consumer_key, &body.domains)
        .await
    {
        Ok(merged) => Ok(ResponseJson(json!({ "allowed_domains": merged }))),
        Err(err) => Err(registry_error_response(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::test_app_state;
    use crate::http::handler_registration::{RegisterRequestBody, handle_register};

    async fn register(state: AppState) -> String {
        let body: RegisterRequestBody = serde_json::from_value(json!({
            "user_id": "alice",
            "application_name": "weatherApp",
            "token_type": "SANDBOX",
            "allowed_domains": ["example.com"]
        }))
        .unwrap();
        let result = handle_register(State(state), Json(body)).await.unwrap();
        result.0.credentials.unwrap().client_id
    }

    #[tokio::test]
    async fn test_handle_delete_client_twice() {
        let state = test_app_state();
        let consumer_key = register(state.clone()).await;

        let status = handle_delete_client(State(state.clone()), Path(consumer_key.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Idempotent on repeat
        let status = handle_delete_client(State(state), Path(consumer_key))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_handle_add_domains() {
        let state = test_app_state();
        let consumer_key = register(state.clone()).await;

        let body: AddDomainsBody = serde_json::from_value(json!({
            "domains": ["example.org", "example.com"]
        }))
        .unwrap();
        let merged = handle_add_domains(State(state), Path(consumer_key), Json(body))
            .await
            .unwrap();
        assert_eq!(
            merged.0["allowed_domains"],
            json!(["example.com", "example.org"])
        );
    }

    #[tokio::test]
    async fn test_handle_add_domains_unknown_consumer_key() {
        let state = test_app_state();
        let body: AddDomainsBody = serde_json::from_value(json!({
            "domains": ["example.org"]
        }))
        .unwrap();
        let (status, error) = handle_add_domains(State(state), Path("missing".to_string()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.0["error"], "invalid_request");
    }
}
