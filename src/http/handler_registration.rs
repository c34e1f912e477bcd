//! Handles the registration workflow endpoints under /registry/applications

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde::Deserialize;
use serde_json::Value;

use crate::http::context::AppState;
use crate::http::utils_errors::registry_error_response;
use crate::registry::types::{
    AttemptKey, RegistrationRequest, RegistrationResult, TokenType, TokenValidity,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequestBody {
    pub user_id: String,
    pub application_name: String,
    pub token_type: TokenType,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Validity period in seconds; omitted applies the configured default
    #[serde(default)]
    pub validity_period: Option<u64>,
    /// Opaque key manager parameters, passed through verbatim
    #[serde(default)]
    pub provisioning: Value,
}

/// Key of an existing workflow, used by the complete and abandon endpoints
#[derive(Debug, Deserialize)]
pub struct WorkflowKeyBody {
    pub user_id: String,
    pub application_name: String,
    pub token_type: TokenType,
}

fn validity_from(seconds: Option<u64>) -> TokenValidity {
    match seconds {
        Some(seconds) => TokenValidity::Seconds(seconds),
        None => TokenValidity::KeyManagerDefault,
    }
}

/// POST /registry/applications/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequestBody>,
) -> Result<ResponseJson<RegistrationResult>, (StatusCode, ResponseJson<Value>)> {
    let request = RegistrationRequest {
        key: AttemptKey::new(&body.user_id, &body.application_name, body.token_type),
        callback_url: body.callback_url,
        allowed_domains: body.allowed_domains,
        validity: validity_from(body.validity_period),
        provisioning: body.provisioning,
    };

    match state.coordinator.request_registration(request).await {
        Ok(result) => Ok(ResponseJson(result)),
        Err(err) => Err(registry_error_response(err)),
    }
}

/// POST /registry/applications/complete
pub async fn handle_complete(
    State(state): State<AppState>,
    Json(body): Json<WorkflowKeyBody>,
) -> Result<ResponseJson<RegistrationResult>, (StatusCode, ResponseJson<Value>)> {
    match state
        .coordinator
        .complete_registration(&body.user_id, &body.application_name, body.token_type)
        .await
    {
        Ok(result) => Ok(ResponseJson(result)),
        Err(err) => Err(registry_error_response(err)),
    }
}

/// POST /registry/applications/abandon
pub async fn handle_abandon(
    State(state): State<AppState>,
    Json(body): Json<WorkflowKeyBody>,
) -> Result<StatusCode, (StatusCode, ResponseJson<Value>)> {
    let key = AttemptKey::new(&body.user_id, &body.application_name, body.token_type);
    match state.coordinator.abandon_registration(&key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(registry_error_response(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::test_app_state;
    use crate::registry::types::RegistrationStatus;
    use serde_json::json;

    fn register_body(user: &str, app: &str) -> RegisterRequestBody {
        serde_json::from_value(json!({
            "user_id": user,
            "application_name": app,
            "token_type": "SANDBOX",
            "callback_url": "https://app.example.com/callback",
            "allowed_domains": ["example.com"],
            "validity_period": 3600
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_handle_register_completes() {
        let state = test_app_state();
        let result = handle_register(State(state), Json(register_body("alice", "weatherApp")))
            .await
            .unwrap();
        assert_eq!(result.0.status, RegistrationStatus::Completed);
        assert!(result.0.token.is_some());
    }

    #[tokio::test]
    async fn test_handle_register_rejects_empty_user() {
        let state = test_app_state();
        let (status, body) = handle_register(State(state), Json(register_body("", "weatherApp")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_handle_complete_without_attempt() {
        let state = test_app_state();
        let body: WorkflowKeyBody = serde_json::from_value(json!({
            "user_id": "alice",
            "application_name": "weatherApp",
            "token_type": "SANDBOX"
        }))
        .unwrap();
        let (status, _) = handle_complete(State(state), Json(body)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handle_abandon_then_register_again() {
        let state = test_app_state();
        handle_register(
            State(state.clone()),
            Json(register_body("alice", "weatherApp")),
        )
        .await
        .unwrap();

        let key: WorkflowKeyBody = serde_json::from_value(json!({
            "user_id": "alice",
            "application_name": "weatherApp",
            "token_type": "SANDBOX"
        }))
        .unwrap();
        let status = handle_abandon(State(state.clone()), Json(key)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let result = handle_register(State(state), Json(register_body("alice", "weatherApp")))
            .await
            .unwrap();
        assert_eq!(result.0.status, RegistrationStatus::Completed);
    }
}
