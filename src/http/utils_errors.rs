//! Shared mapping from registry errors to HTTP error responses.

use axum::{http::StatusCode, response::Json as ResponseJson};
use serde_json::{Value, json};

use crate::errors::RegistryError;

/// Map a registry error onto a status code and OAuth-style error body
pub(crate) fn registry_error_response(err: RegistryError) -> (StatusCode, ResponseJson<Value>) {
    let (status, error_code) = match &err {
        RegistryError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        RegistryError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
        RegistryError::TransientBackend(_) => (StatusCode::BAD_GATEWAY, "temporarily_unavailable"),
        RegistryError::BackendRejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "backend_rejected"),
        RegistryError::Inconsistent(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "inconsistent_state")
        }
    };

    (
        status,
        ResponseJson(json!({
            "error": error_code,
            "error_description": err.to_string()
        })),
    )
}
