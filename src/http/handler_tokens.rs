//! Handles the token lifecycle endpoints under /registry/tokens

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::context::AppState;
use crate::http::utils_errors::registry_error_response;
use crate::registry::types::{AccessTokenInfo, TokenValidity};

#[derive(Debug, Deserialize)]
pub struct RenewRequestBody {
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
    /// Validity period in seconds; omitted applies the configured default
    #[serde(default)]
    pub validity_period: Option<u64>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub provisioning: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDomainsBody {
    pub access_token: String,
    pub domains: Vec<String>,
}

/// POST /registry/tokens/renew
pub async fn handle_renew(
    State(state): State<AppState>,
    Json(body): Json<RenewRequestBody>,
) -> Result<ResponseJson<AccessTokenInfo>, (StatusCode, ResponseJson<Value>)> {
    let validity = match body.validity_period {
        Some(seconds) => TokenValidity::Seconds(seconds),
        None => TokenValidity::KeyManagerDefault,
    };

    match state
        .coordinator
        .renew_token(
            &body.access_token,
            &body.client_id,
            &body.client_secret,
            validity,
            body.allowed_domains,
            body.provisioning,
        )
        .await
    {
        Ok(info) => Ok(ResponseJson(info)),
        Err(err) => Err(registry_error_response(err)),
    }
}

/// GET /registry/tokens/{access_token}/exists
pub async fn handle_token_exists(
    State(state): State<AppState>,
    Path(access_token): Path<String>,
) -> Result<ResponseJson<Value>, (StatusCode, ResponseJson<Value>)> {
    match state.coordinator.token_exists(&access_token).await {
        Ok(exists) => Ok(ResponseJson(json!({ "exists": exists }))),
        Err(err) => Err(registry_error_response(err)),
    }
}

/// PUT /registry/tokens/domains
pub async fn handle_update_token_domains(
    State(state): State<AppState>,
    Json(body): Json<UpdateDomainsBody>,
) -> Result<StatusCode, (StatusCode, ResponseJson<Value>)> {
    match state
        .domain_guard
        .update_allowed_domains(&body.access_token, &body.domains)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(registry_error_response(err)),
    }
}
