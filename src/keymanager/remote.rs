//! HTTPS key manager adapter speaking JSON to an authorization server.

use chrono::Utc;
use http::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{ClientSpec, KeyManager, Result, TokenIssueRequest};
use crate::errors::KeyManagerError;
use crate::registry::types::{AccessTokenInfo, ClientCredentials};
use async_trait::async_trait;

/// Key manager client backed by an authorization server's management API.
///
/// The caller supplies the `reqwest` client, which carries the request
/// timeout and any CA bundles; a timeout here surfaces as a transient
/// failure with an unknown outcome.
pub struct RemoteKeyManager {
    http_client: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
struct ClientResponse {
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl RemoteKeyManager {
    pub fn new(http_client: reqwest::Client, base: Url) -> Self {
        Self { http_client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| KeyManagerError::Protocol(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    /// Map transport-level failures onto the transient/permanent split
    fn transport_error(err: reqwest::Error) -> KeyManagerError {
        if err.is_timeout() || err.is_connect() {
            KeyManagerError::Transient(err.to_string())
        } else {
            KeyManagerError::Protocol(err.to_string())
        }
    }

    /// Map non-success statuses onto the transient/permanent split
    fn status_error(status: StatusCode, body: String) -> KeyManagerError {
        if status.is_server_error() {
            KeyManagerError::Transient(format!("{}: {}", status, body))
        } else {
            KeyManagerError::Rejected(format!("{}: {}", status, body))
        }
    }

    async fn read_rejection(response: reqwest::Response) -> KeyManagerError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::status_error(status, body)
    }
}

#[async_trait]
impl KeyManager for RemoteKeyManager {
    async fn create_client(&self, spec: &ClientSpec) -> Result<ClientCredentials> {
        let response = self
            .http_client
            .post(self.endpoint("clients")?)
            .json(spec)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }

        let created: ClientResponse = response
            .json()
            .await
            .map_err(|e| KeyManagerError::Protocol(e.to_string()))?;
        Ok(ClientCredentials {
            client_id: created.client_id,
            client_secret: created.client_secret,
        })
    }

    async fn find_client(&self, client_name: &str) -> Result<Option<ClientCredentials>> {
        let mut endpoint = self.endpoint("clients/find")?;
        endpoint.query_pairs_mut().append_pair("name", client_name);

        let response = self
            .http_client
            .get(endpoint)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }

        let found: ClientResponse = response
            .json()
            .await
            .map_err(|e| KeyManagerError::Protocol(e.to_string()))?;
        Ok(Some(ClientCredentials {
            client_id: found.client_id,
            client_secret: found.client_secret,
        }))
    }

    async fn issue_token(&self, request: &TokenIssueRequest) -> Result<AccessTokenInfo> {
        let response = self
            .http_client
            .post(self.endpoint("tokens")?)
            .json(request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }

        let issued: TokenResponse = response
            .json()
            .await
            .map_err(|e| KeyManagerError::Protocol(e.to_string()))?;
        Ok(AccessTokenInfo {
            access_token: issued.access_token,
            client_id: request.client_id.clone(),
            allowed_domains: request.allowed_domains.clone(),
            validity: request.validity,
            issued_at: Utc::now(),
        })
    }

    async fn revoke_token(&self, access_token: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint("tokens/revoke")?)
            .json(&serde_json::json!({ "token": access_token }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.endpoint(&format!("clients/{}", client_id))?)
            .send()
            .await
            .map_err(Self::transport_error)?;

        // Already-deleted clients are treated as success
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }
        Ok(())
    }

    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()> {
        let response = self
            .http_client
            .put(self.endpoint("tokens/domains")?)
            .json(&serde_json::json!({
                "token": access_token,
                "allowed_domains": domains,
            }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }
        Ok(())
    }
}
