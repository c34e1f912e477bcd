//! Key manager client: the adapter seam to the external authorization server.
//!
//! Production deployments talk to an OAuth2-capable authorization server over
//! HTTPS ([`remote::RemoteKeyManager`]); tests and local development use the
//! in-memory double ([`inmemory::MemoryKeyManager`]).

pub mod inmemory;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::KeyManagerError;
use crate::registry::types::{AccessTokenInfo, ClientCredentials, TokenValidity};

pub use inmemory::MemoryKeyManager;
pub use remote::RemoteKeyManager;

pub type Result<T> = std::result::Result<T, KeyManagerError>;

/// Parameters for creating an OAuth client at the key manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSpec {
    /// Client name, deterministic per workflow key
    pub client_name: String,
    /// Owning subscriber
    pub owner: String,
    /// Callback URL for the client
    pub callback_url: Option<String>,
    /// Opaque authorization server parameters, passed through verbatim
    #[serde(default)]
    pub provisioning: serde_json::Value,
}

/// Parameters for issuing an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenIssueRequest {
    /// Client to bind the token to
    pub client_id: String,
    /// Client secret for authentication
    pub client_secret: String,
    /// Requested validity
    pub validity: TokenValidity,
    /// Origins the token is restricted to
    pub allowed_domains: Vec<String>,
    /// Opaque authorization server parameters, passed through verbatim
    #[serde(default)]
    pub provisioning: serde_json::Value,
}

/// Operations against the external authorization server.
///
/// Every method distinguishes transient failures (timeouts, connection
/// errors) from explicit rejections via [`KeyManagerError::is_transient`];
/// the coordinator uses that split to decide whether a failed attempt is
/// safely retryable.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Create an OAuth client and return its credentials
    async fn create_client(&self, spec: &ClientSpec) -> Result<ClientCredentials>;

    /// Look up a client by its registered name.
    ///
    /// Used by the resume path when a prior create call timed out with an
    /// unknown outcome, before risking a duplicate creation.
    async fn find_client(&self, client_name: &str) -> Result<Option<ClientCredentials>>;

    /// Issue an access token bound to a client and domain list
    async fn issue_token(&self, request: &TokenIssueRequest) -> Result<AccessTokenInfo>;

    /// Revoke an access token
    async fn revoke_token(&self, access_token: &str) -> Result<()>;

    /// Delete a client mapping. Deleting an unknown client succeeds, so
    /// retrying a delete is idempotent.
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// Replace the allowed-domain binding of an issued token
    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()>;
}
