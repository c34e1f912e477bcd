//! In-memory key manager double.
//!
//! Backs tests and local development. Failure injection lets tests exercise
//! every mid-sequence failure the coordinator must survive, including
//! create-client timeouts whose outcome is unknown to the caller.

use base64::prelude::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{ClientSpec, KeyManager, Result, TokenIssueRequest};
use crate::errors::KeyManagerError;
use crate::registry::types::{AccessTokenInfo, ClientCredentials};
use async_trait::async_trait;

/// Operations that can have a failure injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyManagerOp {
    CreateClient,
    FindClient,
    IssueToken,
    RevokeToken,
    DeleteClient,
    UpdateDomains,
}

/// How an injected failure behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail before doing anything, retryable
    Transient,
    /// Fail before doing anything, not retryable
    Rejected,
    /// Perform the operation, then report a timeout. Models a request that
    /// succeeded server-side after the caller gave up.
    TimeoutAfterEffect,
}

#[derive(Clone)]
struct StoredClient {
    credentials: ClientCredentials,
    client_name: String,
}

#[derive(Clone)]
struct StoredToken {
    client_id: String,
    allowed_domains: Vec<String>,
}

/// In-memory implementation of [`KeyManager`]
#[derive(Default)]
pub struct MemoryKeyManager {
    clients: Mutex<HashMap<String, StoredClient>>,
    tokens: Mutex<HashMap<String, StoredToken>>,
    injected: Mutex<HashMap<KeyManagerOp, FailureMode>>,
    clients_created: Mutex<u32>,
}

fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

impl MemoryKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure for the next call to `op`
    pub fn inject_failure(&self, op: KeyManagerOp, mode: FailureMode) {
        self.injected
            .lock()
            .expect("injection lock poisoned")
            .insert(op, mode);
    }

    /// Total clients ever created, including ones later deleted
    pub fn clients_created(&self) -> u32 {
        *self.clients_created.lock().expect("counter lock poisoned")
    }

    /// Whether a token is currently active (issued and not revoked)
    pub fn token_active(&self, access_token: &str) -> bool {
        self.tokens
            .lock()
            .expect("token lock poisoned")
            .contains_key(access_token)
    }

    /// Domains currently bound to a token at the key manager
    pub fn token_domains(&self, access_token: &str) -> Option<Vec<String>> {
        self.tokens
            .lock()
            .expect("token lock poisoned")
            .get(access_token)
            .map(|t| t.allowed_domains.clone())
    }

    fn take_injection(&self, op: KeyManagerOp) -> Option<FailureMode> {
        self.injected
            .lock()
            .expect("injection lock poisoned")
            .remove(&op)
    }

    fn pre_call(&self, op: KeyManagerOp) -> Result<Option<FailureMode>> {
        match self.take_injection(op) {
            Some(FailureMode::Transient) => Err(KeyManagerError::Transient(format!(
                "injected transient failure for {:?}",
                op
            ))),
            Some(FailureMode::Rejected) => Err(KeyManagerError::Rejected(format!(
                "injected rejection for {:?}",
                op
            ))),
            other => Ok(other),
        }
    }

    fn post_call<T>(&self, op: KeyManagerOp, mode: Option<FailureMode>, value: T) -> Result<T> {
        match mode {
            Some(FailureMode::TimeoutAfterEffect) => Err(KeyManagerError::Transient(format!(
                "injected timeout for {:?}",
                op
            ))),
            _ => Ok(value),
        }
    }
}

#[async_trait]
impl KeyManager for MemoryKeyManager {
    async fn create_client(&self, spec: &ClientSpec) -> Result<ClientCredentials> {
        let mode = self.pre_call(KeyManagerOp::CreateClient)?;

        let credentials = ClientCredentials {
            client_id: Uuid::new_v4().to_string(),
            client_secret: generate_secret(),
        };
        self.clients.lock().expect("client lock poisoned").insert(
            credentials.client_id.clone(),
            StoredClient {
                credentials: credentials.clone(),
                client_name: spec.client_name.clone(),
            },
        );
        *self.clients_created.lock().expect("counter lock poisoned") += 1;

        self.post_call(KeyManagerOp::CreateClient, mode, credentials)
    }

    async fn find_client(&self, client_name: &str) -> Result<Option<ClientCredentials>> {
        let mode = self.pre_call(KeyManagerOp::FindClient)?;

        let found = self
            .clients
            .lock()
            .expect("client lock poisoned")
            .values()
            .find(|c| c.client_name == client_name)
            .map(|c| c.credentials.clone());

        self.post_call(KeyManagerOp::FindClient, mode, found)
    }

    async fn issue_token(&self, request: &TokenIssueRequest) -> Result<AccessTokenInfo> {
        let mode = self.pre_call(KeyManagerOp::IssueToken)?;

        {
            let clients = self.clients.lock().expect("client lock poisoned");
            let known = clients
                .get(&request.client_id)
                .filter(|c| c.credentials.client_secret == request.client_secret);
            if known.is_none() {
                return Err(KeyManagerError::Rejected(format!(
                    "unknown client or bad secret: {}",
                    request.client_id
                )));
            }
        }

        let access_token = generate_secret();
        self.tokens.lock().expect("token lock poisoned").insert(
            access_token.clone(),
            StoredToken {
                client_id: request.client_id.clone(),
                allowed_domains: request.allowed_domains.clone(),
            },
        );

        let info = AccessTokenInfo {
            access_token,
            client_id: request.client_id.clone(),
            allowed_domains: request.allowed_domains.clone(),
            validity: request.validity,
            issued_at: Utc::now(),
        };
        self.post_call(KeyManagerOp::IssueToken, mode, info)
    }

    async fn revoke_token(&self, access_token: &str) -> Result<()> {
        let mode = self.pre_call(KeyManagerOp::RevokeToken)?;
        self.tokens
            .lock()
            .expect("token lock poisoned")
            .remove(access_token);
        self.post_call(KeyManagerOp::RevokeToken, mode, ())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mode = self.pre_call(KeyManagerOp::DeleteClient)?;
        // Unknown clients delete successfully; retries stay idempotent
        self.clients
            .lock()
            .expect("client lock poisoned")
            .remove(client_id);
        self.tokens
            .lock()
            .expect("token lock poisoned")
            .retain(|_, token| token.client_id != client_id);
        self.post_call(KeyManagerOp::DeleteClient, mode, ())
    }

    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()> {
        let mode = self.pre_call(KeyManagerOp::UpdateDomains)?;
        let mut tokens = self.tokens.lock().expect("token lock poisoned");
        match tokens.get_mut(access_token) {
            Some(token) => {
                token.allowed_domains = domains.to_vec();
                drop(tokens);
                self.post_call(KeyManagerOp::UpdateDomains, mode, ())
            }
            None => Err(KeyManagerError::Rejected("unknown token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::TokenValidity;

    fn spec(name: &str) -> ClientSpec {
        ClientSpec {
            client_name: name.to_string(),
            owner: "alice".to_string(),
            callback_url: None,
            provisioning: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_client() {
        let km = MemoryKeyManager::new();
        let created = km.create_client(&spec("alice_app_SANDBOX")).await.unwrap();
        let found = km.find_client("alice_app_SANDBOX").await.unwrap().unwrap();
        assert_eq!(created, found);
        assert!(km.find_client("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_issue_requires_valid_secret() {
        let km = MemoryKeyManager::new();
        let credentials = km.create_client(&spec("c")).await.unwrap();

        let bad = TokenIssueRequest {
            client_id: credentials.client_id.clone(),
            client_secret: "wrong".to_string(),
            validity: TokenValidity::KeyManagerDefault,
            allowed_domains: vec![],
            provisioning: serde_json::Value::Null,
        };
        assert!(matches!(
            km.issue_token(&bad).await,
            Err(KeyManagerError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_client_is_idempotent() {
        let km = MemoryKeyManager::new();
        let credentials = km.create_client(&spec("c")).await.unwrap();
        km.delete_client(&credentials.client_id).await.unwrap();
        km.delete_client(&credentials.client_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_after_effect_still_creates() {
        let km = MemoryKeyManager::new();
        km.inject_failure(KeyManagerOp::CreateClient, FailureMode::TimeoutAfterEffect);

        let err = km.create_client(&spec("ghost")).await.unwrap_err();
        assert!(err.is_transient());
        // The client exists server-side even though the caller saw a timeout
        assert!(km.find_client("ghost").await.unwrap().is_some());
        assert_eq!(km.clients_created(), 1);
    }
}
