//! Application registration coordinator.
//!
//! Orchestrates the multi-step OAuth client provisioning workflow:
//! REQUESTED -> CLIENT_CREATED -> TOKEN_ISSUED -> COMPLETED, with FAILED
//! reachable from any non-terminal phase. Every phase transition is
//! persisted through a compare-and-set on the attempt record, so a crashed
//! or timed-out workflow resumes from its last completed phase instead of
//! restarting, and two concurrent requests for the same key never both
//! create a client.

use chrono::Utc;
use std::sync::Arc;

use crate::errors::{RegistryError, StorageError};
use crate::keymanager::{ClientSpec, KeyManager, TokenIssueRequest};
use crate::registry::locks::KeyedLocks;
use crate::registry::types::*;
use crate::storage::traits::*;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coordinates client provisioning, token lifecycle, and resumable
/// registration workflows.
///
/// Dependencies are injected at construction time; there is no process-wide
/// instance.
pub struct RegistrationCoordinator {
    key_manager: Arc<dyn KeyManager>,
    storage: Arc<dyn RegistryStorage>,
    token_locks: Arc<KeyedLocks>,
    /// Substituted when a request carries the key-manager-default sentinel
    default_validity: TokenValidity,
}

impl RegistrationCoordinator {
    pub fn new(
        key_manager: Arc<dyn KeyManager>,
        storage: Arc<dyn RegistryStorage>,
        token_locks: Arc<KeyedLocks>,
        default_validity: TokenValidity,
    ) -> Self {
        Self {
            key_manager,
            storage,
            token_locks,
            default_validity,
        }
    }

    /// Start (or observe) a registration workflow for a key.
    ///
    /// An existing attempt for the key is returned unchanged, whatever its
    /// phase; a second client is never provisioned for a claimed key. A
    /// fresh key is claimed atomically and driven through the full
    /// workflow.
    pub async fn request_registration(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResult> {
        validate_identifiers(&request.key)?;

        let mut request = request;
        if request.validity == TokenValidity::KeyManagerDefault {
            request.validity = self.default_validity;
        }

        let attempt = RegistrationAttempt::new(&request);
        match self.storage.claim_attempt(&attempt).await? {
            ClaimOutcome::Existing(existing) => {
                tracing::debug!(key = %existing.key, phase = %existing.phase, "registration already claimed");
                return Ok(RegistrationResult::from_attempt(&existing));
            }
            ClaimOutcome::Claimed => {}
        }

        tracing::debug!(key = %attempt.key, "registration claimed");
        self.storage
            .upsert_application(&application_from_attempt(&attempt))
            .await?;

        self.provision(attempt).await
    }

    /// Resume a registration that stopped before producing a token.
    ///
    /// Accepts attempts whose resume point is CLIENT_CREATED (issue the
    /// token, never recreate the client), REQUESTED with an unknown
    /// creation outcome (query the key manager before creating anything),
    /// or TOKEN_ISSUED (finalize persistence only). Anything else fails
    /// with an invalid-state error.
    pub async fn complete_registration(
        &self,
        user_id: &str,
        application_name: &str,
        token_type: TokenType,
    ) -> Result<RegistrationResult> {
        let key = AttemptKey::new(user_id, application_name, token_type);
        validate_identifiers(&key)?;

        let attempt = self
            .storage
            .get_attempt(&key)
            .await?
            .ok_or_else(|| {
                RegistryError::InvalidRequest(format!("No registration attempt to resume for {}", key))
            })?;

        let resumable = match attempt.phase {
            // Crash between a phase write and the failure write leaves the
            // record in its forward phase; both shapes resume the same way.
            RegistrationPhase::ClientCreated | RegistrationPhase::TokenIssued => true,
            RegistrationPhase::Failed => true,
            _ => false,
        };
        if !resumable {
            return Err(RegistryError::InvalidState(format!(
                "Attempt for {} is {} and cannot be resumed",
                key, attempt.phase
            )));
        }
        if attempt.phase == RegistrationPhase::Failed
            && attempt.resume_from == RegistrationPhase::Requested
            && attempt.credentials.is_none()
            && !attempt.creation_outcome_unknown
        {
            // Client creation definitively never happened; a fresh create
            // below is a retry, not a duplicate.
            tracing::debug!(key = %key, "resuming from definitive creation failure");
        }

        tracing::debug!(key = %key, resume_from = %attempt.resume_from, "resuming registration");
        self.provision(attempt).await
    }

    /// Drive an attempt through its remaining phases
    async fn provision(&self, mut attempt: RegistrationAttempt) -> Result<RegistrationResult> {
        if attempt.credentials.is_none() {
            self.provision_client(&mut attempt).await?;
        }

        if attempt.token.is_none() {
            self.provision_token(&mut attempt).await?;
        }

        if attempt.phase != RegistrationPhase::Completed {
            // Re-record on resume in case the original write never landed;
            // the record is an upsert keyed by the token itself
            if let Some(token) = &attempt.token {
                self.storage.record_token(token).await?;
            }
            self.transition(&mut attempt, RegistrationPhase::Completed)
                .await?;
        }
        self.storage
            .upsert_application(&application_from_attempt(&attempt))
            .await?;

        tracing::debug!(key = %attempt.key, "registration completed");
        Ok(RegistrationResult::from_attempt(&attempt))
    }

    async fn provision_client(&self, attempt: &mut RegistrationAttempt) -> Result<()> {
        if attempt.creation_outcome_unknown {
            // A prior create call timed out; the client may exist under its
            // deterministic name. Query before creating a duplicate.
            match self
                .key_manager
                .find_client(&attempt.key.client_name())
                .await
            {
                Ok(Some(credentials)) => {
                    tracing::debug!(key = %attempt.key, "adopted client from unresolved creation");
                    attempt.credentials = Some(credentials);
                    attempt.creation_outcome_unknown = false;
                    attempt.failure = None;
                    self.transition(attempt, RegistrationPhase::ClientCreated)
                        .await?;
                    return Ok(());
                }
                Ok(None) => {
                    attempt.creation_outcome_unknown = false;
                }
                Err(err) => {
                    self.fail_attempt(attempt, &err.to_string(), true).await;
                    return Err(err.into());
                }
            }
        }

        let spec = ClientSpec {
            client_name: attempt.key.client_name(),
            owner: attempt.key.user_id.clone(),
            callback_url: attempt.callback_url.clone(),
            provisioning: attempt.provisioning.clone(),
        };
        match self.key_manager.create_client(&spec).await {
            Ok(credentials) => {
                attempt.credentials = Some(credentials);
                attempt.failure = None;
                self.transition(attempt, RegistrationPhase::ClientCreated)
                    .await
            }
            Err(err) => {
                // A transient failure means the request may have reached the
                // authorization server; the resume path must check first.
                let outcome_unknown = err.is_transient();
                self.fail_attempt(attempt, &err.to_string(), outcome_unknown)
                    .await;
                Err(err.into())
            }
        }
    }

    async fn provision_token(&self, attempt: &mut RegistrationAttempt) -> Result<()> {
        let credentials = attempt
            .credentials
            .clone()
            .ok_or_else(|| {
                RegistryError::InvalidState(format!("Attempt for {} has no credentials", attempt.key))
            })?;

        let issue = TokenIssueRequest {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            validity: attempt.validity,
            allowed_domains: attempt.allowed_domains.clone(),
            provisioning: attempt.provisioning.clone(),
        };
        match self.key_manager.issue_token(&issue).await {
            Ok(info) => {
                attempt.token = Some(info.clone());
                attempt.failure = None;
                self.transition(attempt, RegistrationPhase::TokenIssued)
                    .await?;
                self.storage.record_token(&info).await?;
                Ok(())
            }
            Err(err) => {
                self.fail_attempt(attempt, &err.to_string(), false).await;
                Err(err.into())
            }
        }
    }

    /// Revoke `old_access_token` and issue a replacement bound to the given
    /// client and domains.
    ///
    /// The replacement is issued first and the old token revoked before
    /// returning; when revocation fails the replacement is revoked again
    /// best-effort and the call fails, leaving the old token untouched.
    /// Success therefore implies the old token is gone at the key manager.
    pub async fn renew_token(
        &self,
        old_access_token: &str,
        client_id: &str,
        client_secret: &str,
        validity: TokenValidity,
        allowed_domains: Vec<String>,
        provisioning: serde_json::Value,
    ) -> Result<AccessTokenInfo> {
        if old_access_token.trim().is_empty() || client_id.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "Access token and client id must be non-empty".to_string(),
            ));
        }

        let lock = self.token_locks.lock_for(old_access_token).await;
        let _guard = lock.lock().await;

        let validity = if validity == TokenValidity::KeyManagerDefault {
            self.default_validity
        } else {
            validity
        };

        let issue = TokenIssueRequest {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            validity,
            allowed_domains,
            provisioning,
        };
        let replacement = self.key_manager.issue_token(&issue).await?;

        if let Err(err) = self.key_manager.revoke_token(old_access_token).await {
            tracing::warn!(error = %err, "revocation of old token failed, rolling back replacement");
            if let Err(rollback) = self
                .key_manager
                .revoke_token(&replacement.access_token)
                .await
            {
                tracing::error!(error = %rollback, "rollback revocation of replacement token failed");
            }
            return Err(err.into());
        }

        if let Err(err) = self
            .storage
            .replace_token(old_access_token, &replacement)
            .await
        {
            tracing::error!(error = %err, "token renewed at key manager but store update failed");
            return Err(RegistryError::Inconsistent(format!(
                "Token renewed remotely but not recorded locally: {}",
                err
            )));
        }

        self.storage
            .record_event(&AuditEvent::new(
                AuditKind::TokenRenewed,
                client_id,
                &format!("token renewed, old token revoked for client {}", client_id),
            ))
            .await?;

        Ok(replacement)
    }

    /// Delete an OAuth client mapping, key manager first.
    ///
    /// Key manager deletion of an unknown client succeeds, so retrying is
    /// idempotent. A local store failure after a successful remote delete
    /// surfaces as a reconciliation error and is never retried here.
    pub async fn delete_client(&self, consumer_key: &str) -> Result<()> {
        if consumer_key.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "Consumer key must be non-empty".to_string(),
            ));
        }

        self.key_manager.delete_client(consumer_key).await?;

        match self.storage.clear_credentials(consumer_key).await {
            Ok(()) => {}
            // Nothing local holds the key; the earlier delete already
            // cleared it.
            Err(StorageError::NotFound(_)) => {}
            Err(err) => {
                tracing::error!(
                    consumer_key,
                    error = %err,
                    "client deleted at key manager but local credentials not cleared"
                );
                return Err(RegistryError::Inconsistent(format!(
                    "Client {} deleted remotely but local cleanup failed: {}",
                    consumer_key, err
                )));
            }
        }

        self.storage
            .record_event(&AuditEvent::new(
                AuditKind::ClientDeleted,
                consumer_key,
                "client mapping deleted",
            ))
            .await?;
        Ok(())
    }

    /// Whether an application access token is recorded in the store
    pub async fn token_exists(&self, access_token: &str) -> Result<bool> {
        if access_token.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "Access token must be non-empty".to_string(),
            ));
        }
        Ok(self.storage.token_exists(access_token).await?)
    }

    /// Archive the live attempt for a key so a new workflow can start
    pub async fn abandon_registration(&self, key: &AttemptKey) -> Result<()> {
        validate_identifiers(key)?;
        self.storage.abandon_attempt(key).await?;
        self.storage
            .record_event(&AuditEvent::new(
                AuditKind::AttemptAbandoned,
                &key.storage_key(),
                "registration attempt abandoned",
            ))
            .await?;
        Ok(())
    }

    /// Persist a forward phase transition with a compare-and-set on the
    /// current phase
    async fn transition(
        &self,
        attempt: &mut RegistrationAttempt,
        next: RegistrationPhase,
    ) -> Result<()> {
        let expected = attempt.phase;
        attempt.phase = next;
        attempt.resume_from = next;
        attempt.updated_at = Utc::now();
        let written = self.storage.update_attempt(attempt, expected).await?;
        if !written {
            return Err(RegistryError::Inconsistent(format!(
                "Attempt for {} was modified concurrently during {} -> {}",
                attempt.key, expected, next
            )));
        }
        tracing::debug!(key = %attempt.key, phase = %next, "phase transition");
        Ok(())
    }

    /// Persist a FAILED phase, retaining the resume point. Store failures
    /// here are logged and swallowed so the original error propagates.
    async fn fail_attempt(
        &self,
        attempt: &mut RegistrationAttempt,
        message: &str,
        outcome_unknown: bool,
    ) {
        let expected = attempt.phase;
        attempt.phase = RegistrationPhase::Failed;
        attempt.creation_outcome_unknown = attempt.creation_outcome_unknown || outcome_unknown;
        attempt.failure = Some(message.to_string());
        attempt.updated_at = Utc::now();
        tracing::warn!(
            key = %attempt.key,
            resume_from = %attempt.resume_from,
            outcome_unknown = attempt.creation_outcome_unknown,
            "registration failed: {}", message
        );
        match self.storage.update_attempt(attempt, expected).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(key = %attempt.key, "failure write lost a phase race");
            }
            Err(err) => {
                tracing::error!(key = %attempt.key, error = %err, "failed to persist FAILED phase");
            }
        }
        // Keep the mirrored application record in step with the attempt
        if let Err(err) = self
            .storage
            .upsert_application(&application_from_attempt(attempt))
            .await
        {
            tracing::error!(key = %attempt.key, error = %err, "failed to mirror FAILED status to application record");
        }
    }
}

fn validate_identifiers(key: &AttemptKey) -> Result<()> {
    if key.user_id.trim().is_empty() || key.application_name.trim().is_empty() {
        return Err(RegistryError::InvalidRequest(
            "User id and application name must be non-empty".to_string(),
        ));
    }
    Ok(())
}

fn application_from_attempt(attempt: &RegistrationAttempt) -> ApplicationRecord {
    let credentials = attempt.credentials.as_ref();
    ApplicationRecord {
        user_id: attempt.key.user_id.clone(),
        application_name: attempt.key.application_name.clone(),
        token_type: attempt.key.token_type,
        status: attempt.phase,
        consumer_key: credentials.map(|c| c.client_id.clone()),
        consumer_secret: credentials.map(|c| c.client_secret.clone()),
        callback_url: attempt.callback_url.clone(),
        allowed_domains: attempt.allowed_domains.clone(),
        created_at: attempt.created_at,
        updated_at: attempt.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymanager::inmemory::{FailureMode, KeyManagerOp, MemoryKeyManager};
    use crate::storage::inmemory::MemoryRegistryStorage;

    struct Fixture {
        key_manager: Arc<MemoryKeyManager>,
        storage: Arc<MemoryRegistryStorage>,
        coordinator: RegistrationCoordinator,
    }

    fn fixture() -> Fixture {
        let key_manager = Arc::new(MemoryKeyManager::new());
        let storage = Arc::new(MemoryRegistryStorage::new());
        let coordinator = RegistrationCoordinator::new(
            key_manager.clone(),
            storage.clone(),
            Arc::new(KeyedLocks::new()),
            TokenValidity::KeyManagerDefault,
        );
        Fixture {
            key_manager,
            storage,
            coordinator,
        }
    }

    fn sandbox_request(user: &str, app: &str) -> RegistrationRequest {
        RegistrationRequest {
            key: AttemptKey::new(user, app, TokenType::Sandbox),
            callback_url: Some("https://app.example.com/callback".to_string()),
            allowed_domains: vec!["example.com".to_string()],
            validity: TokenValidity::Seconds(3600),
            provisioning: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_registration_happy_path() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();

        assert_eq!(result.status, RegistrationStatus::Completed);
        assert_eq!(result.phase, RegistrationPhase::Completed);
        let credentials = result.credentials.unwrap();
        assert!(!credentials.client_id.is_empty());
        assert!(!credentials.client_secret.is_empty());
        let token = result.token.unwrap();
        assert_eq!(token.allowed_domains, vec!["example.com"]);
        assert!(f.key_manager.token_active(&token.access_token));

        // Application record mirrors the completed registration
        let application = f
            .storage
            .get_application("alice", "weatherApp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(application.status, RegistrationPhase::Completed);
        assert_eq!(application.consumer_key.as_deref(), Some(credentials.client_id.as_str()));
    }

    #[tokio::test]
    async fn test_empty_identifiers_rejected() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("", "weatherApp"))
            .await;
        assert!(matches!(result, Err(RegistryError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_duplicate_request_provisions_once() {
        let f = fixture();
        let first = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let second = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();

        assert_eq!(f.key_manager.clients_created(), 1);
        assert_eq!(
            first.credentials.unwrap().client_id,
            second.credentials.unwrap().client_id
        );
    }

    #[tokio::test]
    async fn test_token_failure_then_complete_resumes_without_second_client() {
        let f = fixture();
        f.key_manager
            .inject_failure(KeyManagerOp::IssueToken, FailureMode::Transient);

        let err = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::TransientBackend(_)));

        let attempt = f
            .storage
            .get_attempt(&AttemptKey::new("alice", "weatherApp", TokenType::Sandbox))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt.phase, RegistrationPhase::Failed);
        assert_eq!(attempt.resume_from, RegistrationPhase::ClientCreated);

        let result = f
            .coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap();
        assert_eq!(result.status, RegistrationStatus::Completed);
        assert_eq!(f.key_manager.clients_created(), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_mirrors_status_to_application() {
        let f = fixture();
        f.key_manager
            .inject_failure(KeyManagerOp::IssueToken, FailureMode::Transient);

        assert!(
            f.coordinator
                .request_registration(sandbox_request("alice", "weatherApp"))
                .await
                .is_err()
        );

        let application = f
            .storage
            .get_application("alice", "weatherApp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(application.status, RegistrationPhase::Failed);
        // Credentials reached before the failure stay on the record
        assert!(application.consumer_key.is_some());

        f.coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap();
        let application = f
            .storage
            .get_application("alice", "weatherApp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(application.status, RegistrationPhase::Completed);
    }

    #[tokio::test]
    async fn test_unknown_creation_outcome_adopts_existing_client() {
        let f = fixture();
        f.key_manager
            .inject_failure(KeyManagerOp::CreateClient, FailureMode::TimeoutAfterEffect);

        let err = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::TransientBackend(_)));
        // The client exists server-side despite the timeout
        assert_eq!(f.key_manager.clients_created(), 1);

        let attempt = f
            .storage
            .get_attempt(&AttemptKey::new("alice", "weatherApp", TokenType::Sandbox))
            .await
            .unwrap()
            .unwrap();
        assert!(attempt.creation_outcome_unknown);

        let result = f
            .coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap();
        assert_eq!(result.status, RegistrationStatus::Completed);
        // Resume adopted the orphaned client instead of creating another
        assert_eq!(f.key_manager.clients_created(), 1);
    }

    #[tokio::test]
    async fn test_definitive_creation_failure_recreates_on_resume() {
        let f = fixture();
        f.key_manager
            .inject_failure(KeyManagerOp::CreateClient, FailureMode::Rejected);

        let err = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::BackendRejected(_)));
        assert_eq!(f.key_manager.clients_created(), 0);

        let result = f
            .coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap();
        assert_eq!(result.status, RegistrationStatus::Completed);
        assert_eq!(f.key_manager.clients_created(), 1);
    }

    #[tokio::test]
    async fn test_complete_without_attempt_is_invalid_request() {
        let f = fixture();
        let err = f
            .coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_complete_on_completed_attempt_is_invalid_state() {
        let f = fixture();
        f.coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();

        let err = f
            .coordinator
            .complete_registration("alice", "weatherApp", TokenType::Sandbox)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_renew_revokes_old_token() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let credentials = result.credentials.unwrap();
        let old = result.token.unwrap();

        let renewed = f
            .coordinator
            .renew_token(
                &old.access_token,
                &credentials.client_id,
                &credentials.client_secret,
                TokenValidity::Seconds(7200),
                vec!["example.org".to_string()],
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        assert!(!f.key_manager.token_active(&old.access_token));
        assert!(f.key_manager.token_active(&renewed.access_token));
        assert_eq!(renewed.allowed_domains, vec!["example.org"]);
        assert!(f.storage.token_exists(&renewed.access_token).await.unwrap());
        assert!(!f.storage.token_exists(&old.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_failure_leaves_old_token_valid() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let credentials = result.credentials.unwrap();
        let old = result.token.unwrap();

        f.key_manager
            .inject_failure(KeyManagerOp::RevokeToken, FailureMode::Rejected);
        let err = f
            .coordinator
            .renew_token(
                &old.access_token,
                &credentials.client_id,
                &credentials.client_secret,
                TokenValidity::KeyManagerDefault,
                vec![],
                serde_json::Value::Null,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::BackendRejected(_)));

        assert!(f.key_manager.token_active(&old.access_token));
        assert!(f.storage.token_exists(&old.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_client_is_idempotent() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let consumer_key = result.credentials.unwrap().client_id;

        f.coordinator.delete_client(&consumer_key).await.unwrap();
        let application = f
            .storage
            .get_application("alice", "weatherApp")
            .await
            .unwrap()
            .unwrap();
        assert!(application.consumer_key.is_none());
        assert!(application.consumer_secret.is_none());

        // Second delete: key manager treats not-found as success, local
        // state has nothing left to clear
        f.coordinator.delete_client(&consumer_key).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_client_remote_failure_leaves_local_state() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let consumer_key = result.credentials.unwrap().client_id;

        f.key_manager
            .inject_failure(KeyManagerOp::DeleteClient, FailureMode::Transient);
        assert!(f.coordinator.delete_client(&consumer_key).await.is_err());

        let application = f
            .storage
            .get_application("alice", "weatherApp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(application.consumer_key.as_deref(), Some(consumer_key.as_str()));
    }

    #[tokio::test]
    async fn test_abandon_frees_key_for_new_attempt() {
        let f = fixture();
        f.key_manager
            .inject_failure(KeyManagerOp::CreateClient, FailureMode::Rejected);
        let key = AttemptKey::new("alice", "weatherApp", TokenType::Sandbox);

        assert!(
            f.coordinator
                .request_registration(sandbox_request("alice", "weatherApp"))
                .await
                .is_err()
        );
        f.coordinator.abandon_registration(&key).await.unwrap();

        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        assert_eq!(result.status, RegistrationStatus::Completed);
    }

    #[tokio::test]
    async fn test_token_exists() {
        let f = fixture();
        let result = f
            .coordinator
            .request_registration(sandbox_request("alice", "weatherApp"))
            .await
            .unwrap();
        let token = result.token.unwrap();

        assert!(f.coordinator.token_exists(&token.access_token).await.unwrap());
        assert!(!f.coordinator.token_exists("unknown").await.unwrap());
        assert!(f.coordinator.token_exists("  ").await.is_err());
    }
}
