//! Allowed-domain management for applications and issued tokens.

use std::sync::Arc;

use crate::errors::RegistryError;
use crate::keymanager::KeyManager;
use crate::registry::locks::KeyedLocks;
use crate::registry::types::{AuditEvent, AuditKind};
use crate::storage::traits::*;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Manages the allowed-domain sets recorded against applications and bound
/// to issued tokens.
pub struct TokenDomainGuard {
    key_manager: Arc<dyn KeyManager>,
    storage: Arc<dyn RegistryStorage>,
    token_locks: Arc<KeyedLocks>,
}

impl TokenDomainGuard {
    pub fn new(
        key_manager: Arc<dyn KeyManager>,
        storage: Arc<dyn RegistryStorage>,
        token_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            key_manager,
            storage,
            token_locks,
        }
    }

    /// Merge domains into an application's allowed set.
    ///
    /// Purely local: the merged set takes effect on tokens at their next
    /// issuance or explicit rebinding. Already-present domains are ignored,
    /// so the call is idempotent.
    pub async fn add_allowed_domains(
        &self,
        consumer_key: &str,
        domains: &[String],
    ) -> Result<Vec<String>> {
        if consumer_key.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "Consumer key must be non-empty".to_string(),
            ));
        }
        if domains.iter().any(|d| d.trim().is_empty()) {
            return Err(RegistryError::InvalidRequest(
                "Domains must be non-empty".to_string(),
            ));
        }

        let merged = self
            .storage
            .merge_allowed_domains(consumer_key, domains)
            .await?;

        self.storage
            .record_event(&AuditEvent::new(
                AuditKind::DomainsAdded,
                consumer_key,
                &format!("allowed domains merged to [{}]", merged.join(", ")),
            ))
            .await?;

        tracing::debug!(consumer_key, count = merged.len(), "allowed domains merged");
        Ok(merged)
    }

    /// Rebind a live token's allowed domains, replacing the current set.
    ///
    /// Serialized per token with renewal, so a concurrent renewal and
    /// rebinding cannot interleave on the same token. The key manager is
    /// updated before the local record.
    pub async fn update_allowed_domains(
        &self,
        access_token: &str,
        domains: &[String],
    ) -> Result<()> {
        if access_token.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "Access token must be non-empty".to_string(),
            ));
        }

        let lock = self.token_locks.lock_for(access_token).await;
        let _guard = lock.lock().await;

        if self.storage.get_token(access_token).await?.is_none() {
            return Err(RegistryError::InvalidRequest(
                "No recorded token to update".to_string(),
            ));
        }

        self.key_manager
            .update_token_domains(access_token, domains)
            .await?;

        if let Err(err) = self.storage.update_token_domains(access_token, domains).await {
            tracing::error!(error = %err, "token domains updated at key manager but store update failed");
            return Err(RegistryError::Inconsistent(format!(
                "Token domains updated remotely but not recorded locally: {}",
                err
            )));
        }

        self.storage
            .record_event(&AuditEvent::new(
                AuditKind::DomainsUpdated,
                access_token,
                &format!("token domains set to [{}]", domains.join(", ")),
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymanager::inmemory::{FailureMode, KeyManagerOp, MemoryKeyManager};
    use crate::registry::coordinator::RegistrationCoordinator;
    use crate::registry::types::*;
    use crate::storage::inmemory::MemoryRegistryStorage;
    use crate::storage::traits::TokenStore;

    struct Fixture {
        key_manager: Arc<MemoryKeyManager>,
        storage: Arc<MemoryRegistryStorage>,
        coordinator: RegistrationCoordinator,
        guard: TokenDomainGuard,
    }

    fn fixture() -> Fixture {
        let key_manager = Arc::new(MemoryKeyManager::new());
        let storage = Arc::new(MemoryRegistryStorage::new());
        let locks = Arc::new(KeyedLocks::new());
        let coordinator = RegistrationCoordinator::new(
            key_manager.clone(),
            storage.clone(),
            locks.clone(),
            TokenValidity::KeyManagerDefault,
        );
        let guard = TokenDomainGuard::new(key_manager.clone(), storage.clone(), locks);
        Fixture {
            key_manager,
            storage,
            coordinator,
            guard,
        }
    }

    async fn register(f: &Fixture) -> RegistrationResult {
        let mut request = RegistrationRequest::new(AttemptKey::new(
            "alice",
            "weatherApp",
            TokenType::Sandbox,
        ));
        request.allowed_domains = vec!["example.com".to_string()];
        f.coordinator.request_registration(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_allowed_domains_merges_without_duplicates() {
        let f = fixture();
        let result = register(&f).await;
        let consumer_key = result.credentials.unwrap().client_id;

        let merged = f
            .guard
            .add_allowed_domains(
                &consumer_key,
                &["example.com".to_string(), "example.org".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(merged, vec!["example.com", "example.org"]);

        // Idempotent on repeat
        let merged = f
            .guard
            .add_allowed_domains(&consumer_key, &["example.org".to_string()])
            .await
            .unwrap();
        assert_eq!(merged, vec!["example.com", "example.org"]);
    }

    #[tokio::test]
    async fn test_add_allowed_domains_unknown_consumer_key() {
        let f = fixture();
        let err = f
            .guard
            .add_allowed_domains("missing", &["example.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_update_allowed_domains_rebinds_token() {
        let f = fixture();
        let result = register(&f).await;
        let token = result.token.unwrap();

        f.guard
            .update_allowed_domains(&token.access_token, &["example.net".to_string()])
            .await
            .unwrap();

        assert_eq!(
            f.key_manager.token_domains(&token.access_token),
            Some(vec!["example.net".to_string()])
        );
        let recorded = f
            .storage
            .get_token(&token.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.allowed_domains, vec!["example.net"]);
    }

    #[tokio::test]
    async fn test_update_allowed_domains_key_manager_failure_leaves_record() {
        let f = fixture();
        let result = register(&f).await;
        let token = result.token.unwrap();

        f.key_manager
            .inject_failure(KeyManagerOp::UpdateDomains, FailureMode::Rejected);
        let err = f
            .guard
            .update_allowed_domains(&token.access_token, &["example.net".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::BackendRejected(_)));

        let recorded = f
            .storage
            .get_token(&token.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.allowed_domains, vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_update_allowed_domains_unknown_token() {
        let f = fixture();
        let err = f
            .guard
            .update_allowed_domains("missing", &["example.net".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRequest(_)));
    }
}
