//! In-memory registration state store.
//!
//! Backs tests and single-process development deployments. All maps sit
//! behind one mutex each; claim and compare-and-set operations hold the
//! attempt mutex across the read-check-write, which is the single-writer
//! guarantee the coordinator relies on.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::registry::types::{
    AccessTokenInfo, ApplicationRecord, AttemptKey, AuditEvent, RegistrationAttempt,
    RegistrationPhase,
};
use crate::storage::traits::*;

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation of [`RegistryStorage`]
#[derive(Default)]
pub struct MemoryRegistryStorage {
    /// storage_key -> live attempt
    attempts: Mutex<HashMap<String, RegistrationAttempt>>,
    /// Abandoned attempts, retained for audit
    archived_attempts: Mutex<Vec<RegistrationAttempt>>,
    /// "user:app" -> application record
    applications: Mutex<HashMap<String, ApplicationRecord>>,
    /// access token -> token info
    tokens: Mutex<HashMap<String, AccessTokenInfo>>,
    audit: Mutex<Vec<AuditEvent>>,
}

impl MemoryRegistryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn application_key(user_id: &str, application_name: &str) -> String {
        format!("{}:{}", user_id, application_name)
    }

    fn lock_error(what: &str) -> StorageError {
        StorageError::QueryFailed(format!("{} lock poisoned", what))
    }
}

#[async_trait]
impl RegistrationAttemptStore for MemoryRegistryStorage {
    async fn claim_attempt(&self, attempt: &RegistrationAttempt) -> Result<ClaimOutcome> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| Self::lock_error("attempt"))?;
        let storage_key = attempt.key.storage_key();
        if let Some(existing) = attempts.get(&storage_key) {
            return Ok(ClaimOutcome::Existing(existing.clone()));
        }
        attempts.insert(storage_key, attempt.clone());
        Ok(ClaimOutcome::Claimed)
    }

    async fn get_attempt(&self, key: &AttemptKey) -> Result<Option<RegistrationAttempt>> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| Self::lock_error("attempt"))?;
        Ok(attempts.get(&key.storage_key()).cloned())
    }

    async fn update_attempt(
        &self,
        attempt: &RegistrationAttempt,
        expected_phase: RegistrationPhase,
    ) -> Result<bool> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| Self::lock_error("attempt"))?;
        let storage_key = attempt.key.storage_key();
        match attempts.get(&storage_key) {
            Some(existing) if existing.phase == expected_phase => {
                attempts.insert(storage_key, attempt.clone());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound(format!(
                "No attempt for {}",
                attempt.key
            ))),
        }
    }

    async fn abandon_attempt(&self, key: &AttemptKey) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| Self::lock_error("attempt"))?;
        match attempts.remove(&key.storage_key()) {
            Some(attempt) => {
                self.archived_attempts
                    .lock()
                    .map_err(|_| Self::lock_error("archive"))?
                    .push(attempt);
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("No attempt for {}", key))),
        }
    }
}

#[async_trait]
impl ApplicationStore for MemoryRegistryStorage {
    async fn upsert_application(&self, application: &ApplicationRecord) -> Result<()> {
        let mut applications = self
            .applications
            .lock()
            .map_err(|_| Self::lock_error("application"))?;
        applications.insert(
            Self::application_key(&application.user_id, &application.application_name),
            application.clone(),
        );
        Ok(())
    }

    async fn get_application(
        &self,
        user_id: &str,
        application_name: &str,
    ) -> Result<Option<ApplicationRecord>> {
        let applications = self
            .applications
            .lock()
            .map_err(|_| Self::lock_error("application"))?;
        Ok(applications
            .get(&Self::application_key(user_id, application_name))
            .cloned())
    }

    async fn get_application_by_consumer_key(
        &self,
        consumer_key: &str,
    ) -> Result<Option<ApplicationRecord>> {
        let applications = self
            .applications
            .lock()
            .map_err(|_| Self::lock_error("application"))?;
        Ok(applications
            .values()
            .find(|app| app.consumer_key.as_deref() == Some(consumer_key))
            .cloned())
    }

    async fn clear_credentials(&self, consumer_key: &str) -> Result<()> {
        let mut applications = self
            .applications
            .lock()
            .map_err(|_| Self::lock_error("application"))?;
        let application = applications
            .values_mut()
            .find(|app| app.consumer_key.as_deref() == Some(consumer_key))
            .ok_or_else(|| {
                StorageError::NotFound(format!("No application holds consumer key {}", consumer_key))
            })?;
        application.consumer_key = None;
        application.consumer_secret = None;
        application.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn merge_allowed_domains(
        &self,
        consumer_key: &str,
        domains: &[String],
    ) -> Result<Vec<String>> {
        let mut applications = self
            .applications
            .lock()
            .map_err(|_| Self::lock_error("application"))?;
        let application = applications
            .values_mut()
            .find(|app| app.consumer_key.as_deref() == Some(consumer_key))
            .ok_or_else(|| {
                StorageError::NotFound(format!("No application holds consumer key {}", consumer_key))
            })?;
        for domain in domains {
            if !application.allowed_domains.contains(domain) {
                application.allowed_domains.push(domain.clone());
            }
        }
        application.updated_at = chrono::Utc::now();
        Ok(application.allowed_domains.clone())
    }
}

#[async_trait]
impl TokenStore for MemoryRegistryStorage {
    async fn record_token(&self, info: &AccessTokenInfo) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        tokens.insert(info.access_token.clone(), info.clone());
        Ok(())
    }

    async fn get_token(&self, access_token: &str) -> Result<Option<AccessTokenInfo>> {
        let tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        Ok(tokens.get(access_token).cloned())
    }

    async fn token_exists(&self, access_token: &str) -> Result<bool> {
        let tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        Ok(tokens.contains_key(access_token))
    }

    async fn replace_token(&self, old_access_token: &str, info: &AccessTokenInfo) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        tokens.remove(old_access_token);
        tokens.insert(info.access_token.clone(), info.clone());
        Ok(())
    }

    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        match tokens.get_mut(access_token) {
            Some(info) => {
                info.allowed_domains = domains.to_vec();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "No recorded token {}",
                access_token
            ))),
        }
    }

    async fn remove_token(&self, access_token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(|_| Self::lock_error("token"))?;
        tokens.remove(access_token);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryRegistryStorage {
    async fn record_event(&self, event: &AuditEvent) -> Result<()> {
        let mut audit = self.audit.lock().map_err(|_| Self::lock_error("audit"))?;
        audit.push(event.clone());
        Ok(())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let audit = self.audit.lock().map_err(|_| Self::lock_error("audit"))?;
        Ok(audit.iter().rev().take(limit).cloned().collect())
    }
}

impl RegistryStorage for MemoryRegistryStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{RegistrationRequest, TokenType};

    fn attempt_for(user: &str, app: &str) -> RegistrationAttempt {
        RegistrationAttempt::new(&RegistrationRequest::new(AttemptKey::new(
            user,
            app,
            TokenType::Production,
        )))
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_per_key() {
        let storage = MemoryRegistryStorage::new();
        let first = attempt_for("alice", "app");
        let second = attempt_for("alice", "app");

        assert!(matches!(
            storage.claim_attempt(&first).await.unwrap(),
            ClaimOutcome::Claimed
        ));
        match storage.claim_attempt(&second).await.unwrap() {
            ClaimOutcome::Existing(existing) => assert_eq!(existing.attempt_id, first.attempt_id),
            ClaimOutcome::Claimed => panic!("second claim must observe the first attempt"),
        }

        // A different key claims independently
        let other = attempt_for("bob", "app");
        assert!(matches!(
            storage.claim_attempt(&other).await.unwrap(),
            ClaimOutcome::Claimed
        ));
    }

    #[tokio::test]
    async fn test_update_attempt_checks_phase() {
        let storage = MemoryRegistryStorage::new();
        let mut attempt = attempt_for("alice", "app");
        storage.claim_attempt(&attempt).await.unwrap();

        attempt.phase = RegistrationPhase::ClientCreated;
        assert!(
            storage
                .update_attempt(&attempt, RegistrationPhase::Requested)
                .await
                .unwrap()
        );

        // Stale expectation loses the race
        attempt.phase = RegistrationPhase::TokenIssued;
        assert!(
            !storage
                .update_attempt(&attempt, RegistrationPhase::Requested)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_abandon_frees_the_key() {
        let storage = MemoryRegistryStorage::new();
        let attempt = attempt_for("alice", "app");
        storage.claim_attempt(&attempt).await.unwrap();
        storage.abandon_attempt(&attempt.key).await.unwrap();

        assert!(storage.get_attempt(&attempt.key).await.unwrap().is_none());
        assert!(matches!(
            storage.claim_attempt(&attempt_for("alice", "app")).await.unwrap(),
            ClaimOutcome::Claimed
        ));
    }

    #[tokio::test]
    async fn test_merge_allowed_domains_ignores_duplicates() {
        let storage = MemoryRegistryStorage::new();
        let now = chrono::Utc::now();
        storage
            .upsert_application(&ApplicationRecord {
                user_id: "alice".to_string(),
                application_name: "app".to_string(),
                token_type: TokenType::Production,
                status: RegistrationPhase::Completed,
                consumer_key: Some("ck-1".to_string()),
                consumer_secret: Some("cs-1".to_string()),
                callback_url: None,
                allowed_domains: vec!["example.com".to_string()],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let merged = storage
            .merge_allowed_domains(
                "ck-1",
                &["example.com".to_string(), "example.org".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(merged, vec!["example.com", "example.org"]);
    }
}
