//! SQLite storage implementations
//!
//! This module provides SQLite-based implementations of all registration
//! state store traits. SQLite is suitable for single-instance deployments
//! and development.

mod applications;
mod attempts;
mod audit;
mod tokens;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

use crate::errors::StorageError;
use crate::registry::types::{
    AccessTokenInfo, ApplicationRecord, AttemptKey, AuditEvent, RegistrationAttempt,
    RegistrationPhase,
};
use crate::storage::traits::*;

pub use applications::SqliteApplicationStore;
pub use attempts::SqliteAttemptStore;
pub use audit::SqliteAuditStore;
pub use tokens::SqliteTokenStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Comprehensive SQLite registration state store
pub struct SqliteRegistryStorage {
    pool: SqlitePool,
    attempt_store: Arc<SqliteAttemptStore>,
    application_store: Arc<SqliteApplicationStore>,
    token_store: Arc<SqliteTokenStore>,
    audit_store: Arc<SqliteAuditStore>,
}

impl SqliteRegistryStorage {
    /// Create a new SQLite registry storage instance
    pub fn new(pool: SqlitePool) -> Self {
        let attempt_store = Arc::new(SqliteAttemptStore::new(pool.clone()));
        let application_store = Arc::new(SqliteApplicationStore::new(pool.clone()));
        let token_store = Arc::new(SqliteTokenStore::new(pool.clone()));
        let audit_store = Arc::new(SqliteAuditStore::new(pool.clone()));

        Self {
            pool,
            attempt_store,
            application_store,
            token_store,
            audit_store,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationAttemptStore for SqliteRegistryStorage {
    async fn claim_attempt(&self, attempt: &RegistrationAttempt) -> Result<ClaimOutcome> {
        self.attempt_store.claim_attempt(attempt).await
    }

    async fn get_attempt(&self, key: &AttemptKey) -> Result<Option<RegistrationAttempt>> {
        self.attempt_store.get_attempt(key).await
    }

    async fn update_attempt(
        &self,
        attempt: &RegistrationAttempt,
        expected_phase: RegistrationPhase,
    ) -> Result<bool> {
        self.attempt_store
            .update_attempt(attempt, expected_phase)
            .await
    }

    async fn abandon_attempt(&self, key: &AttemptKey) -> Result<()> {
        self.attempt_store.abandon_attempt(key).await
    }
}

#[async_trait]
impl ApplicationStore for SqliteRegistryStorage {
    async fn upsert_application(&self, application: &ApplicationRecord) -> Result<()> {
        self.application_store.upsert_application(application).await
    }

    async fn get_application(
        &self,
        user_id: &str,
        application_name: &str,
    ) -> Result<Option<ApplicationRecord>> {
        self.application_store
            .get_application(user_id, application_name)
            .await
    }

    async fn get_application_by_consumer_key(
        &self,
        consumer_key: &str,
    ) -> Result<Option<ApplicationRecord>> {
        self.application_store
            .get_application_by_consumer_key(consumer_key)
            .await
    }

    async fn clear_credentials(&self, consumer_key: &str) -> Result<()> {
        self.application_store.clear_credentials(consumer_key).await
    }

    async fn merge_allowed_domains(
        &self,
        consumer_key: &str,
        domains: &[String],
    ) -> Result<Vec<String>> {
        self.application_store
            .merge_allowed_domains(consumer_key, domains)
            .await
    }
}

#[async_trait]
impl TokenStore for SqliteRegistryStorage {
    async fn record_token(&self, info: &AccessTokenInfo) -> Result<()> {
        self.token_store.record_token(info).await
    }

    async fn get_token(&self, access_token: &str) -> Result<Option<AccessTokenInfo>> {
        self.token_store.get_token(access_token).await
    }

    async fn token_exists(&self, access_token: &str) -> Result<bool> {
        self.token_store.token_exists(access_token).await
    }

    async fn replace_token(&self, old_access_token: &str, info: &AccessTokenInfo) -> Result<()> {
        self.token_store.replace_token(old_access_token, info).await
    }

    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()> {
        self.token_store
            .update_token_domains(access_token, domains)
            .await
    }

    async fn remove_token(&self, access_token: &str) -> Result<()> {
        self.token_store.remove_token(access_token).await
    }
}

#[async_trait]
impl AuditStore for SqliteRegistryStorage {
    async fn record_event(&self, event: &AuditEvent) -> Result<()> {
        self.audit_store.record_event(event).await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        self.audit_store.recent_events(limit).await
    }
}

impl RegistryStorage for SqliteRegistryStorage {}
