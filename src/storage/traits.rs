//! Storage trait definitions for registration state.
//!
//! Defines async storage interfaces for registration attempts, application
//! records, issued tokens, and the audit trail that can be implemented by
//! various backend providers.

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::registry::types::{
    AccessTokenInfo, ApplicationRecord, AttemptKey, AuditEvent, RegistrationAttempt,
    RegistrationPhase,
};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Outcome of claiming a registration key
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The key was free; the caller now owns the workflow
    Claimed,
    /// A live attempt already exists for the key
    Existing(RegistrationAttempt),
}

/// Trait for storing registration attempt records.
///
/// All phase transitions for one key are serialized through the
/// compare-and-set semantics of [`claim_attempt`](Self::claim_attempt) and
/// [`update_attempt`](Self::update_attempt); two writers racing on the same
/// key cannot both win.
#[async_trait]
pub trait RegistrationAttemptStore {
    /// Atomically insert an attempt if no live attempt exists for its key.
    ///
    /// Completed and failed attempts count as live until explicitly
    /// abandoned; only abandonment frees the key for a new attempt.
    async fn claim_attempt(&self, attempt: &RegistrationAttempt) -> Result<ClaimOutcome>;

    /// Get the live attempt for a key
    async fn get_attempt(&self, key: &AttemptKey) -> Result<Option<RegistrationAttempt>>;

    /// Compare-and-set update: writes `attempt` only if the stored record
    /// is still in `expected_phase`. Returns false on a lost race.
    async fn update_attempt(
        &self,
        attempt: &RegistrationAttempt,
        expected_phase: RegistrationPhase,
    ) -> Result<bool>;

    /// Archive the live attempt for a key, freeing the key for a new
    /// workflow. The record is retained for audit, not deleted.
    async fn abandon_attempt(&self, key: &AttemptKey) -> Result<()>;
}

/// Trait for storing per-subscriber application records
#[async_trait]
pub trait ApplicationStore {
    /// Insert or replace an application record
    async fn upsert_application(&self, application: &ApplicationRecord) -> Result<()>;

    /// Get an application by owner and name
    async fn get_application(
        &self,
        user_id: &str,
        application_name: &str,
    ) -> Result<Option<ApplicationRecord>>;

    /// Get an application by its provisioned consumer key
    async fn get_application_by_consumer_key(
        &self,
        consumer_key: &str,
    ) -> Result<Option<ApplicationRecord>>;

    /// Clear provisioned credentials from the application owning a
    /// consumer key. Fails with `NotFound` when no application holds it.
    async fn clear_credentials(&self, consumer_key: &str) -> Result<()>;

    /// Merge domains into an application's allowed set, ignoring
    /// duplicates. Returns the resulting set.
    async fn merge_allowed_domains(
        &self,
        consumer_key: &str,
        domains: &[String],
    ) -> Result<Vec<String>>;
}

/// Trait for recording issued access tokens
#[async_trait]
pub trait TokenStore {
    /// Record a newly issued token
    async fn record_token(&self, info: &AccessTokenInfo) -> Result<()>;

    /// Get a recorded token
    async fn get_token(&self, access_token: &str) -> Result<Option<AccessTokenInfo>>;

    /// Whether a token is recorded
    async fn token_exists(&self, access_token: &str) -> Result<bool>;

    /// Replace a renewed token: removes the old record and inserts the new
    /// one in a single step.
    async fn replace_token(&self, old_access_token: &str, info: &AccessTokenInfo) -> Result<()>;

    /// Rebind a recorded token's allowed domains
    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()>;

    /// Remove a token record
    async fn remove_token(&self, access_token: &str) -> Result<()>;
}

/// Trait for the lifecycle audit trail
#[async_trait]
pub trait AuditStore {
    /// Append an audit event
    async fn record_event(&self, event: &AuditEvent) -> Result<()>;

    /// Most recent events, newest first
    async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>>;
}

/// Combined registration state store
pub trait RegistryStorage:
    RegistrationAttemptStore + ApplicationStore + TokenStore + AuditStore + Send + Sync
{
}
