//! Standardized error types following the `error-keymint-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-keymint-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-keymint-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-keymint-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-keymint-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a base URL cannot be parsed
    #[error("error-keymint-config-5 Failed to parse URL '{0}': {1}")]
    UrlParsingFailed(String, String),

    /// Error when token validity cannot be parsed
    #[error("error-keymint-config-6 Failed to parse token validity '{0}': expected 'default' or a duration")]
    ValidityParsingFailed(String),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-keymint-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-keymint-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-keymint-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when data validation fails
    #[error("error-keymint-storage-4 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-keymint-storage-5 Not found: {0}")]
    NotFound(String),
}

/// Key manager adapter errors, split by retryability
#[derive(Debug, Error)]
pub enum KeyManagerError {
    /// Timeout, connection refused, or a 5xx from the authorization server
    #[error("error-keymint-keymanager-1 Transient key manager failure: {0}")]
    Transient(String),

    /// The authorization server explicitly rejected the request
    #[error("error-keymint-keymanager-2 Key manager rejected request: {0}")]
    Rejected(String),

    /// The authorization server returned a payload the adapter cannot read
    #[error("error-keymint-keymanager-3 Unexpected key manager response: {0}")]
    Protocol(String),
}

impl KeyManagerError {
    /// Whether retrying the same call (or resuming the workflow) is safe
    pub fn is_transient(&self) -> bool {
        matches!(self, KeyManagerError::Transient(_))
    }
}

/// Management errors surfaced to callers of the registration core.
///
/// Single checked error kind per operation; adapters translate their own
/// failures into this taxonomy before it reaches a caller.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Bad token type, empty identifiers, or a reference to nothing
    #[error("error-keymint-registry-1 Invalid request: {0}")]
    InvalidRequest(String),

    /// The workflow is not in a phase that permits the operation
    #[error("error-keymint-registry-2 Invalid registration state: {0}")]
    InvalidState(String),

    /// Timeout or connection failure against a backend; safe to retry
    #[error("error-keymint-registry-3 Transient backend failure: {0}")]
    TransientBackend(String),

    /// The authorization server rejected the request; not auto-retried
    #[error("error-keymint-registry-4 Backend rejected request: {0}")]
    BackendRejected(String),

    /// Local store and key manager disagree; needs operator reconciliation
    #[error("error-keymint-registry-5 Inconsistent state, reconciliation required: {0}")]
    Inconsistent(String),
}

impl From<KeyManagerError> for RegistryError {
    fn from(err: KeyManagerError) -> Self {
        match err {
            KeyManagerError::Transient(msg) => RegistryError::TransientBackend(msg),
            KeyManagerError::Rejected(msg) => RegistryError::BackendRejected(msg),
            KeyManagerError::Protocol(msg) => RegistryError::BackendRejected(msg),
        }
    }
}

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => RegistryError::InvalidRequest(msg),
            other => RegistryError::TransientBackend(other.to_string()),
        }
    }
}
