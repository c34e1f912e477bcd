//! Core registration data model: attempts, credentials, tokens, and audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::RegistryError;

/// Token environments an application can be keyed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Production,
    Sandbox,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Production => write!(f, "PRODUCTION"),
            TokenType::Sandbox => write!(f, "SANDBOX"),
        }
    }
}

impl FromStr for TokenType {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "PRODUCTION" => Ok(TokenType::Production),
            "SANDBOX" => Ok(TokenType::Sandbox),
            other => Err(RegistryError::InvalidRequest(format!(
                "Unknown token type '{}', expected PRODUCTION or SANDBOX",
                other
            ))),
        }
    }
}

/// Requested token validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenValidity {
    /// Let the key manager apply its configured default
    KeyManagerDefault,
    /// Explicit validity period in seconds
    Seconds(u64),
}

impl Default for TokenValidity {
    fn default() -> Self {
        TokenValidity::KeyManagerDefault
    }
}

impl TokenValidity {
    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            TokenValidity::KeyManagerDefault => None,
            TokenValidity::Seconds(seconds) => Some(*seconds),
        }
    }
}

/// Unique key of one registration workflow within a tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptKey {
    /// Owning subscriber
    pub user_id: String,
    /// Application name, unique per subscriber
    pub application_name: String,
    /// Environment the credentials are provisioned for
    pub token_type: TokenType,
}

impl AttemptKey {
    pub fn new(user_id: &str, application_name: &str, token_type: TokenType) -> Self {
        Self {
            user_id: user_id.to_string(),
            application_name: application_name.to_string(),
            token_type,
        }
    }

    /// Composite storage key
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.user_id, self.application_name, self.token_type)
    }

    /// Deterministic client name registered at the key manager.
    ///
    /// The resume path relies on this to find a client whose creation
    /// outcome was lost to a timeout.
    pub fn client_name(&self) -> String {
        format!("{}_{}_{}", self.user_id, self.application_name, self.token_type)
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Workflow phases of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationPhase {
    Requested,
    ClientCreated,
    TokenIssued,
    Completed,
    Failed,
}

impl fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegistrationPhase::Requested => "REQUESTED",
            RegistrationPhase::ClientCreated => "CLIENT_CREATED",
            RegistrationPhase::TokenIssued => "TOKEN_ISSUED",
            RegistrationPhase::Completed => "COMPLETED",
            RegistrationPhase::Failed => "FAILED",
        };
        write!(f, "{}", label)
    }
}

/// OAuth client credentials returned by the key manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Consumer key
    pub client_id: String,
    /// Consumer secret
    pub client_secret: String,
}

/// Access token details as recorded after issuance or renewal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenInfo {
    /// The access token
    pub access_token: String,
    /// Client the token is bound to
    pub client_id: String,
    /// Origins permitted to use this token
    pub allowed_domains: Vec<String>,
    /// Validity the token was issued with
    pub validity: TokenValidity,
    /// Issuance or most recent renewal timestamp
    pub issued_at: DateTime<Utc>,
}

/// Durable record of one application's registration workflow.
///
/// Retained after completion and after abandonment as an audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationAttempt {
    /// Unique id of this attempt record
    pub attempt_id: Uuid,
    /// Workflow key
    pub key: AttemptKey,
    /// Current phase
    pub phase: RegistrationPhase,
    /// Last successfully completed phase; the resume point when `phase` is FAILED
    pub resume_from: RegistrationPhase,
    /// Client credentials once CLIENT_CREATED has been reached
    pub credentials: Option<ClientCredentials>,
    /// Issued token once TOKEN_ISSUED has been reached
    pub token: Option<AccessTokenInfo>,
    /// Callback URL requested for the application
    pub callback_url: Option<String>,
    /// Allowed domains requested for the token
    pub allowed_domains: Vec<String>,
    /// Requested token validity
    pub validity: TokenValidity,
    /// Opaque provisioning payload passed through to the key manager
    pub provisioning: serde_json::Value,
    /// Set when a create-client call timed out with no confirmed response;
    /// the resume path must query the key manager before creating a client
    pub creation_outcome_unknown: bool,
    /// Failure message for FAILED attempts
    pub failure: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl RegistrationAttempt {
    /// Start a fresh REQUESTED attempt for a key
    pub fn new(request: &RegistrationRequest) -> Self {
        let now = Utc::now();
        Self {
            attempt_id: Uuid::new_v4(),
            key: request.key.clone(),
            phase: RegistrationPhase::Requested,
            resume_from: RegistrationPhase::Requested,
            credentials: None,
            token: None,
            callback_url: request.callback_url.clone(),
            allowed_domains: request.allowed_domains.clone(),
            validity: request.validity,
            provisioning: request.provisioning.clone(),
            creation_outcome_unknown: false,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Inputs to a registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    /// Workflow key
    pub key: AttemptKey,
    /// Callback URL for the application
    pub callback_url: Option<String>,
    /// Origins the issued token is restricted to
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Requested token validity
    #[serde(default)]
    pub validity: TokenValidity,
    /// Opaque key manager parameters, passed through verbatim
    #[serde(default)]
    pub provisioning: serde_json::Value,
}

impl RegistrationRequest {
    /// Registration request without extra key manager parameters
    pub fn new(key: AttemptKey) -> Self {
        Self {
            key,
            callback_url: None,
            allowed_domains: Vec::new(),
            validity: TokenValidity::KeyManagerDefault,
            provisioning: serde_json::Value::Null,
        }
    }
}

/// Caller-visible status of a registration workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Client and token both provisioned
    Completed,
    /// Another caller holds the workflow, or it has not finished yet
    InProgress,
    /// The workflow stopped mid-sequence and can be resumed
    Failed,
}

/// Result of a registration or resume operation
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResult {
    /// Workflow key
    pub key: AttemptKey,
    /// Overall status
    pub status: RegistrationStatus,
    /// Phase the attempt record is in
    pub phase: RegistrationPhase,
    /// Provisioned credentials, if any
    pub credentials: Option<ClientCredentials>,
    /// Issued token, if any
    pub token: Option<AccessTokenInfo>,
    /// Failure message for failed attempts
    pub failure: Option<String>,
}

impl RegistrationResult {
    /// Project an attempt record into its caller-visible form
    pub fn from_attempt(attempt: &RegistrationAttempt) -> Self {
        let status = match attempt.phase {
            RegistrationPhase::Completed => RegistrationStatus::Completed,
            RegistrationPhase::Failed => RegistrationStatus::Failed,
            _ => RegistrationStatus::InProgress,
        };
        Self {
            key: attempt.key.clone(),
            status,
            phase: attempt.phase,
            credentials: attempt.credentials.clone(),
            token: attempt.token.clone(),
            failure: attempt.failure.clone(),
        }
    }
}

/// Per-subscriber application record mirrored from completed registrations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Owning subscriber
    pub user_id: String,
    /// Application name, unique per subscriber
    pub application_name: String,
    /// Environment the application is keyed for
    pub token_type: TokenType,
    /// Lifecycle status, tracks the registration phase
    pub status: RegistrationPhase,
    /// Consumer key, populated once provisioned
    pub consumer_key: Option<String>,
    /// Consumer secret, populated once provisioned
    pub consumer_secret: Option<String>,
    /// Callback URL
    pub callback_url: Option<String>,
    /// Allowed origin domains
    pub allowed_domains: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Kinds of state-store audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    TokenRenewed,
    DomainsAdded,
    DomainsUpdated,
    ClientDeleted,
    AttemptAbandoned,
}

/// Audit trail entry written alongside lifecycle operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event kind
    pub kind: AuditKind,
    /// Consumer key, token, or workflow key the event concerns
    pub subject: String,
    /// Free-form detail
    pub detail: String,
    /// Event timestamp
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, subject: &str, detail: &str) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            detail: detail.to_string(),
            at: Utc::now(),
        }
    }
}
