//! SQLite implementation for registration attempt storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::registry::types::{
    AccessTokenInfo, AttemptKey, ClientCredentials, RegistrationAttempt, RegistrationPhase,
    TokenType, TokenValidity,
};
use crate::storage::traits::{ClaimOutcome, RegistrationAttemptStore, Result};

/// SQLite implementation of registration attempt storage.
///
/// Live-attempt exclusivity comes from a partial unique index on
/// `storage_key WHERE abandoned = 0`; claims use `INSERT OR IGNORE` and
/// phase transitions guard the `UPDATE` with the expected phase, so both
/// are single-statement compare-and-set operations.
pub struct SqliteAttemptStore {
    pool: SqlitePool,
}

pub(super) fn phase_to_string(phase: &RegistrationPhase) -> &'static str {
    match phase {
        RegistrationPhase::Requested => "REQUESTED",
        RegistrationPhase::ClientCreated => "CLIENT_CREATED",
        RegistrationPhase::TokenIssued => "TOKEN_ISSUED",
        RegistrationPhase::Completed => "COMPLETED",
        RegistrationPhase::Failed => "FAILED",
    }
}

pub(super) fn string_to_phase(s: &str) -> Result<RegistrationPhase> {
    match s {
        "REQUESTED" => Ok(RegistrationPhase::Requested),
        "CLIENT_CREATED" => Ok(RegistrationPhase::ClientCreated),
        "TOKEN_ISSUED" => Ok(RegistrationPhase::TokenIssued),
        "COMPLETED" => Ok(RegistrationPhase::Completed),
        "FAILED" => Ok(RegistrationPhase::Failed),
        _ => Err(StorageError::InvalidData(format!("Unknown phase: {}", s))),
    }
}

pub(super) fn serialize_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

pub(super) fn deserialize_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

impl SqliteAttemptStore {
    /// Create a new SQLite attempt store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attempt(row: &SqliteRow) -> Result<RegistrationAttempt> {
        let attempt_id: String = row.get("attempt_id");
        let user_id: String = row.get("user_id");
        let application_name: String = row.get("application_name");
        let token_type: String = row.get("token_type");
        let phase: String = row.get("phase");
        let resume_from: String = row.get("resume_from");
        let credentials: Option<String> = row.get("credentials");
        let token: Option<String> = row.get("token");
        let callback_url: Option<String> = row.get("callback_url");
        let allowed_domains: String = row.get("allowed_domains");
        let validity: String = row.get("validity");
        let provisioning: String = row.get("provisioning");
        let creation_outcome_unknown: bool = row.get("creation_outcome_unknown");
        let failure: Option<String> = row.get("failure");
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        let token_type = TokenType::from_str(&token_type)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let credentials: Option<ClientCredentials> = credentials
            .as_deref()
            .map(deserialize_json)
            .transpose()?;
        let token: Option<AccessTokenInfo> = token.as_deref().map(deserialize_json).transpose()?;
        let validity: TokenValidity = deserialize_json(&validity)?;

        Ok(RegistrationAttempt {
            attempt_id: Uuid::parse_str(&attempt_id)
                .map_err(|e| StorageError::InvalidData(format!("Bad attempt id: {}", e)))?,
            key: AttemptKey {
                user_id,
                application_name,
                token_type,
            },
            phase: string_to_phase(&phase)?,
            resume_from: string_to_phase(&resume_from)?,
            credentials,
            token,
            callback_url,
            allowed_domains: deserialize_json(&allowed_domains)?,
            validity,
            provisioning: deserialize_json(&provisioning)?,
            creation_outcome_unknown,
            failure,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl RegistrationAttemptStore for SqliteAttemptStore {
    async fn claim_attempt(&self, attempt: &RegistrationAttempt) -> Result<ClaimOutcome> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO registration_attempts (
                storage_key, attempt_id, user_id, application_name, token_type,
                phase, resume_from, credentials, token, callback_url,
                allowed_domains, validity, provisioning,
                creation_outcome_unknown, failure, abandoned, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(attempt.key.storage_key())
        .bind(attempt.attempt_id.to_string())
        .bind(&attempt.key.user_id)
        .bind(&attempt.key.application_name)
        .bind(attempt.key.token_type.to_string())
        .bind(phase_to_string(&attempt.phase))
        .bind(phase_to_string(&attempt.resume_from))
        .bind(
            attempt
                .credentials
                .as_ref()
                .map(serialize_json)
                .transpose()?,
        )
        .bind(attempt.token.as_ref().map(serialize_json).transpose()?)
        .bind(&attempt.callback_url)
        .bind(serialize_json(&attempt.allowed_domains)?)
        .bind(serialize_json(&attempt.validity)?)
        .bind(serialize_json(&attempt.provisioning)?)
        .bind(attempt.creation_outcome_unknown)
        .bind(&attempt.failure)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to claim attempt: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        // Lost the claim; surface the existing live attempt
        match self.get_attempt(&attempt.key).await? {
            Some(existing) => Ok(ClaimOutcome::Existing(existing)),
            None => Err(StorageError::QueryFailed(format!(
                "Claim for {} lost but no live attempt found",
                attempt.key
            ))),
        }
    }

    async fn get_attempt(&self, key: &AttemptKey) -> Result<Option<RegistrationAttempt>> {
        let row = sqlx::query(
            "SELECT * FROM registration_attempts WHERE storage_key = ? AND abandoned = 0",
        )
        .bind(key.storage_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to get attempt: {}", e)))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_attempt(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_attempt(
        &self,
        attempt: &RegistrationAttempt,
        expected_phase: RegistrationPhase,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE registration_attempts SET
                phase = ?, resume_from = ?, credentials = ?, token = ?,
                creation_outcome_unknown = ?, failure = ?, updated_at = ?
            WHERE storage_key = ? AND abandoned = 0 AND phase = ?
            "#,
        )
        .bind(phase_to_string(&attempt.phase))
        .bind(phase_to_string(&attempt.resume_from))
        .bind(
            attempt
                .credentials
                .as_ref()
                .map(serialize_json)
                .transpose()?,
        )
        .bind(attempt.token.as_ref().map(serialize_json).transpose()?)
        .bind(attempt.creation_outcome_unknown)
        .bind(&attempt.failure)
        .bind(attempt.updated_at)
        .bind(attempt.key.storage_key())
        .bind(phase_to_string(&expected_phase))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to update attempt: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish a lost race from a missing record
        match self.get_attempt(&attempt.key).await? {
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound(format!(
                "No attempt for {}",
                attempt.key
            ))),
        }
    }

    async fn abandon_attempt(&self, key: &AttemptKey) -> Result<()> {
        let result = sqlx::query(
            "UPDATE registration_attempts SET abandoned = 1, updated_at = ? WHERE storage_key = ? AND abandoned = 0",
        )
        .bind(Utc::now())
        .bind(key.storage_key())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to abandon attempt: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("No attempt for {}", key)));
        }
        Ok(())
    }
}
