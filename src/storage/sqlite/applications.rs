//! SQLite implementation for application record storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::str::FromStr;

use super::attempts::{deserialize_json, phase_to_string, serialize_json, string_to_phase};
use crate::errors::StorageError;
use crate::registry::types::{ApplicationRecord, TokenType};
use crate::storage::traits::{ApplicationStore, Result};

/// SQLite implementation of application record storage
pub struct SqliteApplicationStore {
    pool: SqlitePool,
}

impl SqliteApplicationStore {
    /// Create a new SQLite application store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_application(row: &SqliteRow) -> Result<ApplicationRecord> {
        let token_type: String = row.get("token_type");
        let status: String = row.get("status");
        let allowed_domains: String = row.get("allowed_domains");
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        Ok(ApplicationRecord {
            user_id: row.get("user_id"),
            application_name: row.get("application_name"),
            token_type: TokenType::from_str(&token_type)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?,
            status: string_to_phase(&status)?,
            consumer_key: row.get("consumer_key"),
            consumer_secret: row.get("consumer_secret"),
            callback_url: row.get("callback_url"),
            allowed_domains: deserialize_json(&allowed_domains)?,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl ApplicationStore for SqliteApplicationStore {
    async fn upsert_application(&self, application: &ApplicationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (
                user_id, application_name, token_type, status,
                consumer_key, consumer_secret, callback_url, allowed_domains,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, application_name) DO UPDATE SET
                token_type = excluded.token_type,
                status = excluded.status,
                consumer_key = excluded.consumer_key,
                consumer_secret = excluded.consumer_secret,
                callback_url = excluded.callback_url,
                allowed_domains = excluded.allowed_domains,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&application.user_id)
        .bind(&application.application_name)
        .bind(application.token_type.to_string())
        .bind(phase_to_string(&application.status))
        .bind(&application.consumer_key)
        .bind(&application.consumer_secret)
        .bind(&application.callback_url)
        .bind(serialize_json(&application.allowed_domains)?)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to upsert application: {}", e)))?;
        Ok(())
    }

    async fn get_application(
        &self,
        user_id: &str,
        application_name: &str,
    ) -> Result<Option<ApplicationRecord>> {
        let row =
            sqlx::query("SELECT * FROM applications WHERE user_id = ? AND application_name = ?")
                .bind(user_id)
                .bind(application_name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    StorageError::QueryFailed(format!("Failed to get application: {}", e))
                })?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_application_by_consumer_key(
        &self,
        consumer_key: &str,
    ) -> Result<Option<ApplicationRecord>> {
        let row = sqlx::query("SELECT * FROM applications WHERE consumer_key = ?")
            .bind(consumer_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to get application: {}", e)))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    async fn clear_credentials(&self, consumer_key: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET consumer_key = NULL, consumer_secret = NULL, updated_at = ? WHERE consumer_key = ?",
        )
        .bind(Utc::now())
        .bind(consumer_key)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to clear credentials: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "No application holds consumer key {}",
                consumer_key
            )));
        }
        Ok(())
    }

    async fn merge_allowed_domains(
        &self,
        consumer_key: &str,
        domains: &[String],
    ) -> Result<Vec<String>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query("SELECT allowed_domains FROM applications WHERE consumer_key = ?")
            .bind(consumer_key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to read domains: {}", e)))?
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "No application holds consumer key {}",
                    consumer_key
                ))
            })?;

        let stored: String = row.get("allowed_domains");
        let mut merged: Vec<String> = deserialize_json(&stored)?;
        for domain in domains {
            if !merged.contains(domain) {
                merged.push(domain.clone());
            }
        }

        sqlx::query(
            "UPDATE applications SET allowed_domains = ?, updated_at = ? WHERE consumer_key = ?",
        )
        .bind(serialize_json(&merged)?)
        .bind(Utc::now())
        .bind(consumer_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to write domains: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to commit: {}", e)))?;
        Ok(merged)
    }
}
