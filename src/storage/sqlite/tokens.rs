//! SQLite implementation for issued token storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::attempts::{deserialize_json, serialize_json};
use crate::errors::StorageError;
use crate::registry::types::{AccessTokenInfo, TokenValidity};
use crate::storage::traits::{Result, TokenStore};

/// SQLite implementation of issued token storage
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Create a new SQLite token store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: &SqliteRow) -> Result<AccessTokenInfo> {
        let allowed_domains: String = row.get("allowed_domains");
        let validity: String = row.get("validity");
        let issued_at: DateTime<Utc> = row.get("issued_at");
        let validity: TokenValidity = deserialize_json(&validity)?;

        Ok(AccessTokenInfo {
            access_token: row.get("access_token"),
            client_id: row.get("client_id"),
            allowed_domains: deserialize_json(&allowed_domains)?,
            validity,
            issued_at,
        })
    }

    async fn insert_token<'e, E>(executor: E, info: &AccessTokenInfo) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO access_tokens (
                access_token, client_id, allowed_domains, validity, issued_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&info.access_token)
        .bind(&info.client_id)
        .bind(serialize_json(&info.allowed_domains)?)
        .bind(serialize_json(&info.validity)?)
        .bind(info.issued_at)
        .execute(executor)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to record token: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn record_token(&self, info: &AccessTokenInfo) -> Result<()> {
        Self::insert_token(&self.pool, info).await
    }

    async fn get_token(&self, access_token: &str) -> Result<Option<AccessTokenInfo>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE access_token = ?")
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to get token: {}", e)))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_token(&row)?)),
            None => Ok(None),
        }
    }

    async fn token_exists(&self, access_token: &str) -> Result<bool> {
        Ok(self.get_token(access_token).await?.is_some())
    }

    async fn replace_token(&self, old_access_token: &str, info: &AccessTokenInfo) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM access_tokens WHERE access_token = ?")
            .bind(old_access_token)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to remove old token: {}", e)))?;

        Self::insert_token(&mut *tx, info).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn update_token_domains(&self, access_token: &str, domains: &[String]) -> Result<()> {
        let result = sqlx::query(
            "UPDATE access_tokens SET allowed_domains = ? WHERE access_token = ?",
        )
        .bind(serialize_json(&domains.to_vec())?)
        .bind(access_token)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to update domains: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "No recorded token {}",
                access_token
            )));
        }
        Ok(())
    }

    async fn remove_token(&self, access_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE access_token = ?")
            .bind(access_token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to remove token: {}", e)))?;
        Ok(())
    }
}
