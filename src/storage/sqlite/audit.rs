//! SQLite implementation for the lifecycle audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use crate::errors::StorageError;
use crate::registry::types::{AuditEvent, AuditKind};
use crate::storage::traits::{AuditStore, Result};

/// SQLite implementation of the audit trail
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

fn kind_to_string(kind: &AuditKind) -> &'static str {
    match kind {
        AuditKind::TokenRenewed => "token_renewed",
        AuditKind::DomainsAdded => "domains_added",
        AuditKind::DomainsUpdated => "domains_updated",
        AuditKind::ClientDeleted => "client_deleted",
        AuditKind::AttemptAbandoned => "attempt_abandoned",
    }
}

fn string_to_kind(s: &str) -> Result<AuditKind> {
    match s {
        "token_renewed" => Ok(AuditKind::TokenRenewed),
        "domains_added" => Ok(AuditKind::DomainsAdded),
        "domains_updated" => Ok(AuditKind::DomainsUpdated),
        "client_deleted" => Ok(AuditKind::ClientDeleted),
        "attempt_abandoned" => Ok(AuditKind::AttemptAbandoned),
        _ => Err(StorageError::InvalidData(format!(
            "Unknown audit kind: {}",
            s
        ))),
    }
}

impl SqliteAuditStore {
    /// Create a new SQLite audit store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn record_event(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query("INSERT INTO audit_events (kind, subject, detail, at) VALUES (?, ?, ?, ?)")
            .bind(kind_to_string(&event.kind))
            .bind(&event.subject)
            .bind(&event.detail)
            .bind(event.at)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to record event: {}", e)))?;
        Ok(())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query("SELECT * FROM audit_events ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to list events: {}", e)))?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let at: DateTime<Utc> = row.get("at");
                Ok(AuditEvent {
                    kind: string_to_kind(&kind)?,
                    subject: row.get("subject"),
                    detail: row.get("detail"),
                    at,
                })
            })
            .collect()
    }
}
