use std::sync::Arc;

use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::crypto::FieldCipher;
use crate::entities::{audit_log, prelude::*};

/// A decrypted audit entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: String,
    pub actor: String,
    pub description: String,
    pub details: String,
    pub suspicious: bool,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
    cipher: Arc<FieldCipher>,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, cipher: Arc<FieldCipher>) -> Self {
        Self { conn, cipher }
    }

    /// Appends one entry. Description and details are encrypted
    /// independently; entries are immutable once written.
    pub async fn append(
        &self,
        description: &str,
        actor: &str,
        details: &str,
        suspicious: bool,
    ) -> Result<()> {
        let details = if details.is_empty() {
            None
        } else {
            Some(self.cipher.encrypt(details)?)
        };

        let active = audit_log::ActiveModel {
            timestamp: Set(chrono::Utc::now().to_rfc3339()),
            actor: Set(actor.to_string()),
            description: Set(self.cipher.encrypt(description)?),
            details: Set(details),
            suspicious: Set(suspicious),
            ..Default::default()
        };

        AuditLog::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to append audit entry")?;

        Ok(())
    }

    /// All entries, newest first. Reading never mutates flags or order;
    /// undecryptable fields degrade to their stored value.
    pub async fn read_all(&self) -> Result<Vec<LogEntry>> {
        let rows = AuditLog::find()
            .order_by_desc(audit_log::Column::Timestamp)
            .order_by_desc(audit_log::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to read audit log")?;

        Ok(rows.into_iter().map(|row| self.to_entry(row)).collect())
    }

    /// Entries flagged suspicious at write time, newest first.
    pub async fn read_suspicious(&self) -> Result<Vec<LogEntry>> {
        let rows = AuditLog::find()
            .filter(audit_log::Column::Suspicious.eq(true))
            .order_by_desc(audit_log::Column::Timestamp)
            .order_by_desc(audit_log::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to read suspicious audit entries")?;

        Ok(rows.into_iter().map(|row| self.to_entry(row)).collect())
    }

    fn to_entry(&self, row: audit_log::Model) -> LogEntry {
        LogEntry {
            id: row.id,
            timestamp: row.timestamp,
            actor: row.actor,
            description: self.cipher.decrypt_lossy(&row.description),
            details: row
                .details
                .map(|d| self.cipher.decrypt_lossy(&d))
                .unwrap_or_default(),
            suspicious: row.suspicious,
        }
    }
}
