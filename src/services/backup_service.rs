//! Domain service for backup and restore of the data store.
//!
//! Backups are zip archives bundling the database, the field-cipher key
//! material and a manifest. Restores are gated: a system admin needs a
//! one-time restore code bound to both their identity and the exact archive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("No permission for this backup operation")]
    PermissionDenied,

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("A restore code is required")]
    RestoreCodeRequired,

    /// Unknown, already-used, wrong-admin and wrong-backup codes all
    /// collapse to this so the error cannot be used to probe codes.
    #[error("Restore code rejected")]
    RestoreCodeRejected,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for BackupError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Manifest written into every archive as `backup_info.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub version: String,
    pub created_at: String,
    pub created_by: String,
    pub source_size_bytes: u64,
}

/// Listing entry for one archive on disk.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub created_by: String,
    pub created_at: String,
    pub version: String,
}

/// Domain service trait for backup/restore orchestration.
#[async_trait::async_trait]
pub trait BackupService: Send + Sync {
    /// Snapshots the live database and key material into a fresh archive and
    /// returns its file name. Optional members (salt file) are skipped when
    /// absent.
    async fn create_backup(&self, actor: &str) -> Result<String, BackupError>;

    /// Lists archives newest first; unreadable manifests degrade to
    /// placeholder metadata instead of aborting the listing.
    async fn list_backups(&self) -> Result<Vec<BackupInfo>, BackupError>;

    /// Restores an archive over the live state.
    ///
    /// Authorization gates (each failure logged with its own reason):
    /// non-super-admins must present a restore code that resolves, is bound
    /// to them, and is bound to this archive. On success the current state
    /// is snapshotted first so the restore itself is undoable, then the code
    /// is consumed.
    ///
    /// The process should be restarted after a successful restore so every
    /// connection sees the restored database.
    async fn restore_backup(
        &self,
        backup_name: &str,
        actor: &str,
        restore_code: Option<&str>,
        is_super_admin: bool,
    ) -> Result<(), BackupError>;

    /// Deletes an archive; highest privilege tier only.
    async fn delete_backup(
        &self,
        backup_name: &str,
        actor: &str,
        actor_role: crate::domain::Role,
    ) -> Result<(), BackupError>;

    /// Checks archive integrity and the presence of the database member.
    async fn verify_backup(&self, backup_name: &str) -> Result<bool, BackupError>;

    /// Deletes all but the configured number of most recent archives,
    /// returning how many were removed.
    async fn prune_backups(&self, actor: &str) -> Result<usize, BackupError>;
}
