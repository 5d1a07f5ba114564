//! Filesystem implementation of the `BackupService` trait.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::task;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::db::Store;
use crate::domain::Role;
use crate::services::backup_service::{BackupError, BackupInfo, BackupManifest, BackupService};

/// Archive member names are fixed so restores are independent of how the
/// live paths are configured.
const DB_ENTRY: &str = "data.db";
const KEY_ENTRY: &str = "field.key";
const SALT_ENTRY: &str = "field.salt";
const MANIFEST_ENTRY: &str = "backup_info.json";

pub struct FsBackupService {
    store: Store,
    db_path: PathBuf,
    key_path: PathBuf,
    salt_path: PathBuf,
    backup_dir: PathBuf,
    keep_count: usize,
}

impl FsBackupService {
    #[must_use]
    pub fn new(store: Store, config: &Config, cipher: &FieldCipher) -> Self {
        let db_path = PathBuf::from(
            config
                .general
                .database_path
                .trim_start_matches("sqlite:"),
        );

        Self {
            store,
            db_path,
            key_path: cipher.key_path().to_path_buf(),
            salt_path: cipher.salt_path().to_path_buf(),
            backup_dir: PathBuf::from(&config.backup.backup_dir),
            keep_count: config.backup.keep_count,
        }
    }

    fn backup_path(&self, backup_name: &str) -> PathBuf {
        self.backup_dir.join(backup_name)
    }
}

#[async_trait]
impl BackupService for FsBackupService {
    async fn create_backup(&self, actor: &str) -> Result<String, BackupError> {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let mut backup_name = format!("backup_{stamp}.zip");
        // Second-resolution stamps can collide (e.g. the automatic safety
        // backup taken right before a restore); never overwrite an archive.
        let mut counter = 1;
        while self.backup_path(&backup_name).exists() {
            backup_name = format!("backup_{stamp}_{counter}.zip");
            counter += 1;
        }

        let archive_path = self.backup_path(&backup_name);
        let manifest = BackupManifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            created_by: actor.to_string(),
            source_size_bytes: fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0),
        };

        let db_path = self.db_path.clone();
        let key_path = self.key_path.clone();
        let salt_path = self.salt_path.clone();
        let backup_dir = self.backup_dir.clone();

        let written = task::spawn_blocking(move || {
            fs::create_dir_all(&backup_dir).context("Failed to create backup dir")?;
            write_archive(&archive_path, &db_path, &key_path, &salt_path, &manifest)
        })
        .await
        .map_err(|e| BackupError::Internal(format!("Backup task panicked: {e}")))?;

        match written {
            Ok(()) => {
                self.store
                    .log_event(
                        "Backup created",
                        actor,
                        &format!("Backup file: {backup_name}"),
                        false,
                    )
                    .await;
                Ok(backup_name)
            }
            Err(e) => {
                self.store
                    .log_event("Backup creation failed", actor, &format!("Error: {e}"), false)
                    .await;
                Err(e.into())
            }
        }
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let backup_dir = self.backup_dir.clone();

        let mut backups = task::spawn_blocking(move || list_archives(&backup_dir))
            .await
            .map_err(|e| BackupError::Internal(format!("Listing task panicked: {e}")))??;

        // Names embed the creation timestamp, so lexical order is
        // chronological.
        backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
        Ok(backups)
    }

    async fn restore_backup(
        &self,
        backup_name: &str,
        actor: &str,
        restore_code: Option<&str>,
        is_super_admin: bool,
    ) -> Result<(), BackupError> {
        let archive_path = self.backup_path(backup_name);
        if !archive_path.exists() {
            self.store
                .log_event(
                    "Restore failed - backup not found",
                    actor,
                    &format!("Backup: {backup_name}"),
                    false,
                )
                .await;
            return Err(BackupError::NotFound(backup_name.to_string()));
        }

        if !is_super_admin {
            let Some(code) = restore_code else {
                self.store
                    .log_event(
                        "Restore denied - no restore code",
                        actor,
                        &format!("Backup: {backup_name}"),
                        false,
                    )
                    .await;
                return Err(BackupError::RestoreCodeRequired);
            };

            let Some(code_info) = self.store.restore_codes().find_active(code).await? else {
                self.store
                    .log_event(
                        "Restore denied - invalid restore code",
                        actor,
                        &format!("Backup: {backup_name}"),
                        true,
                    )
                    .await;
                return Err(BackupError::RestoreCodeRejected);
            };

            if !code_info.admin_username.eq_ignore_ascii_case(actor) {
                // A valid code presented by the wrong identity smells like
                // credential misuse.
                self.store
                    .log_event(
                        "Restore denied - restore code issued to another admin",
                        actor,
                        &format!("Code issued to: {}", code_info.admin_username),
                        true,
                    )
                    .await;
                return Err(BackupError::RestoreCodeRejected);
            }

            if code_info.backup_name != backup_name {
                self.store
                    .log_event(
                        "Restore denied - restore code bound to another backup",
                        actor,
                        &format!("Code issued for: {}", code_info.backup_name),
                        false,
                    )
                    .await;
                return Err(BackupError::RestoreCodeRejected);
            }
        }

        // Snapshot the current state first so the restore is undoable.
        let safety_backup = self
            .create_backup(&format!("auto-pre-restore:{actor}"))
            .await?;

        let db_path = self.db_path.clone();
        let key_path = self.key_path.clone();
        let salt_path = self.salt_path.clone();
        let extract_path = archive_path.clone();

        let extracted = task::spawn_blocking(move || {
            extract_archive(&extract_path, &db_path, &key_path, &salt_path)
        })
        .await
        .map_err(|e| BackupError::Internal(format!("Restore task panicked: {e}")))?;

        if let Err(e) = extracted {
            self.store
                .log_event(
                    "Restore failed",
                    actor,
                    &format!("Backup: {backup_name}, error: {e}"),
                    false,
                )
                .await;
            return Err(e.into());
        }

        if !is_super_admin
            && let Some(code) = restore_code
        {
            self.store.restore_codes().mark_used(code).await?;
        }

        self.store
            .log_event(
                "Backup restored",
                actor,
                &format!("Backup: {backup_name}, safety backup: {safety_backup}"),
                false,
            )
            .await;

        Ok(())
    }

    async fn delete_backup(
        &self,
        backup_name: &str,
        actor: &str,
        actor_role: Role,
    ) -> Result<(), BackupError> {
        if actor_role != Role::SuperAdmin {
            self.store
                .log_event(
                    "Backup deletion denied",
                    actor,
                    &format!("Backup: {backup_name}"),
                    false,
                )
                .await;
            return Err(BackupError::PermissionDenied);
        }

        let archive_path = self.backup_path(backup_name);
        if !archive_path.exists() {
            return Err(BackupError::NotFound(backup_name.to_string()));
        }

        fs::remove_file(&archive_path)?;
        self.store
            .log_event(
                "Backup deleted",
                actor,
                &format!("Backup: {backup_name}"),
                false,
            )
            .await;

        Ok(())
    }

    async fn verify_backup(&self, backup_name: &str) -> Result<bool, BackupError> {
        let archive_path = self.backup_path(backup_name);
        if !archive_path.exists() {
            return Err(BackupError::NotFound(backup_name.to_string()));
        }

        let ok = task::spawn_blocking(move || archive_is_sound(&archive_path))
            .await
            .map_err(|e| BackupError::Internal(format!("Verification task panicked: {e}")))?;

        Ok(ok)
    }

    async fn prune_backups(&self, actor: &str) -> Result<usize, BackupError> {
        let backups = self.list_backups().await?;
        if backups.len() <= self.keep_count {
            return Ok(0);
        }

        let mut deleted = 0;
        for backup in &backups[self.keep_count..] {
            match fs::remove_file(self.backup_path(&backup.file_name)) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    self.store
                        .log_event(
                            "Backup prune failed for archive",
                            actor,
                            &format!("Backup: {}, error: {e}", backup.file_name),
                            false,
                        )
                        .await;
                }
            }
        }

        if deleted > 0 {
            self.store
                .log_event(
                    "Old backups pruned",
                    actor,
                    &format!("{deleted} removed, {} kept", self.keep_count),
                    false,
                )
                .await;
        }

        Ok(deleted)
    }
}

fn write_archive(
    archive_path: &Path,
    db_path: &Path,
    key_path: &Path,
    salt_path: &Path,
    manifest: &BackupManifest,
) -> Result<()> {
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut add_file = |entry: &str, path: &Path, required: bool| -> Result<()> {
        if !path.exists() {
            if required {
                return Err(anyhow!("Missing required file: {}", path.display()));
            }
            return Ok(());
        }
        let data =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        writer
            .start_file(entry, options)
            .with_context(|| format!("Failed starting archive member {entry}"))?;
        writer
            .write_all(&data)
            .with_context(|| format!("Failed writing archive member {entry}"))?;
        Ok(())
    };

    add_file(DB_ENTRY, db_path, true)?;
    add_file(KEY_ENTRY, key_path, true)?;
    add_file(SALT_ENTRY, salt_path, false)?;

    let manifest_bytes =
        serde_json::to_vec_pretty(manifest).context("Failed to serialize backup manifest")?;
    writer
        .start_file(MANIFEST_ENTRY, options)
        .context("Failed starting manifest member")?;
    writer
        .write_all(&manifest_bytes)
        .context("Failed writing manifest member")?;

    writer.finish().context("Failed finalizing archive")?;
    Ok(())
}

fn extract_archive(
    archive_path: &Path,
    db_path: &Path,
    key_path: &Path,
    salt_path: &Path,
) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).context("Failed to parse archive")?;

    let mut restore_member = |entry: &str, dest: &Path, required: bool| -> Result<()> {
        let mut member = match archive.by_name(entry) {
            Ok(member) => member,
            Err(zip::result::ZipError::FileNotFound) if !required => return Ok(()),
            Err(e) => return Err(anyhow!("Archive member {entry} unavailable: {e}")),
        };

        let mut data = Vec::new();
        member
            .read_to_end(&mut data)
            .with_context(|| format!("Failed reading archive member {entry}"))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(dest, data)
            .with_context(|| format!("Failed writing {} from backup", dest.display()))?;
        Ok(())
    };

    restore_member(DB_ENTRY, db_path, true)?;
    restore_member(KEY_ENTRY, key_path, false)?;
    restore_member(SALT_ENTRY, salt_path, false)?;

    Ok(())
}

fn list_archives(backup_dir: &Path) -> Result<Vec<BackupInfo>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir).context("Failed to read backup dir")? {
        let entry = entry.context("Failed to read backup dir entry")?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !(file_name.starts_with("backup_") && file_name.ends_with(".zip")) {
            continue;
        }

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let manifest = read_manifest(&entry.path());

        backups.push(BackupInfo {
            file_name,
            size_bytes,
            created_by: manifest
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |m| m.created_by.clone()),
            created_at: manifest
                .as_ref()
                .map_or_else(String::new, |m| m.created_at.clone()),
            version: manifest.map_or_else(String::new, |m| m.version),
        });
    }

    Ok(backups)
}

fn read_manifest(archive_path: &Path) -> Option<BackupManifest> {
    let file = File::open(archive_path).ok()?;
    let mut archive = ZipArchive::new(file).ok()?;
    let mut member = archive.by_name(MANIFEST_ENTRY).ok()?;
    let mut data = Vec::new();
    member.read_to_end(&mut data).ok()?;
    serde_json::from_slice(&data).ok()
}

fn archive_is_sound(archive_path: &Path) -> bool {
    let Ok(file) = File::open(archive_path) else {
        return false;
    };
    let Ok(mut archive) = ZipArchive::new(file) else {
        return false;
    };

    if archive.by_name(DB_ENTRY).is_err() {
        return false;
    }

    for index in 0..archive.len() {
        let Ok(mut member) = archive.by_index(index) else {
            return false;
        };
        let mut sink = Vec::new();
        if member.read_to_end(&mut sink).is_err() {
            return false;
        }
    }

    true
}
