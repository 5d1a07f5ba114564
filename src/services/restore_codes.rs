//! Broker for one-time restore codes.
//!
//! A code binds exactly one backup archive to exactly one system admin and
//! authorizes a single restore. Once consumed or revoked it is permanently
//! inert: lookup treats it the same as a code that never existed.

use thiserror::Error;

use crate::db::{RestoreCode, Store};
use crate::domain::{Capability, Role};

const CODE_LEN: usize = 12;
/// Unambiguous alphanumerics: no 0/O, 1/I/l pairs.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

#[derive(Debug, Error)]
pub enum RestoreCodeError {
    #[error("No permission to manage restore codes")]
    PermissionDenied,

    #[error("Target account is not a system admin")]
    UnknownAdmin,

    /// The freshly generated token already exists. Practically unreachable
    /// given the token space, but handled rather than assumed away.
    #[error("Generated code collided with an existing one, try again")]
    CodeCollision,

    #[error("No active restore code with that value")]
    UnknownCode,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for RestoreCodeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub struct RestoreCodeBroker {
    store: Store,
}

impl RestoreCodeBroker {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Issues a fresh code for `admin_username` bound to `backup_name`.
    ///
    /// The plaintext code is returned once for hand-off and never audited.
    pub async fn issue(
        &self,
        admin_username: &str,
        backup_name: &str,
        actor_role: Role,
    ) -> Result<String, RestoreCodeError> {
        if !actor_role.has_permission(Capability::GenerateRestoreCodes) {
            self.store
                .log_event(
                    "Restore code generation denied",
                    "",
                    &format!("For admin: {admin_username}"),
                    false,
                )
                .await;
            return Err(RestoreCodeError::PermissionDenied);
        }

        let admin = self
            .store
            .accounts()
            .get_by_username(admin_username)
            .await?;
        if !admin.is_some_and(|a| a.role == Role::SystemAdmin) {
            self.store
                .log_event(
                    "Restore code generation failed",
                    "",
                    &format!("{admin_username} is not a system admin"),
                    false,
                )
                .await;
            return Err(RestoreCodeError::UnknownAdmin);
        }

        let code = generate_code();
        let inserted = self
            .store
            .restore_codes()
            .insert(&code, admin_username, backup_name)
            .await?;
        if !inserted {
            return Err(RestoreCodeError::CodeCollision);
        }

        self.store
            .log_event(
                "Restore code generated",
                admin_username,
                &format!("Backup: {backup_name}"),
                false,
            )
            .await;

        Ok(code)
    }

    /// Resolves an active (unused) code. Used codes are indistinguishable
    /// from nonexistent ones.
    pub async fn lookup(&self, code: &str) -> Result<Option<RestoreCode>, RestoreCodeError> {
        Ok(self.store.restore_codes().find_active(code).await?)
    }

    /// Marks a code used; succeeds at most once per code.
    pub async fn consume(&self, code: &str) -> Result<bool, RestoreCodeError> {
        Ok(self.store.restore_codes().mark_used(code).await?)
    }

    /// Hard-deletes an unused code (cancel-before-use).
    pub async fn revoke(&self, code: &str, actor_role: Role) -> Result<(), RestoreCodeError> {
        if !actor_role.has_permission(Capability::RevokeRestoreCodes) {
            self.store
                .log_event("Restore code revocation denied", "", "", false)
                .await;
            return Err(RestoreCodeError::PermissionDenied);
        }

        if self.store.restore_codes().delete_unused(code).await? {
            self.store
                .log_event("Restore code revoked", "", "", false)
                .await;
            Ok(())
        } else {
            Err(RestoreCodeError::UnknownCode)
        }
    }

    pub async fn list_active(
        &self,
        actor_role: Role,
    ) -> Result<Vec<RestoreCode>, RestoreCodeError> {
        if !actor_role.has_permission(Capability::GenerateRestoreCodes) {
            return Err(RestoreCodeError::PermissionDenied);
        }
        Ok(self.store.restore_codes().list_active().await?)
    }
}

fn generate_code() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
