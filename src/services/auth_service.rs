//! Domain service for authentication and account management.
//!
//! Handles login with suspicious-activity detection, registration, password
//! resets and the role-based rules for who may manage whom.

use thiserror::Error;

use crate::db::Account;
use crate::domain::Role;
use crate::validation::InvalidInput;

/// Errors specific to authentication and account management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Uniform login failure: unknown username and wrong password are
    /// deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The actor may not perform this operation on this target. Also covers
    /// nonexistent account targets so the message cannot be used to probe
    /// which usernames exist.
    #[error("No permission to manage this account")]
    PermissionDenied,

    #[error("Username already in use")]
    UsernameTaken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<InvalidInput> for AuthError {
    fn from(err: InvalidInput) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Successful login: the canonical username spelling and the resolved role.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub username: String,
    pub role: Role,
}

/// Input for registering an operator account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

/// Domain service trait for authentication and account management.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the role.
    ///
    /// Tolerates arbitrary input and never reveals why a login failed. Every
    /// attempt, successful or not, produces exactly one audit entry carrying
    /// the suspicion flag computed for that attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on any failed attempt.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Creates an account, checking in order: actor permission, username
    /// shape, password policy, names. The first failure wins and every
    /// outcome is audited.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UsernameTaken`] when the username exists,
    /// distinct from validation failures.
    async fn register_user(&self, new: NewAccount, actor_role: Role) -> Result<(), AuthError>;

    /// Resets a managed account's password to a generated temporary one.
    ///
    /// The plaintext is returned exactly once for display; only the hash is
    /// stored.
    async fn reset_password(
        &self,
        target_username: &str,
        actor_role: Role,
    ) -> Result<String, AuthError>;

    /// Changes the caller's own password after re-verifying the current one.
    ///
    /// The built-in super admin is categorically refused.
    async fn change_own_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Updates first/last name on a managed account.
    async fn update_profile(
        &self,
        target_username: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        actor_role: Role,
    ) -> Result<(), AuthError>;

    /// Deletes a managed account. The built-in super admin is not a record
    /// and can never be targeted.
    async fn delete_account(&self, target_username: &str, actor_role: Role)
    -> Result<(), AuthError>;

    /// Lists operator accounts; requires a user-management capability.
    async fn list_accounts(&self, actor_role: Role) -> Result<Vec<Account>, AuthError>;
}
