//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::db::repositories::account::{hash_password, verify_against_hash};
use crate::domain::{Capability, Role};
use crate::services::auth_service::{AuthError, AuthService, LoginResult, NewAccount};
use crate::services::rate_limit::FailedAttemptTracker;
use crate::validation::{validate_name, validate_password, validate_username};

/// Built-in operator identity, fixed at deploy time. Not a database record:
/// it cannot be listed, deleted or password-reset.
pub const SUPER_ADMIN_USERNAME: &str = "super_admin";
const SUPER_ADMIN_PASSWORD: &str = "Admin_123?";

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    tracker: Arc<FailedAttemptTracker>,
    /// Argon2 hash of the fixed super-admin password, computed once so the
    /// built-in identity is verified exactly like a stored account instead
    /// of by plaintext comparison.
    super_admin_hash: String,
}

impl SeaOrmAuthService {
    pub fn new(
        store: Store,
        security: SecurityConfig,
        tracker: Arc<FailedAttemptTracker>,
    ) -> anyhow::Result<Self> {
        let super_admin_hash = hash_password(SUPER_ADMIN_PASSWORD, Some(&security))?;
        Ok(Self {
            store,
            security,
            tracker,
            super_admin_hash,
        })
    }

    async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let config = self.security.clone();
        task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))?
            .map_err(Into::into)
    }

    async fn verify_super_admin(&self, password: &str) -> Result<bool, AuthError> {
        let hash = self.super_admin_hash.clone();
        let password = password.to_string();
        task::spawn_blocking(move || verify_against_hash(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task panicked: {e}")))?
            .map_err(Into::into)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let now = chrono::Utc::now();
        // Computed before the attempt so a successful login still carries
        // the flag earned by the failures that preceded it.
        let suspicious = self.tracker.is_suspicious(username, now);

        let result = if username.eq_ignore_ascii_case(SUPER_ADMIN_USERNAME) {
            if self.verify_super_admin(password).await? {
                Some(LoginResult {
                    username: SUPER_ADMIN_USERNAME.to_string(),
                    role: Role::SuperAdmin,
                })
            } else {
                None
            }
        } else if self.store.accounts().verify_password(username, password).await? {
            self.store
                .accounts()
                .get_by_username(username)
                .await?
                .map(|account| LoginResult {
                    username: account.username,
                    role: account.role,
                })
        } else {
            None
        };

        match result {
            Some(login) => {
                self.tracker.clear(username);
                self.store
                    .log_event(
                        "Successful login",
                        &login.username,
                        &format!("Role: {}", login.role),
                        suspicious,
                    )
                    .await;
                Ok(login)
            }
            None => {
                self.tracker.record_failure(username, now);
                let now_suspicious = self.tracker.is_suspicious(username, now);

                let mut details = format!("Username: {username}");
                if now_suspicious {
                    details.push_str(" - multiple failed attempts detected");
                }
                self.store
                    .log_event("Failed login attempt", "", &details, now_suspicious)
                    .await;

                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn register_user(&self, new: NewAccount, actor_role: Role) -> Result<(), AuthError> {
        if !actor_role.may_administer(new.role) {
            self.store
                .log_event(
                    "User creation denied",
                    "",
                    &format!("Attempted role: {}", new.role),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        }

        if let Err(e) = validate_username(&new.username) {
            self.store
                .log_event(
                    "User creation rejected",
                    "",
                    &format!("Invalid username: {}", new.username),
                    false,
                )
                .await;
            return Err(e.into());
        }

        if let Err(e) = validate_password(&new.password) {
            self.store
                .log_event(
                    "User creation rejected",
                    "",
                    &format!("Password policy failure for username: {}", new.username),
                    false,
                )
                .await;
            return Err(e.into());
        }

        if let Err(e) = validate_name(&new.first_name).and_then(|()| validate_name(&new.last_name))
        {
            self.store
                .log_event(
                    "User creation rejected",
                    "",
                    &format!("Invalid name for username: {}", new.username),
                    false,
                )
                .await;
            return Err(e.into());
        }

        let password_hash = self.hash_blocking(new.password.clone()).await?;
        let inserted = self
            .store
            .accounts()
            .insert(
                &new.username,
                &password_hash,
                new.role,
                &new.first_name,
                &new.last_name,
            )
            .await?;

        if inserted {
            self.store
                .log_event(
                    "New user created",
                    &new.username,
                    &format!(
                        "Role: {}, Name: {} {}",
                        new.role, new.first_name, new.last_name
                    ),
                    false,
                )
                .await;
            Ok(())
        } else {
            self.store
                .log_event(
                    "User creation failed",
                    "",
                    &format!("Username: {} (possibly already in use)", new.username),
                    false,
                )
                .await;
            Err(AuthError::UsernameTaken)
        }
    }

    async fn reset_password(
        &self,
        target_username: &str,
        actor_role: Role,
    ) -> Result<String, AuthError> {
        // Missing targets and forbidden roles produce the same denial so a
        // manager cannot probe which usernames exist.
        let Some(account) = self.store.accounts().get_by_username(target_username).await? else {
            self.store
                .log_event(
                    "Password reset denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        };

        if !actor_role.may_administer(account.role) {
            self.store
                .log_event(
                    "Password reset denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        }

        let temp_password = generate_temp_password();
        let password_hash = self.hash_blocking(temp_password.clone()).await?;

        if !self
            .store
            .accounts()
            .set_password_hash(&account.username, &password_hash)
            .await?
        {
            return Err(AuthError::Internal(
                "Account disappeared during password reset".to_string(),
            ));
        }

        self.store
            .log_event(
                "Password reset",
                &account.username,
                &format!("For user: {}", account.username),
                false,
            )
            .await;

        Ok(temp_password)
    }

    async fn change_own_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if username.eq_ignore_ascii_case(SUPER_ADMIN_USERNAME) {
            self.store
                .log_event(
                    "Password change denied",
                    username,
                    "Built-in super admin password is fixed",
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        }

        if !self
            .store
            .accounts()
            .verify_password(username, old_password)
            .await?
        {
            self.store
                .log_event("Failed password change", username, "Wrong current password", false)
                .await;
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        if let Err(e) = validate_password(new_password) {
            self.store
                .log_event(
                    "Failed password change",
                    username,
                    "New password rejected by policy",
                    false,
                )
                .await;
            return Err(e.into());
        }

        let password_hash = self.hash_blocking(new_password.to_string()).await?;
        self.store
            .accounts()
            .set_password_hash(username, &password_hash)
            .await?;

        self.store
            .log_event("Password changed", username, "", false)
            .await;

        Ok(())
    }

    async fn update_profile(
        &self,
        target_username: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        actor_role: Role,
    ) -> Result<(), AuthError> {
        for name in [first_name, last_name].into_iter().flatten() {
            validate_name(name)?;
        }

        let Some(account) = self.store.accounts().get_by_username(target_username).await? else {
            self.store
                .log_event(
                    "Profile update denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        };

        if !actor_role.may_administer(account.role) {
            self.store
                .log_event(
                    "Profile update denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        }

        self.store
            .accounts()
            .update_names(&account.username, first_name, last_name)
            .await?;

        self.store
            .log_event("Profile updated", &account.username, "", false)
            .await;

        Ok(())
    }

    async fn delete_account(
        &self,
        target_username: &str,
        actor_role: Role,
    ) -> Result<(), AuthError> {
        // The built-in super admin is not a record, so it falls into the
        // not-found branch here and can never be deleted.
        let Some(account) = self.store.accounts().get_by_username(target_username).await? else {
            self.store
                .log_event(
                    "User deletion denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        };

        if !actor_role.may_administer(account.role) {
            self.store
                .log_event(
                    "User deletion denied",
                    "",
                    &format!("Target: {target_username}"),
                    false,
                )
                .await;
            return Err(AuthError::PermissionDenied);
        }

        self.store.accounts().delete(&account.username).await?;

        self.store
            .log_event(
                "User deleted",
                &account.username,
                &format!("Role: {}", account.role),
                false,
            )
            .await;

        Ok(())
    }

    async fn list_accounts(&self, actor_role: Role) -> Result<Vec<crate::db::Account>, AuthError> {
        if !(actor_role.has_permission(Capability::ManageUsers)
            || actor_role.has_permission(Capability::ManageServiceEngineers))
        {
            self.store
                .log_event("Account listing denied", "", "", false)
                .await;
            return Err(AuthError::PermissionDenied);
        }

        Ok(self.store.accounts().list().await?)
    }
}

/// Temporary password satisfying the policy by construction: the fixed
/// prefix provides all four character classes, the random middle the entropy.
fn generate_temp_password() -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

    let mut rng = rand::rng();
    let middle: String = (0..12)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();

    format!("Tp1!{middle}")
}
