use std::sync::Arc;

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::crypto::FieldCipher;
use crate::domain::Role;
use crate::entities::{accounts, prelude::*};

/// Account data returned from the repository (no password hash).
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub registered_at: String,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
    cipher: Arc<FieldCipher>,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, cipher: Arc<FieldCipher>) -> Self {
        Self { conn, cipher }
    }

    /// Finds the stored row for a username.
    ///
    /// Username tokens are non-deterministic ciphertext, so equality cannot
    /// be pushed into SQL: every row is decrypted and compared
    /// case-insensitively. Acceptable for a back-office account table.
    async fn find_row(&self, username: &str) -> Result<Option<accounts::Model>> {
        let rows = Accounts::find()
            .all(&self.conn)
            .await
            .context("Failed to scan accounts")?;

        Ok(rows.into_iter().find(|row| {
            self.cipher
                .decrypt_lossy(&row.username_cipher)
                .eq_ignore_ascii_case(username)
        }))
    }

    fn to_account(&self, row: accounts::Model) -> Result<Account> {
        let role: Role = row
            .role
            .parse()
            .with_context(|| format!("Account {} has an invalid role", row.id))?;

        Ok(Account {
            id: row.id,
            username: self.cipher.decrypt_lossy(&row.username_cipher),
            role,
            first_name: row.first_name,
            last_name: row.last_name,
            registered_at: row.registered_at,
        })
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        match self.find_row(username).await? {
            Some(row) => Ok(Some(self.to_account(row)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new account; returns `false` when the username is already
    /// taken (checked here because ciphertext uniqueness cannot be a column
    /// constraint).
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool> {
        if self.find_row(username).await?.is_some() {
            return Ok(false);
        }

        let active = accounts::ActiveModel {
            username_cipher: Set(self.cipher.encrypt(username)?),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.as_str().to_string()),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            registered_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        Accounts::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert account")?;

        Ok(true)
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = Accounts::find()
            .order_by_asc(accounts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list accounts")?;

        rows.into_iter().map(|row| self.to_account(row)).collect()
    }

    /// Updates first/last name; `None` leaves a field unchanged.
    pub async fn update_names(
        &self,
        username: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<bool> {
        let Some(row) = self.find_row(username).await? else {
            return Ok(false);
        };

        let mut active: accounts::ActiveModel = row.into();
        if let Some(first) = first_name {
            active.first_name = Set(first.to_string());
        }
        if let Some(last) = last_name {
            active.last_name = Set(last.to_string());
        }
        active
            .update(&self.conn)
            .await
            .context("Failed to update account names")?;

        Ok(true)
    }

    pub async fn delete(&self, username: &str) -> Result<bool> {
        let Some(row) = self.find_row(username).await? else {
            return Ok(false);
        };

        let result = Accounts::delete_by_id(row.id)
            .exec(&self.conn)
            .await
            .context("Failed to delete account")?;

        Ok(result.rows_affected > 0)
    }

    /// Replaces the stored password hash.
    pub async fn set_password_hash(&self, username: &str, new_hash: &str) -> Result<bool> {
        let Some(row) = self.find_row(username).await? else {
            return Ok(false);
        };

        let mut active: accounts::ActiveModel = row.into();
        active.password_hash = Set(new_hash.to_string());
        active
            .update(&self.conn)
            .await
            .context("Failed to update password hash")?;

        Ok(true)
    }

    /// Verifies a password for a stored account.
    ///
    /// Argon2 verification is CPU-heavy and runs in a blocking task so it
    /// does not stall the async runtime.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let Some(row) = self.find_row(username).await? else {
            return Ok(false);
        };

        let password_hash = row.password_hash;
        let password = password.to_string();

        task::spawn_blocking(move || verify_against_hash(&password, &password_hash))
            .await
            .context("Password verification task panicked")?
    }
}

/// Hash a password using Argon2id with optional custom params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Blocking Argon2 verification against a PHC hash string.
pub fn verify_against_hash(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
