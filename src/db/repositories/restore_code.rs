use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::{prelude::*, restore_codes};

/// A one-time code binding a backup to a system admin.
#[derive(Debug, Clone)]
pub struct RestoreCode {
    pub code: String,
    pub admin_username: String,
    pub backup_name: String,
    pub created_at: String,
    pub used: bool,
}

impl From<restore_codes::Model> for RestoreCode {
    fn from(model: restore_codes::Model) -> Self {
        Self {
            code: model.code,
            admin_username: model.admin_username,
            backup_name: model.backup_name,
            created_at: model.created_at,
            used: model.used,
        }
    }
}

pub struct RestoreCodeRepository {
    conn: DatabaseConnection,
}

impl RestoreCodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a fresh code; returns `false` when the token already exists.
    pub async fn insert(&self, code: &str, admin_username: &str, backup_name: &str) -> Result<bool> {
        if RestoreCodes::find_by_id(code)
            .one(&self.conn)
            .await
            .context("Failed to check restore code uniqueness")?
            .is_some()
        {
            return Ok(false);
        }

        let active = restore_codes::ActiveModel {
            code: Set(code.to_string()),
            admin_username: Set(admin_username.to_string()),
            backup_name: Set(backup_name.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            used: Set(false),
        };

        RestoreCodes::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert restore code")?;

        Ok(true)
    }

    /// Looks up an unused code. A consumed code is indistinguishable from a
    /// nonexistent one.
    pub async fn find_active(&self, code: &str) -> Result<Option<RestoreCode>> {
        let row = RestoreCodes::find()
            .filter(restore_codes::Column::Code.eq(code))
            .filter(restore_codes::Column::Used.eq(false))
            .one(&self.conn)
            .await
            .context("Failed to look up restore code")?;

        Ok(row.map(RestoreCode::from))
    }

    /// Marks a code used. Guarded on `used = false` so a second consume of
    /// the same code cannot succeed.
    pub async fn mark_used(&self, code: &str) -> Result<bool> {
        let result = RestoreCodes::update_many()
            .col_expr(restore_codes::Column::Used, Expr::value(true))
            .filter(restore_codes::Column::Code.eq(code))
            .filter(restore_codes::Column::Used.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to consume restore code")?;

        Ok(result.rows_affected > 0)
    }

    /// Hard-deletes an unused code (administrative cancel-before-use).
    pub async fn delete_unused(&self, code: &str) -> Result<bool> {
        let result = RestoreCodes::delete_many()
            .filter(restore_codes::Column::Code.eq(code))
            .filter(restore_codes::Column::Used.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to revoke restore code")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn list_active(&self) -> Result<Vec<RestoreCode>> {
        let rows = RestoreCodes::find()
            .filter(restore_codes::Column::Used.eq(false))
            .order_by_asc(restore_codes::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list restore codes")?;

        Ok(rows.into_iter().map(RestoreCode::from).collect())
    }
}
