use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use tracing::{error, info};

use crate::crypto::FieldCipher;

pub mod migrator;
pub mod repositories;

pub use repositories::account::{Account, AccountRepository};
pub use repositories::audit::{AuditRepository, LogEntry};
pub use repositories::restore_code::{RestoreCode, RestoreCodeRepository};
pub use repositories::scooter::{
    NewScooter, Scooter, ScooterRepository, ScooterUpdate, ScooterUpdateOutcome,
};
pub use repositories::traveller::{
    NewTraveller, Traveller, TravellerRepository, TravellerUpdate,
};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    cipher: Arc<FieldCipher>,
}

impl Store {
    pub async fn new(db_url: &str, cipher: Arc<FieldCipher>) -> Result<Self> {
        Self::with_pool_options(db_url, cipher, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        cipher: Arc<FieldCipher>,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn, cipher })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.conn.clone(), Arc::clone(&self.cipher))
    }

    #[must_use]
    pub fn travellers(&self) -> TravellerRepository {
        TravellerRepository::new(self.conn.clone(), Arc::clone(&self.cipher))
    }

    #[must_use]
    pub fn scooters(&self) -> ScooterRepository {
        ScooterRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.conn.clone(), Arc::clone(&self.cipher))
    }

    #[must_use]
    pub fn restore_codes(&self) -> RestoreCodeRepository {
        RestoreCodeRepository::new(self.conn.clone())
    }

    /// Records an audit entry, swallowing failures.
    ///
    /// Audit recording must never abort the business operation it
    /// accompanies; write failures are reported to the process log only.
    pub async fn log_event(&self, description: &str, actor: &str, details: &str, suspicious: bool) {
        if let Err(e) = self.audit().append(description, actor, details, suspicious).await {
            error!(error = %e, description, "Failed to record audit entry");
        }
    }
}
