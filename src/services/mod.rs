pub mod rate_limit;
pub use rate_limit::FailedAttemptTracker;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, NewAccount};
pub use auth_service_impl::{SUPER_ADMIN_USERNAME, SeaOrmAuthService};

pub mod restore_codes;
pub use restore_codes::{RestoreCodeBroker, RestoreCodeError};

pub mod backup_service;
pub mod backup_service_impl;
pub use backup_service::{BackupError, BackupInfo, BackupManifest, BackupService};
pub use backup_service_impl::FsBackupService;
