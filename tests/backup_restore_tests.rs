//! End-to-end tests for the backup/restore orchestration and the one-time
//! restore-code protocol.

use std::path::PathBuf;
use std::sync::Arc;

use fleetdesk::config::{AuthThrottleConfig, Config, SecurityConfig};
use fleetdesk::crypto::FieldCipher;
use fleetdesk::db::Store;
use fleetdesk::domain::Role;
use fleetdesk::services::{
    AuthService, BackupError, BackupService, FailedAttemptTracker, FsBackupService, NewAccount,
    RestoreCodeBroker, RestoreCodeError, SeaOrmAuthService,
};

struct TestEnv {
    _dir: PathBuf,
    store: Store,
    backups: FsBackupService,
    codes: RestoreCodeBroker,
}

async fn test_env() -> TestEnv {
    let dir = std::env::temp_dir().join(format!("fleetdesk-backup-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.data_dir = dir.join("data").display().to_string();
    config.general.database_path = format!("sqlite:{}", dir.join("data/fleetdesk.db").display());
    config.backup.backup_dir = dir.join("backups").display().to_string();
    config.security = SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        auth_throttle: AuthThrottleConfig::default(),
    };

    let cipher = Arc::new(FieldCipher::load_or_create(&dir.join("data")).expect("cipher init"));
    let store = Store::new(&config.general.database_path, Arc::clone(&cipher))
        .await
        .expect("store init");

    let tracker = Arc::new(FailedAttemptTracker::new(&config.security.auth_throttle));
    let auth = SeaOrmAuthService::new(store.clone(), config.security.clone(), tracker)
        .expect("auth service init");

    for username in ["sysadmin01", "sysadmin02"] {
        auth.register_user(
            NewAccount {
                username: username.to_string(),
                password: "Aa1!aaaaaaaa".to_string(),
                role: Role::SystemAdmin,
                first_name: "Sys".to_string(),
                last_name: "Admin".to_string(),
            },
            Role::SuperAdmin,
        )
        .await
        .expect("seed system admin");
    }

    let backups = FsBackupService::new(store.clone(), &config, &cipher);
    let codes = RestoreCodeBroker::new(store.clone());

    TestEnv {
        _dir: dir,
        store,
        backups,
        codes,
    }
}

#[tokio::test]
async fn backup_archive_carries_manifest_metadata() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");
    assert!(name.starts_with("backup_") && name.ends_with(".zip"));

    let backups = env.backups.list_backups().await.expect("list");
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].file_name, name);
    assert_eq!(backups[0].created_by, "super_admin");
    assert!(!backups[0].created_at.is_empty());
    assert!(backups[0].size_bytes > 0);

    assert!(env.backups.verify_backup(&name).await.expect("verify"));
}

#[tokio::test]
async fn restore_without_code_fails_before_touching_storage() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");

    let err = env
        .backups
        .restore_backup(&name, "sysadmin01", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::RestoreCodeRequired));

    // No safety backup was taken: the gate fired before any file work.
    let backups = env.backups.list_backups().await.expect("list");
    assert_eq!(backups.len(), 1);
}

#[tokio::test]
async fn restore_code_binding_is_enforced_per_admin_and_per_backup() {
    let env = test_env().await;

    let backup_a = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("backup a");
    let backup_b = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("backup b");

    let code = env
        .codes
        .issue("sysadmin01", &backup_a, Role::SuperAdmin)
        .await
        .expect("issue code");

    // Wrong admin, right backup: denied and flagged suspicious.
    let err = env
        .backups
        .restore_backup(&backup_a, "sysadmin02", Some(&code), false)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::RestoreCodeRejected));

    // Right admin, wrong backup: denied.
    let err = env
        .backups
        .restore_backup(&backup_b, "sysadmin01", Some(&code), false)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::RestoreCodeRejected));

    // Unknown code: denied.
    let err = env
        .backups
        .restore_backup(&backup_a, "sysadmin01", Some("NOTACODE9999"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::RestoreCodeRejected));

    let suspicious = env
        .store
        .audit()
        .read_suspicious()
        .await
        .expect("suspicious log");
    assert!(
        suspicious
            .iter()
            .any(|e| e.description.contains("another admin")),
        "wrong-admin denial is flagged"
    );
    assert!(
        suspicious
            .iter()
            .any(|e| e.description.contains("invalid restore code")),
        "unknown-code denial is flagged"
    );

    // The denials did not consume the code.
    assert!(env.codes.lookup(&code).await.expect("lookup").is_some());
}

#[tokio::test]
async fn bound_restore_succeeds_once_and_the_code_goes_inert() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");
    let code = env
        .codes
        .issue("sysadmin01", &name, Role::SuperAdmin)
        .await
        .expect("issue code");

    env.backups
        .restore_backup(&name, "sysadmin01", Some(&code), false)
        .await
        .expect("bound restore");

    // A safety backup of the pre-restore state was taken.
    let backups = env.backups.list_backups().await.expect("list");
    assert_eq!(backups.len(), 2);
    assert!(
        backups
            .iter()
            .any(|b| b.created_by.contains("auto-pre-restore"))
    );

    // Used means gone: the code no longer resolves and cannot authorize a
    // second restore.
    assert!(env.codes.lookup(&code).await.expect("lookup").is_none());
    let err = env
        .backups
        .restore_backup(&name, "sysadmin01", Some(&code), false)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::RestoreCodeRejected));
}

#[tokio::test]
async fn super_admin_restores_without_a_code() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");

    env.backups
        .restore_backup(&name, "super_admin", None, true)
        .await
        .expect("super admin restore");
}

#[tokio::test]
async fn revoked_codes_are_permanently_inert() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");
    let code = env
        .codes
        .issue("sysadmin01", &name, Role::SuperAdmin)
        .await
        .expect("issue code");

    env.codes
        .revoke(&code, Role::SuperAdmin)
        .await
        .expect("revoke");
    assert!(env.codes.lookup(&code).await.expect("lookup").is_none());

    let err = env
        .codes
        .revoke(&code, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreCodeError::UnknownCode));
}

#[tokio::test]
async fn code_issuance_is_gated_and_bound_to_real_system_admins() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");

    // Only the super admin may generate codes.
    let err = env
        .codes
        .issue("sysadmin01", &name, Role::SystemAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreCodeError::PermissionDenied));

    // The bound identity must be an existing system admin.
    let err = env
        .codes
        .issue("ghost1234", &name, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreCodeError::UnknownAdmin));
}

#[tokio::test]
async fn backup_deletion_is_super_admin_only() {
    let env = test_env().await;

    let name = env
        .backups
        .create_backup("super_admin")
        .await
        .expect("create backup");

    let err = env
        .backups
        .delete_backup(&name, "sysadmin01", Role::SystemAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::PermissionDenied));

    env.backups
        .delete_backup(&name, "super_admin", Role::SuperAdmin)
        .await
        .expect("delete");
    assert!(env.backups.list_backups().await.expect("list").is_empty());
}

#[tokio::test]
async fn same_second_backups_get_distinct_names() {
    let env = test_env().await;

    let first = env.backups.create_backup("super_admin").await.expect("one");
    let second = env.backups.create_backup("super_admin").await.expect("two");
    assert_ne!(first, second);
    assert_eq!(env.backups.list_backups().await.expect("list").len(), 2);
}
