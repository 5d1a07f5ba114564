//! End-to-end tests for login, suspicious-activity flagging and the
//! role-based account management rules.

use std::path::PathBuf;
use std::sync::Arc;

use fleetdesk::config::{AuthThrottleConfig, SecurityConfig};
use fleetdesk::crypto::FieldCipher;
use fleetdesk::db::Store;
use fleetdesk::domain::Role;
use fleetdesk::services::{
    AuthError, AuthService, FailedAttemptTracker, NewAccount, SeaOrmAuthService,
};

struct TestEnv {
    _dir: PathBuf,
    store: Store,
    auth: SeaOrmAuthService,
}

fn test_security() -> SecurityConfig {
    // Cheap argon2 params keep the suite fast; the policy logic under test
    // is parameter-independent.
    SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        auth_throttle: AuthThrottleConfig {
            max_attempts: 3,
            window_minutes: 15,
        },
    }
}

async fn test_env() -> TestEnv {
    let dir = std::env::temp_dir().join(format!("fleetdesk-auth-test-{}", uuid::Uuid::new_v4()));
    let cipher = Arc::new(FieldCipher::load_or_create(&dir).expect("cipher init"));

    let db_url = format!("sqlite:{}", dir.join("fleetdesk.db").display());
    let store = Store::new(&db_url, Arc::clone(&cipher))
        .await
        .expect("store init");

    let security = test_security();
    let tracker = Arc::new(FailedAttemptTracker::new(&security.auth_throttle));
    let auth =
        SeaOrmAuthService::new(store.clone(), security, tracker).expect("auth service init");

    TestEnv {
        _dir: dir,
        store,
        auth,
    }
}

fn engineer(username: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        password: "Aa1!aaaaaaaa".to_string(),
        role: Role::ServiceEngineer,
        first_name: "Jan".to_string(),
        last_name: "Doe".to_string(),
    }
}

#[tokio::test]
async fn super_admin_logs_in_with_fixed_credentials() {
    let env = test_env().await;

    let login = env
        .auth
        .login("super_admin", "Admin_123?")
        .await
        .expect("super admin login");
    assert_eq!(login.role, Role::SuperAdmin);
    assert_eq!(login.username, "super_admin");

    // Wrong password is a uniform failure, same as any unknown account.
    let err = env.auth.login("super_admin", "nope").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn registered_engineer_logs_in_with_stored_role() {
    let env = test_env().await;

    env.auth
        .register_user(engineer("jdoe1234"), Role::SystemAdmin)
        .await
        .expect("registration");

    let login = env
        .auth
        .login("jdoe1234", "Aa1!aaaaaaaa")
        .await
        .expect("login");
    assert_eq!(login.role, Role::ServiceEngineer);
    assert_eq!(login.username, "jdoe1234");

    // Identity is case-insensitive; the canonical spelling comes back.
    let login = env
        .auth
        .login("JDOE1234", "Aa1!aaaaaaaa")
        .await
        .expect("case-insensitive login");
    assert_eq!(login.username, "jdoe1234");
}

#[tokio::test]
async fn repeated_failures_flag_suspicion_and_success_clears_it() {
    let env = test_env().await;

    env.auth
        .register_user(engineer("jdoe1234"), Role::SystemAdmin)
        .await
        .expect("registration");

    for _ in 0..3 {
        let err = env.auth.login("jdoe1234", "wrongpass").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // A correct login still works and carries the suspicion earned by the
    // preceding failures.
    let login = env
        .auth
        .login("jdoe1234", "Aa1!aaaaaaaa")
        .await
        .expect("4th attempt");
    assert_eq!(login.role, Role::ServiceEngineer);

    let entries = env.store.audit().read_all().await.expect("read log");
    // Newest first: success, fail3, fail2, fail1, registration.
    assert!(entries[0].suspicious, "success entry keeps the flag");
    assert_eq!(entries[0].actor, "jdoe1234");
    assert!(entries[1].suspicious, "third failure crosses the threshold");
    assert!(!entries[2].suspicious);
    assert!(!entries[3].suspicious);
    // Failed attempts are recorded anonymously with the attempted username
    // in the details.
    assert!(entries[1].actor.is_empty());
    assert!(entries[1].details.contains("jdoe1234"));

    // History cleared: a single new failure is not suspicious.
    let _ = env.auth.login("jdoe1234", "wrongpass").await;
    let entries = env.store.audit().read_all().await.expect("read log");
    assert!(!entries[0].suspicious);
}

#[tokio::test]
async fn creation_matrix_follows_the_role_table() {
    let env = test_env().await;

    // system_admin -> service_engineer: allowed
    env.auth
        .register_user(engineer("jdoe1234"), Role::SystemAdmin)
        .await
        .expect("system admin creates engineer");

    // system_admin -> system_admin: denied
    let mut peer = engineer("sysadmin9");
    peer.role = Role::SystemAdmin;
    let err = env
        .auth
        .register_user(peer.clone(), Role::SystemAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));

    // service_engineer -> anyone: denied
    let err = env
        .auth
        .register_user(engineer("other1234"), Role::ServiceEngineer)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));

    // super_admin -> system_admin: allowed
    env.auth
        .register_user(peer, Role::SuperAdmin)
        .await
        .expect("super admin creates system admin");
}

#[tokio::test]
async fn registration_validates_in_order_and_reports_duplicates_distinctly() {
    let env = test_env().await;

    // Bad username shape
    let mut bad = engineer("x");
    bad.username = "short".to_string();
    let err = env
        .auth
        .register_user(bad, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    // Weak password
    let mut bad = engineer("jdoe1234");
    bad.password = "weakpassword".to_string();
    let err = env
        .auth
        .register_user(bad, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    // Empty name
    let mut bad = engineer("jdoe1234");
    bad.first_name = "  ".to_string();
    let err = env
        .auth
        .register_user(bad, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    // Duplicate username (case-insensitive) is an integrity conflict, not a
    // validation failure.
    env.auth
        .register_user(engineer("jdoe1234"), Role::SuperAdmin)
        .await
        .expect("first registration");
    let err = env
        .auth
        .register_user(engineer("JDOE1234"), Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UsernameTaken));
}

#[tokio::test]
async fn every_registration_outcome_writes_exactly_one_audit_entry() {
    let env = test_env().await;

    let baseline = env.store.audit().read_all().await.expect("log").len();

    // Denied
    let _ = env
        .auth
        .register_user(engineer("jdoe1234"), Role::ServiceEngineer)
        .await;
    // Rejected (bad username)
    let mut bad = engineer("jdoe1234");
    bad.username = "nope".to_string();
    let _ = env.auth.register_user(bad, Role::SuperAdmin).await;
    // Success
    let _ = env
        .auth
        .register_user(engineer("jdoe1234"), Role::SuperAdmin)
        .await;
    // Duplicate
    let _ = env
        .auth
        .register_user(engineer("jdoe1234"), Role::SuperAdmin)
        .await;

    let entries = env.store.audit().read_all().await.expect("log");
    assert_eq!(entries.len(), baseline + 4);
}

#[tokio::test]
async fn reset_password_returns_a_usable_temporary_password() {
    let env = test_env().await;

    env.auth
        .register_user(engineer("jdoe1234"), Role::SystemAdmin)
        .await
        .expect("registration");

    let temp = env
        .auth
        .reset_password("jdoe1234", Role::SystemAdmin)
        .await
        .expect("reset");

    // Old password no longer works, the temporary one does.
    assert!(env.auth.login("jdoe1234", "Aa1!aaaaaaaa").await.is_err());
    let login = env
        .auth
        .login("jdoe1234", &temp)
        .await
        .expect("login with temp password");
    assert_eq!(login.role, Role::ServiceEngineer);
}

#[tokio::test]
async fn reset_password_denials_do_not_reveal_whether_the_target_exists() {
    let env = test_env().await;

    let mut admin = engineer("sysadmin9");
    admin.role = Role::SystemAdmin;
    env.auth
        .register_user(admin, Role::SuperAdmin)
        .await
        .expect("registration");

    // Existing-but-forbidden target and missing target: same denial.
    let forbidden = env
        .auth
        .reset_password("sysadmin9", Role::SystemAdmin)
        .await
        .unwrap_err();
    let missing = env
        .auth
        .reset_password("ghost1234", Role::SystemAdmin)
        .await
        .unwrap_err();
    assert!(matches!(forbidden, AuthError::PermissionDenied));
    assert!(matches!(missing, AuthError::PermissionDenied));
}

#[tokio::test]
async fn own_password_change_rules() {
    let env = test_env().await;

    env.auth
        .register_user(engineer("jdoe1234"), Role::SystemAdmin)
        .await
        .expect("registration");

    // Wrong current password
    let err = env
        .auth
        .change_own_password("jdoe1234", "wrong", "Bb2@bbbbbbbb")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    // Weak new password
    let err = env
        .auth
        .change_own_password("jdoe1234", "Aa1!aaaaaaaa", "weak")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    // Valid change
    env.auth
        .change_own_password("jdoe1234", "Aa1!aaaaaaaa", "Bb2@bbbbbbbb")
        .await
        .expect("change");
    assert!(env.auth.login("jdoe1234", "Bb2@bbbbbbbb").await.is_ok());

    // The built-in super admin can never self-service its password.
    let err = env
        .auth
        .change_own_password("super_admin", "Admin_123?", "Bb2@bbbbbbbb")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));
}

#[tokio::test]
async fn built_in_super_admin_is_not_a_deletable_record() {
    let env = test_env().await;

    let err = env
        .auth
        .delete_account("super_admin", Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));

    // And it never shows up in listings.
    let accounts = env.auth.list_accounts(Role::SuperAdmin).await.expect("list");
    assert!(accounts.iter().all(|a| a.username != "super_admin"));
}

#[tokio::test]
async fn management_rules_for_delete_and_listing() {
    let env = test_env().await;

    let mut admin = engineer("sysadmin9");
    admin.role = Role::SystemAdmin;
    env.auth
        .register_user(admin, Role::SuperAdmin)
        .await
        .expect("create admin");
    env.auth
        .register_user(engineer("jdoe1234"), Role::SuperAdmin)
        .await
        .expect("create engineer");

    // system_admin cannot delete a peer admin, but can delete an engineer.
    let err = env
        .auth
        .delete_account("sysadmin9", Role::SystemAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));
    env.auth
        .delete_account("jdoe1234", Role::SystemAdmin)
        .await
        .expect("delete engineer");

    // Engineers cannot list accounts.
    let err = env
        .auth
        .list_accounts(Role::ServiceEngineer)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied));
}
