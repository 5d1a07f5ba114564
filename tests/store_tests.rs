//! Repository-level tests: field encryption at rest, uniqueness rules and
//! the role-based scooter field whitelist.

use std::path::PathBuf;
use std::sync::Arc;

use fleetdesk::crypto::{FieldCipher, TOKEN_PREFIX};
use fleetdesk::db::repositories::account::hash_password;
use fleetdesk::db::{NewScooter, NewTraveller, ScooterUpdate, ScooterUpdateOutcome, Store};
use fleetdesk::domain::Role;
use fleetdesk::entities::prelude::*;
use sea_orm::EntityTrait;

struct TestEnv {
    _dir: PathBuf,
    store: Store,
}

async fn test_env() -> TestEnv {
    let dir = std::env::temp_dir().join(format!("fleetdesk-store-test-{}", uuid::Uuid::new_v4()));
    let cipher = Arc::new(FieldCipher::load_or_create(&dir).expect("cipher init"));

    let db_url = format!("sqlite:{}", dir.join("fleetdesk.db").display());
    let store = Store::new(&db_url, Arc::clone(&cipher))
        .await
        .expect("store init");

    TestEnv { _dir: dir, store }
}

fn traveller_input() -> NewTraveller {
    NewTraveller {
        first_name: "Femke".to_string(),
        last_name: "Jansen".to_string(),
        birthday: "1995-04-12".to_string(),
        gender: "female".to_string(),
        street: "Coolsingel".to_string(),
        house_number: "42b".to_string(),
        zip_code: "3011AB".to_string(),
        city: "Rotterdam".to_string(),
        email: "femke@example.org".to_string(),
        mobile_phone: "12345678".to_string(),
        driving_licence: "AB1234567".to_string(),
    }
}

fn scooter_input(serial: &str) -> NewScooter {
    NewScooter {
        serial_number: serial.to_string(),
        brand: "Segway".to_string(),
        model: "Ninebot Max".to_string(),
        top_speed: 25,
        battery_capacity: 551,
        state_of_charge: 80,
        target_soc_min: 20,
        target_soc_max: 90,
        location: "51.92250,4.47917".to_string(),
    }
}

#[tokio::test]
async fn account_usernames_are_encrypted_and_matched_case_insensitively() {
    let env = test_env().await;
    let accounts = env.store.accounts();

    let hash = hash_password("Aa1!aaaaaaaa", None).expect("hash");
    assert!(
        accounts
            .insert("jdoe1234", &hash, Role::ServiceEngineer, "Jan", "Doe")
            .await
            .expect("insert")
    );

    // At rest the username is a field token.
    let raw = Accounts::find().all(&env.store.conn).await.expect("raw");
    assert!(raw[0].username_cipher.starts_with(TOKEN_PREFIX));

    // Identity is case-insensitive for lookups and uniqueness.
    let found = accounts
        .get_by_username("JDOE1234")
        .await
        .expect("lookup")
        .expect("account exists");
    assert_eq!(found.username, "jdoe1234");
    assert_eq!(found.role, Role::ServiceEngineer);

    assert!(
        !accounts
            .insert("JdOe1234", &hash, Role::ServiceEngineer, "Jan", "Doe")
            .await
            .expect("duplicate check")
    );
}

#[tokio::test]
async fn traveller_sensitive_fields_are_encrypted_at_rest() {
    let env = test_env().await;
    let travellers = env.store.travellers();

    let customer_id = travellers.insert(&traveller_input()).await.expect("insert");
    assert_eq!(customer_id.len(), 12);

    let raw = Travellers::find().all(&env.store.conn).await.expect("raw");
    assert!(raw[0].street_cipher.starts_with(TOKEN_PREFIX));
    assert!(raw[0].house_number_cipher.starts_with(TOKEN_PREFIX));
    assert!(raw[0].email_cipher.starts_with(TOKEN_PREFIX));
    assert!(raw[0].phone_cipher.starts_with(TOKEN_PREFIX));
    // Non-sensitive columns stay plaintext.
    assert_eq!(raw[0].zip_code, "3011AB");
    assert_eq!(raw[0].city, "Rotterdam");

    let traveller = travellers
        .get(&customer_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(traveller.street, "Coolsingel");
    assert_eq!(traveller.email, "femke@example.org");

    // Search matches on decrypted values.
    let hits = travellers.search("femke@").await.expect("search");
    assert_eq!(hits.len(), 1);

    // Updates re-encrypt.
    let changes = fleetdesk::db::TravellerUpdate {
        email: Some("nieuw@example.org".to_string()),
        ..Default::default()
    };
    assert!(travellers.update(&customer_id, &changes).await.expect("update"));
    let traveller = travellers
        .get(&customer_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(traveller.email, "nieuw@example.org");
}

#[tokio::test]
async fn scooter_updates_respect_the_role_whitelist() {
    let env = test_env().await;
    let scooters = env.store.scooters();

    assert!(scooters.insert(&scooter_input("SCOOT12345")).await.expect("insert"));
    // Duplicate serials are an integrity conflict, reported not thrown.
    assert!(!scooters.insert(&scooter_input("SCOOT12345")).await.expect("dup"));

    // Engineers may update maintenance fields.
    let maintenance = ScooterUpdate {
        state_of_charge: Some(55),
        mileage: Some(120.5),
        ..Default::default()
    };
    let outcome = scooters
        .update("SCOOT12345", Role::ServiceEngineer, &maintenance)
        .await
        .expect("update");
    assert_eq!(outcome, ScooterUpdateOutcome::Updated);

    // But not hardware fields.
    let hardware = ScooterUpdate {
        top_speed: Some(45),
        ..Default::default()
    };
    let outcome = scooters
        .update("SCOOT12345", Role::ServiceEngineer, &hardware)
        .await
        .expect("update");
    assert_eq!(outcome, ScooterUpdateOutcome::NoPermittedFields);

    // Admins may.
    let outcome = scooters
        .update("SCOOT12345", Role::SystemAdmin, &hardware)
        .await
        .expect("update");
    assert_eq!(outcome, ScooterUpdateOutcome::Updated);

    let scooter = scooters
        .get("SCOOT12345")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(scooter.state_of_charge, 55);
    assert!((scooter.mileage - 120.5).abs() < f64::EPSILON);
    assert_eq!(scooter.top_speed, 45);

    // Unknown serials are a distinct outcome.
    let outcome = scooters
        .update("NOSUCHSERIAL1", Role::SystemAdmin, &hardware)
        .await
        .expect("update");
    assert_eq!(outcome, ScooterUpdateOutcome::NotFound);
}

#[tokio::test]
async fn empty_updates_are_rejected_not_applied() {
    let env = test_env().await;
    let scooters = env.store.scooters();

    assert!(scooters.insert(&scooter_input("SCOOT99999")).await.expect("insert"));

    let outcome = scooters
        .update("SCOOT99999", Role::SuperAdmin, &ScooterUpdate::default())
        .await
        .expect("update");
    assert_eq!(outcome, ScooterUpdateOutcome::NoPermittedFields);
}
