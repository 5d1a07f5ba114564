//! Interactive operator console.
//!
//! Thin presentation glue: prompts collect input, the core services make
//! every permission and validation decision.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::db::{NewScooter, NewTraveller, ScooterUpdate, ScooterUpdateOutcome, Store, TravellerUpdate};
use crate::domain::{Capability, Role};
use crate::services::{
    AuthError, AuthService, BackupService, FailedAttemptTracker, FsBackupService, LoginResult,
    NewAccount, RestoreCodeBroker, SeaOrmAuthService,
};
use crate::validation;

struct App {
    store: Store,
    auth: SeaOrmAuthService,
    backups: FsBackupService,
    codes: RestoreCodeBroker,
}

impl App {
    async fn init(config: &Config) -> Result<Self> {
        let cipher = Arc::new(FieldCipher::load_or_create(std::path::Path::new(
            &config.general.data_dir,
        ))?);

        let store = Store::with_pool_options(
            &config.general.database_path,
            Arc::clone(&cipher),
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let tracker = Arc::new(FailedAttemptTracker::new(&config.security.auth_throttle));
        let auth = SeaOrmAuthService::new(store.clone(), config.security.clone(), tracker)?;
        let backups = FsBackupService::new(store.clone(), config, &cipher);
        let codes = RestoreCodeBroker::new(store.clone());

        Ok(Self {
            store,
            auth,
            backups,
            codes,
        })
    }
}

pub async fn run_console(config: Config) -> Result<()> {
    let app = App::init(&config).await?;

    println!("Fleetdesk v{} - scooter fleet back-office", env!("CARGO_PKG_VERSION"));
    println!("{:-<70}", "");

    let Some(session) = login_loop(&app).await? else {
        println!("Too many failed attempts.");
        return Ok(());
    };

    println!();
    println!("Logged in as {} ({})", session.username, session.role);
    println!("Type 'help' for commands, 'exit' to leave.");

    loop {
        let line = prompt("fleetdesk> ")?;
        let parts: Vec<&str> = line.split_whitespace().collect();

        let outcome = match parts.as_slice() {
            [] => Ok(true),
            ["help"] => {
                print_console_help();
                Ok(true)
            }
            ["whoami"] => {
                println!("{} ({})", session.username, session.role);
                Ok(true)
            }
            ["exit"] | ["quit"] | ["logout"] => Ok(false),
            ["users", rest @ ..] => cmd_users(&app, &session, rest).await.map(|()| true),
            ["passwd"] => cmd_passwd(&app, &session).await.map(|()| true),
            ["travellers", rest @ ..] => cmd_travellers(&app, &session, rest).await.map(|()| true),
            ["scooters", rest @ ..] => cmd_scooters(&app, &session, rest).await.map(|()| true),
            ["logs", rest @ ..] => cmd_logs(&app, &session, rest).await.map(|()| true),
            ["backup", rest @ ..] => cmd_backup(&app, &session, rest).await.map(|()| true),
            ["codes", rest @ ..] => cmd_codes(&app, &session, rest).await.map(|()| true),
            ["rotate-key"] => cmd_rotate_key(&config, &session),
            _ => {
                println!("Unknown command: {line}");
                println!("Type 'help' for the command list.");
                Ok(true)
            }
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {e}"),
        }
    }

    println!("Bye.");
    Ok(())
}

async fn login_loop(app: &App) -> Result<Option<LoginResult>> {
    for _ in 0..3 {
        let username = prompt("Username: ")?;
        let password = prompt("Password: ")?;

        match app.auth.login(&username, &password).await {
            Ok(session) => return Ok(Some(session)),
            Err(AuthError::InvalidCredentials) => println!("Invalid credentials."),
            Err(e) => println!("Login error: {e}"),
        }
    }
    Ok(None)
}

async fn cmd_users(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    match args {
        ["list"] => {
            let accounts = match app.auth.list_accounts(session.role).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    println!("{e}");
                    return Ok(());
                }
            };
            println!("Accounts ({} total)", accounts.len());
            println!("{:-<70}", "");
            for account in accounts {
                println!(
                    "• {} [{}] {} {} (registered {})",
                    account.username,
                    account.role,
                    account.first_name,
                    account.last_name,
                    account.registered_at
                );
            }
        }
        ["add", username, role, first_name, last_name] => {
            let Ok(role) = role.parse::<Role>() else {
                println!("Role must be super_admin, system_admin or service_engineer");
                return Ok(());
            };
            let password = prompt("Password for new account: ")?;
            let new = NewAccount {
                username: (*username).to_string(),
                password,
                role,
                first_name: (*first_name).to_string(),
                last_name: (*last_name).to_string(),
            };
            match app.auth.register_user(new, session.role).await {
                Ok(()) => println!("✓ Account created"),
                Err(e) => println!("{e}"),
            }
        }
        ["rm", username] => {
            if !confirm(&format!("Delete account '{username}'?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            match app.auth.delete_account(username, session.role).await {
                Ok(()) => println!("✓ Account deleted"),
                Err(e) => println!("{e}"),
            }
        }
        ["reset", username] => match app.auth.reset_password(username, session.role).await {
            Ok(temp) => {
                println!("✓ Temporary password (shown once): {temp}");
            }
            Err(e) => println!("{e}"),
        },
        ["update", username, first_name, last_name] => {
            match app
                .auth
                .update_profile(username, Some(*first_name), Some(*last_name), session.role)
                .await
            {
                Ok(()) => println!("✓ Profile updated"),
                Err(e) => println!("{e}"),
            }
        }
        _ => {
            println!("Usage: users list | add <username> <role> <first> <last> | rm <username>");
            println!("       users reset <username> | update <username> <first> <last>");
        }
    }
    Ok(())
}

async fn cmd_passwd(app: &App, session: &LoginResult) -> Result<()> {
    let old_password = prompt("Current password: ")?;
    let new_password = prompt("New password: ")?;
    match app
        .auth
        .change_own_password(&session.username, &old_password, &new_password)
        .await
    {
        Ok(()) => println!("✓ Password changed"),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

async fn cmd_travellers(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    if !session.role.has_permission(Capability::ManageTravellers) {
        app.store
            .log_event("Traveller operation denied", &session.username, "", false)
            .await;
        println!("No permission to manage travellers.");
        return Ok(());
    }

    match args {
        ["list"] => {
            let travellers = app.store.travellers().list().await?;
            println!("Travellers ({} total)", travellers.len());
            println!("{:-<70}", "");
            for t in travellers {
                println!(
                    "• {} {} [{}] {} {}, {} {}",
                    t.first_name, t.last_name, t.customer_id, t.street, t.house_number, t.zip_code, t.city
                );
            }
        }
        ["show", customer_id] => match app.store.travellers().get(customer_id).await? {
            Some(t) => {
                println!("Customer:  {}", t.customer_id);
                println!("Name:      {} {}", t.first_name, t.last_name);
                println!("Born:      {} ({})", t.birthday, t.gender);
                println!("Address:   {} {}, {} {}", t.street, t.house_number, t.zip_code, t.city);
                println!("Email:     {}", t.email);
                println!("Phone:     +31-6-{}", t.mobile_phone);
                println!("Licence:   {}", t.driving_licence);
                println!("Registered: {}", t.registered_at);
            }
            None => println!("Traveller {customer_id} not found."),
        },
        ["search", term] => {
            for t in app.store.travellers().search(term).await? {
                println!("• {} {} [{}] {}", t.first_name, t.last_name, t.customer_id, t.email);
            }
        }
        ["add"] => {
            let Some(input) = prompt_new_traveller()? else {
                println!("Cancelled.");
                return Ok(());
            };
            let customer_id = app.store.travellers().insert(&input).await?;
            app.store
                .log_event(
                    "Traveller registered",
                    &session.username,
                    &format!("Customer: {customer_id}"),
                    false,
                )
                .await;
            println!("✓ Traveller registered with customer id {customer_id}");
        }
        ["update", customer_id] => {
            let Some(changes) = prompt_traveller_update()? else {
                println!("Nothing to update.");
                return Ok(());
            };
            if app.store.travellers().update(customer_id, &changes).await? {
                app.store
                    .log_event(
                        "Traveller updated",
                        &session.username,
                        &format!("Customer: {customer_id}"),
                        false,
                    )
                    .await;
                println!("✓ Traveller updated");
            } else {
                app.store
                    .log_event(
                        "Traveller update failed - not found",
                        &session.username,
                        &format!("Customer: {customer_id}"),
                        false,
                    )
                    .await;
                println!("Traveller {customer_id} not found.");
            }
        }
        ["rm", customer_id] => {
            if !confirm(&format!("Delete traveller '{customer_id}'?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            if app.store.travellers().delete(customer_id).await? {
                app.store
                    .log_event(
                        "Traveller deleted",
                        &session.username,
                        &format!("Customer: {customer_id}"),
                        false,
                    )
                    .await;
                println!("✓ Traveller deleted");
            } else {
                println!("Traveller {customer_id} not found.");
            }
        }
        _ => println!("Usage: travellers list | show <id> | search <term> | add | update <id> | rm <id>"),
    }
    Ok(())
}

async fn cmd_scooters(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    if !session.role.has_permission(Capability::ManageScooters) {
        app.store
            .log_event("Scooter operation denied", &session.username, "", false)
            .await;
        println!("No permission to manage scooters.");
        return Ok(());
    }
    let is_admin = session.role != Role::ServiceEngineer;

    match args {
        ["list"] => {
            let scooters = app.store.scooters().list().await?;
            println!("Scooters ({} total)", scooters.len());
            println!("{:-<70}", "");
            for s in scooters {
                let status = if s.out_of_service { "⏸ out of service" } else { "✓ in service" };
                println!(
                    "• {} {} [{}] SoC {}% @ {} | {}",
                    s.brand, s.model, s.serial_number, s.state_of_charge, s.location, status
                );
            }
        }
        ["show", serial] => match app.store.scooters().get(serial).await? {
            Some(s) => {
                println!("Serial:     {}", s.serial_number);
                println!("Model:      {} {}", s.brand, s.model);
                println!("Top speed:  {} km/h", s.top_speed);
                println!("Battery:    {} Wh", s.battery_capacity);
                println!("Charge:     {}% (target {}-{}%)", s.state_of_charge, s.target_soc_min, s.target_soc_max);
                println!("Location:   {}", s.location);
                println!("Mileage:    {} km", s.mileage);
                println!("Maintained: {}", s.last_maintenance_date.as_deref().unwrap_or("never"));
                println!("In service: {}", s.in_service_at);
            }
            None => println!("Scooter {serial} not found."),
        },
        ["search", term] => {
            for s in app.store.scooters().search(term).await? {
                println!("• {} {} [{}]", s.brand, s.model, s.serial_number);
            }
        }
        ["add"] if is_admin => {
            let Some(input) = prompt_new_scooter()? else {
                println!("Cancelled.");
                return Ok(());
            };
            if app.store.scooters().insert(&input).await? {
                app.store
                    .log_event(
                        "Scooter added",
                        &session.username,
                        &format!("Serial: {}", input.serial_number),
                        false,
                    )
                    .await;
                println!("✓ Scooter added");
            } else {
                app.store
                    .log_event(
                        "Scooter add failed - duplicate serial",
                        &session.username,
                        &format!("Serial: {}", input.serial_number),
                        false,
                    )
                    .await;
                println!("Serial number already exists.");
            }
        }
        ["update", serial] => {
            let Some(changes) = prompt_scooter_update(is_admin)? else {
                println!("Nothing to update.");
                return Ok(());
            };
            match app.store.scooters().update(serial, session.role, &changes).await? {
                ScooterUpdateOutcome::Updated => {
                    app.store
                        .log_event(
                            "Scooter updated",
                            &session.username,
                            &format!("Serial: {serial}"),
                            false,
                        )
                        .await;
                    println!("✓ Scooter updated");
                }
                ScooterUpdateOutcome::NotFound => {
                    app.store
                        .log_event(
                            "Scooter update failed - not found",
                            &session.username,
                            &format!("Serial: {serial}"),
                            false,
                        )
                        .await;
                    println!("Scooter {serial} not found.");
                }
                ScooterUpdateOutcome::NoPermittedFields => {
                    app.store
                        .log_event(
                            "Scooter update denied - fields outside role",
                            &session.username,
                            &format!("Serial: {serial}"),
                            false,
                        )
                        .await;
                    println!("None of the requested fields are editable for your role.");
                }
            }
        }
        ["rm", serial] if is_admin => {
            if !confirm(&format!("Delete scooter '{serial}'?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            if app.store.scooters().delete(serial).await? {
                app.store
                    .log_event(
                        "Scooter deleted",
                        &session.username,
                        &format!("Serial: {serial}"),
                        false,
                    )
                    .await;
                println!("✓ Scooter deleted");
            } else {
                println!("Scooter {serial} not found.");
            }
        }
        ["add" | "rm", ..] => println!("Service engineers may only update scooters."),
        _ => println!("Usage: scooters list | show <serial> | search <term> | add | update <serial> | rm <serial>"),
    }
    Ok(())
}

async fn cmd_logs(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    if !session.role.has_permission(Capability::ViewLogs) {
        app.store
            .log_event("Log view denied", &session.username, "", false)
            .await;
        println!("No permission to view logs.");
        return Ok(());
    }

    let entries = match args {
        ["suspicious"] => app.store.audit().read_suspicious().await?,
        [] => app.store.audit().read_all().await?,
        _ => {
            println!("Usage: logs [suspicious]");
            return Ok(());
        }
    };

    println!("Audit log ({} entries, newest first)", entries.len());
    println!("{:-<70}", "");
    for entry in entries {
        let flag = if entry.suspicious { " ⚠" } else { "" };
        let actor = if entry.actor.is_empty() { "-" } else { &entry.actor };
        println!("#{} {}{} [{}] {}", entry.id, entry.timestamp, flag, actor, entry.description);
        if !entry.details.is_empty() {
            println!("    {}", entry.details);
        }
    }
    Ok(())
}

async fn cmd_backup(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    match args {
        ["create"] => {
            if !session.role.has_permission(Capability::CreateBackup) {
                app.store
                    .log_event("Backup creation denied", &session.username, "", false)
                    .await;
                println!("No permission to create backups.");
                return Ok(());
            }
            match app.backups.create_backup(&session.username).await {
                Ok(name) => println!("✓ Backup created: {name}"),
                Err(e) => println!("{e}"),
            }
        }
        ["list"] => {
            let backups = app.backups.list_backups().await?;
            println!("Backups ({} total)", backups.len());
            println!("{:-<70}", "");
            for backup in backups {
                println!(
                    "• {} ({} bytes) by {} at {}",
                    backup.file_name, backup.size_bytes, backup.created_by, backup.created_at
                );
            }
        }
        ["restore", name, rest @ ..] => {
            if !session.role.has_permission(Capability::RestoreBackup) {
                app.store
                    .log_event("Restore denied", &session.username, "", false)
                    .await;
                println!("No permission to restore backups.");
                return Ok(());
            }
            if !confirm("Restoring overwrites the live database. Continue?")? {
                println!("Cancelled.");
                return Ok(());
            }
            let restore_code = rest.first().copied();
            let is_super_admin = session.role == Role::SuperAdmin;
            match app
                .backups
                .restore_backup(name, &session.username, restore_code, is_super_admin)
                .await
            {
                Ok(()) => {
                    println!("✓ Backup restored. Restart fleetdesk to reload the restored state.");
                }
                Err(e) => println!("{e}"),
            }
        }
        ["delete", name] => {
            if !confirm(&format!("Delete backup '{name}'?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            match app
                .backups
                .delete_backup(name, &session.username, session.role)
                .await
            {
                Ok(()) => println!("✓ Backup deleted"),
                Err(e) => println!("{e}"),
            }
        }
        ["verify", name] => match app.backups.verify_backup(name).await {
            Ok(true) => println!("✓ Archive is sound"),
            Ok(false) => println!("✗ Archive is damaged or incomplete"),
            Err(e) => println!("{e}"),
        },
        ["prune"] => {
            if session.role != Role::SuperAdmin {
                println!("Only the super admin may prune backups.");
                return Ok(());
            }
            let deleted = app.backups.prune_backups(&session.username).await?;
            println!("✓ {deleted} old backups removed");
        }
        _ => println!("Usage: backup create | list | restore <name> [code] | delete <name> | verify <name> | prune"),
    }
    Ok(())
}

async fn cmd_codes(app: &App, session: &LoginResult, args: &[&str]) -> Result<()> {
    match args {
        ["issue", admin, backup] => {
            match app.codes.issue(admin, backup, session.role).await {
                Ok(code) => {
                    println!("✓ Restore code (shown once): {code}");
                    println!("  Bound to admin '{admin}' and backup '{backup}'.");
                }
                Err(e) => println!("{e}"),
            }
        }
        ["revoke", code] => match app.codes.revoke(code, session.role).await {
            Ok(()) => println!("✓ Restore code revoked"),
            Err(e) => println!("{e}"),
        },
        ["list"] => match app.codes.list_active(session.role).await {
            Ok(codes) => {
                println!("Active restore codes ({} total)", codes.len());
                println!("{:-<70}", "");
                for code in codes {
                    println!(
                        "• {} for {} (backup {}, issued {})",
                        code.code, code.admin_username, code.backup_name, code.created_at
                    );
                }
            }
            Err(e) => println!("{e}"),
        },
        _ => println!("Usage: codes issue <admin> <backup> | revoke <code> | list"),
    }
    Ok(())
}

fn cmd_rotate_key(config: &Config, session: &LoginResult) -> Result<bool> {
    if session.role != Role::SuperAdmin {
        println!("Only the super admin may rotate the encryption key.");
        return Ok(true);
    }

    println!("WARNING: rotating the key makes ALL previously encrypted data unreadable.");
    println!("Take a backup first. The old key is kept as field.key.bak.");
    if !confirm("Rotate the encryption key now?")? {
        println!("Cancelled.");
        return Ok(true);
    }

    FieldCipher::rotate(std::path::Path::new(&config.general.data_dir))?;
    println!("✓ Key rotated. Restart fleetdesk so every component uses the new key.");
    // Sessions keep the old key in memory, so force a fresh start.
    Ok(false)
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} [y/N] "))?;
    Ok(answer.eq_ignore_ascii_case("y"))
}

/// Prompts until the validator accepts the value; 'back' aborts.
fn prompt_validated(
    label: &str,
    validate: impl Fn(&str) -> Result<(), validation::InvalidInput>,
) -> Result<Option<String>> {
    loop {
        let value = prompt(label)?;
        if value.eq_ignore_ascii_case("back") {
            return Ok(None);
        }
        match validate(&value) {
            Ok(()) => return Ok(Some(value)),
            Err(e) => println!("✗ {e}"),
        }
    }
}

fn prompt_new_traveller() -> Result<Option<NewTraveller>> {
    println!("Register traveller (type 'back' to cancel)");

    macro_rules! field {
        ($label:expr, $validator:expr) => {
            match prompt_validated($label, $validator)? {
                Some(value) => value,
                None => return Ok(None),
            }
        };
    }

    let first_name = field!("First name: ", validation::validate_name);
    let last_name = field!("Last name: ", validation::validate_name);
    let birthday = field!("Birthday (YYYY-MM-DD): ", |v: &str| {
        chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| validation::InvalidInput::new("Date must be YYYY-MM-DD"))
    });
    let gender = field!("Gender (male/female): ", |v: &str| {
        if matches!(v.to_lowercase().as_str(), "male" | "female") {
            Ok(())
        } else {
            Err(validation::InvalidInput::new("Gender must be male or female"))
        }
    });
    let street = field!("Street: ", validation::validate_street);
    let house_number = field!("House number: ", |v: &str| {
        if v.trim().is_empty() {
            Err(validation::InvalidInput::new("House number is required"))
        } else {
            Ok(())
        }
    });
    let zip_code = field!("Zip code (DDDDXX): ", validation::validate_zip_code);
    let city = field!("City: ", validation::validate_city);
    let email = field!("Email: ", validation::validate_email);
    let mobile_phone = field!("Mobile phone (8 digits): ", validation::validate_mobile_phone);
    let driving_licence = field!("Driving licence: ", validation::validate_driving_licence);

    Ok(Some(NewTraveller {
        first_name,
        last_name,
        birthday,
        gender,
        street,
        house_number,
        zip_code,
        city,
        email,
        mobile_phone,
        driving_licence,
    }))
}

fn prompt_traveller_update() -> Result<Option<TravellerUpdate>> {
    println!("Leave a field empty to keep its current value.");

    let mut changes = TravellerUpdate::default();
    changes.street = non_empty(prompt("Street: ")?);
    changes.house_number = non_empty(prompt("House number: ")?);
    changes.zip_code = non_empty(prompt("Zip code: ")?);
    changes.city = non_empty(prompt("City: ")?);
    changes.email = non_empty(prompt("Email: ")?);
    changes.mobile_phone = non_empty(prompt("Mobile phone: ")?);

    type Validator = fn(&str) -> Result<(), validation::InvalidInput>;
    let checks: [(&Option<String>, Validator); 4] = [
        (&changes.zip_code, validation::validate_zip_code),
        (&changes.city, validation::validate_city),
        (&changes.email, validation::validate_email),
        (&changes.mobile_phone, validation::validate_mobile_phone),
    ];
    for (value, validate) in checks {
        if let Some(value) = value
            && let Err(e) = validate(value)
        {
            println!("✗ {e}");
            return Ok(None);
        }
    }

    let empty = changes.street.is_none()
        && changes.house_number.is_none()
        && changes.zip_code.is_none()
        && changes.city.is_none()
        && changes.email.is_none()
        && changes.mobile_phone.is_none();

    Ok(if empty { None } else { Some(changes) })
}

fn prompt_new_scooter() -> Result<Option<NewScooter>> {
    println!("Add scooter (type 'back' to cancel)");

    let Some(serial_number) =
        prompt_validated("Serial number: ", validation::validate_serial_number)?
    else {
        return Ok(None);
    };
    let brand = prompt("Brand: ")?;
    let model = prompt("Model: ")?;
    let Some(top_speed) = prompt_i32("Top speed (km/h): ")? else {
        return Ok(None);
    };
    let Some(battery_capacity) = prompt_i32("Battery capacity (Wh): ")? else {
        return Ok(None);
    };
    let Some(state_of_charge) = prompt_i32("State of charge (%): ")? else {
        return Ok(None);
    };
    if let Err(e) = validation::validate_percentage(state_of_charge) {
        println!("✗ {e}");
        return Ok(None);
    }
    let Some(target_soc_min) = prompt_i32("Target SoC min (%): ")? else {
        return Ok(None);
    };
    let Some(target_soc_max) = prompt_i32("Target SoC max (%): ")? else {
        return Ok(None);
    };
    if let Err(e) = validation::validate_soc_range(target_soc_min, target_soc_max) {
        println!("✗ {e}");
        return Ok(None);
    }
    let location = prompt("Location (lat,long): ")?;

    Ok(Some(NewScooter {
        serial_number,
        brand,
        model,
        top_speed,
        battery_capacity,
        state_of_charge,
        target_soc_min,
        target_soc_max,
        location,
    }))
}

fn prompt_scooter_update(is_admin: bool) -> Result<Option<ScooterUpdate>> {
    println!("Leave a field empty to keep its current value.");

    let mut changes = ScooterUpdate::default();

    if let Some(soc) = non_empty(prompt("State of charge (%): ")?) {
        match soc.parse() {
            Ok(value) => changes.state_of_charge = Some(value),
            Err(_) => {
                println!("✗ Not a number");
                return Ok(None);
            }
        }
    }
    changes.location = non_empty(prompt("Location: ")?);
    if let Some(oos) = non_empty(prompt("Out of service (true/false): ")?) {
        match oos.parse() {
            Ok(value) => changes.out_of_service = Some(value),
            Err(_) => {
                println!("✗ Expected true or false");
                return Ok(None);
            }
        }
    }
    if let Some(mileage) = non_empty(prompt("Mileage (km): ")?) {
        match mileage.parse() {
            Ok(value) => changes.mileage = Some(value),
            Err(_) => {
                println!("✗ Not a number");
                return Ok(None);
            }
        }
    }
    changes.last_maintenance_date = non_empty(prompt("Last maintenance (YYYY-MM-DD): ")?);

    if is_admin {
        changes.brand = non_empty(prompt("Brand: ")?);
        changes.model = non_empty(prompt("Model: ")?);
        if let Some(speed) = non_empty(prompt("Top speed (km/h): ")?) {
            changes.top_speed = speed.parse().ok();
        }
        if let Some(capacity) = non_empty(prompt("Battery capacity (Wh): ")?) {
            changes.battery_capacity = capacity.parse().ok();
        }
    }

    Ok(Some(changes))
}

fn prompt_i32(label: &str) -> Result<Option<i32>> {
    let value = prompt(label)?;
    if value.eq_ignore_ascii_case("back") {
        return Ok(None);
    }
    match value.parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => {
            println!("✗ Not a number");
            Ok(None)
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn print_console_help() {
    println!("Commands:");
    println!("  users list|add|rm|reset|update     Manage operator accounts");
    println!("  passwd                             Change your own password");
    println!("  travellers list|show|search|add|update|rm");
    println!("  scooters list|show|search|add|update|rm");
    println!("  logs [suspicious]                  View the audit log");
    println!("  backup create|list|restore|delete|verify|prune");
    println!("  codes issue|revoke|list            Manage one-time restore codes");
    println!("  rotate-key                         Rotate the field encryption key");
    println!("  whoami | help | exit");
}
