use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::domain::Role;
use crate::entities::{prelude::*, scooters};

pub use crate::entities::scooters::Model as Scooter;

/// Input for adding a scooter to the fleet.
#[derive(Debug, Clone)]
pub struct NewScooter {
    pub serial_number: String,
    pub brand: String,
    pub model: String,
    pub top_speed: i32,
    pub battery_capacity: i32,
    pub state_of_charge: i32,
    pub target_soc_min: i32,
    pub target_soc_max: i32,
    pub location: String,
}

/// Partial update; which fields actually apply depends on the actor's role.
#[derive(Debug, Clone, Default)]
pub struct ScooterUpdate {
    // Maintenance fields, open to every role with scooter access.
    pub state_of_charge: Option<i32>,
    pub location: Option<String>,
    pub out_of_service: Option<bool>,
    pub mileage: Option<f64>,
    pub last_maintenance_date: Option<String>,
    // Hardware fields, admins only.
    pub brand: Option<String>,
    pub model: Option<String>,
    pub top_speed: Option<i32>,
    pub battery_capacity: Option<i32>,
    pub target_soc_min: Option<i32>,
    pub target_soc_max: Option<i32>,
}

impl ScooterUpdate {
    fn has_maintenance_fields(&self) -> bool {
        self.state_of_charge.is_some()
            || self.location.is_some()
            || self.out_of_service.is_some()
            || self.mileage.is_some()
            || self.last_maintenance_date.is_some()
    }

    fn has_hardware_fields(&self) -> bool {
        self.brand.is_some()
            || self.model.is_some()
            || self.top_speed.is_some()
            || self.battery_capacity.is_some()
            || self.target_soc_min.is_some()
            || self.target_soc_max.is_some()
    }
}

/// Outcome of a role-gated scooter update, kept explicit so callers can
/// distinguish a missing scooter from a rejected field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScooterUpdateOutcome {
    Updated,
    NotFound,
    /// Every requested field was outside the actor's whitelist.
    NoPermittedFields,
}

pub struct ScooterRepository {
    conn: DatabaseConnection,
}

impl ScooterRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a scooter; returns `false` when the serial number exists.
    pub async fn insert(&self, input: &NewScooter) -> Result<bool> {
        if Scooters::find_by_id(&input.serial_number)
            .one(&self.conn)
            .await
            .context("Failed to check scooter serial uniqueness")?
            .is_some()
        {
            return Ok(false);
        }

        let active = scooters::ActiveModel {
            serial_number: Set(input.serial_number.clone()),
            brand: Set(input.brand.clone()),
            model: Set(input.model.clone()),
            top_speed: Set(input.top_speed),
            battery_capacity: Set(input.battery_capacity),
            state_of_charge: Set(input.state_of_charge),
            target_soc_min: Set(input.target_soc_min),
            target_soc_max: Set(input.target_soc_max),
            location: Set(input.location.clone()),
            out_of_service: Set(false),
            mileage: Set(0.0),
            last_maintenance_date: Set(None),
            in_service_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        Scooters::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert scooter")?;

        Ok(true)
    }

    pub async fn get(&self, serial_number: &str) -> Result<Option<Scooter>> {
        Scooters::find_by_id(serial_number)
            .one(&self.conn)
            .await
            .context("Failed to query scooter")
    }

    pub async fn list(&self) -> Result<Vec<Scooter>> {
        Scooters::find()
            .order_by_asc(scooters::Column::Brand)
            .order_by_asc(scooters::Column::Model)
            .order_by_asc(scooters::Column::SerialNumber)
            .all(&self.conn)
            .await
            .context("Failed to list scooters")
    }

    /// Case-insensitive substring search over brand, model and serial.
    pub async fn search(&self, term: &str) -> Result<Vec<Scooter>> {
        let needle = term.to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| {
                format!("{} {} {}", s.brand, s.model, s.serial_number)
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect())
    }

    /// Applies an update under the actor's field whitelist.
    ///
    /// Service engineers may only touch the maintenance fields (charge,
    /// location, out-of-service, mileage, maintenance date); admins may also
    /// change the hardware fields.
    pub async fn update(
        &self,
        serial_number: &str,
        actor_role: Role,
        changes: &ScooterUpdate,
    ) -> Result<ScooterUpdateOutcome> {
        let wants_hardware = changes.has_hardware_fields();
        if actor_role == Role::ServiceEngineer && wants_hardware {
            return Ok(ScooterUpdateOutcome::NoPermittedFields);
        }
        if !changes.has_maintenance_fields() && !wants_hardware {
            return Ok(ScooterUpdateOutcome::NoPermittedFields);
        }

        let Some(row) = Scooters::find_by_id(serial_number)
            .one(&self.conn)
            .await
            .context("Failed to query scooter for update")?
        else {
            return Ok(ScooterUpdateOutcome::NotFound);
        };

        let mut active: scooters::ActiveModel = row.into();

        if let Some(soc) = changes.state_of_charge {
            active.state_of_charge = Set(soc);
        }
        if let Some(location) = &changes.location {
            active.location = Set(location.clone());
        }
        if let Some(oos) = changes.out_of_service {
            active.out_of_service = Set(oos);
        }
        if let Some(mileage) = changes.mileage {
            active.mileage = Set(mileage);
        }
        if let Some(date) = &changes.last_maintenance_date {
            active.last_maintenance_date = Set(Some(date.clone()));
        }

        if actor_role != Role::ServiceEngineer {
            if let Some(brand) = &changes.brand {
                active.brand = Set(brand.clone());
            }
            if let Some(model) = &changes.model {
                active.model = Set(model.clone());
            }
            if let Some(speed) = changes.top_speed {
                active.top_speed = Set(speed);
            }
            if let Some(capacity) = changes.battery_capacity {
                active.battery_capacity = Set(capacity);
            }
            if let Some(min) = changes.target_soc_min {
                active.target_soc_min = Set(min);
            }
            if let Some(max) = changes.target_soc_max {
                active.target_soc_max = Set(max);
            }
        }

        active
            .update(&self.conn)
            .await
            .context("Failed to update scooter")?;

        Ok(ScooterUpdateOutcome::Updated)
    }

    pub async fn delete(&self, serial_number: &str) -> Result<bool> {
        let result = Scooters::delete_by_id(serial_number)
            .exec(&self.conn)
            .await
            .context("Failed to delete scooter")?;

        Ok(result.rows_affected > 0)
    }
}
