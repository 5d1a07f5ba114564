use std::sync::Arc;

use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::crypto::FieldCipher;
use crate::entities::{prelude::*, travellers};

/// Traveller record with sensitive fields recovered to plaintext.
#[derive(Debug, Clone)]
pub struct Traveller {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: String,
    pub gender: String,
    pub street: String,
    pub house_number: String,
    pub zip_code: String,
    pub city: String,
    pub email: String,
    pub mobile_phone: String,
    pub driving_licence: String,
    pub registered_at: String,
}

/// Input for registering a traveller; the repository assigns the customer id.
#[derive(Debug, Clone)]
pub struct NewTraveller {
    pub first_name: String,
    pub last_name: String,
    pub birthday: String,
    pub gender: String,
    pub street: String,
    pub house_number: String,
    pub zip_code: String,
    pub city: String,
    pub email: String,
    pub mobile_phone: String,
    pub driving_licence: String,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TravellerUpdate {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
}

pub struct TravellerRepository {
    conn: DatabaseConnection,
    cipher: Arc<FieldCipher>,
}

impl TravellerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, cipher: Arc<FieldCipher>) -> Self {
        Self { conn, cipher }
    }

    /// Inserts a traveller and returns the generated customer id.
    pub async fn insert(&self, input: &NewTraveller) -> Result<String> {
        let customer_id: String = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();

        let active = travellers::ActiveModel {
            customer_id: Set(customer_id.clone()),
            first_name: Set(input.first_name.clone()),
            last_name: Set(input.last_name.clone()),
            birthday: Set(input.birthday.clone()),
            gender: Set(input.gender.clone()),
            street_cipher: Set(self.cipher.encrypt(&input.street)?),
            house_number_cipher: Set(self.cipher.encrypt(&input.house_number)?),
            zip_code: Set(input.zip_code.clone()),
            city: Set(input.city.clone()),
            email_cipher: Set(self.cipher.encrypt(&input.email)?),
            phone_cipher: Set(self.cipher.encrypt(&input.mobile_phone)?),
            driving_licence: Set(input.driving_licence.clone()),
            registered_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        Travellers::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert traveller")?;

        Ok(customer_id)
    }

    pub async fn get(&self, customer_id: &str) -> Result<Option<Traveller>> {
        let row = Travellers::find_by_id(customer_id)
            .one(&self.conn)
            .await
            .context("Failed to query traveller")?;

        Ok(row.map(|r| self.to_traveller(r)))
    }

    pub async fn list(&self) -> Result<Vec<Traveller>> {
        let rows = Travellers::find()
            .order_by_asc(travellers::Column::LastName)
            .order_by_asc(travellers::Column::FirstName)
            .all(&self.conn)
            .await
            .context("Failed to list travellers")?;

        Ok(rows.into_iter().map(|r| self.to_traveller(r)).collect())
    }

    /// Case-insensitive substring search over name, customer id and email.
    ///
    /// Encrypted columns cannot be matched in SQL, so the search decrypts
    /// in-process over the full (small) table.
    pub async fn search(&self, term: &str) -> Result<Vec<Traveller>> {
        let needle = term.to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| {
                let haystack = format!(
                    "{} {} {} {}",
                    t.first_name, t.last_name, t.customer_id, t.email
                )
                .to_lowercase();
                haystack.contains(&needle)
            })
            .collect())
    }

    pub async fn update(&self, customer_id: &str, changes: &TravellerUpdate) -> Result<bool> {
        let Some(row) = Travellers::find_by_id(customer_id)
            .one(&self.conn)
            .await
            .context("Failed to query traveller for update")?
        else {
            return Ok(false);
        };

        let mut active: travellers::ActiveModel = row.into();
        if let Some(street) = &changes.street {
            active.street_cipher = Set(self.cipher.encrypt(street)?);
        }
        if let Some(house) = &changes.house_number {
            active.house_number_cipher = Set(self.cipher.encrypt(house)?);
        }
        if let Some(zip) = &changes.zip_code {
            active.zip_code = Set(zip.clone());
        }
        if let Some(city) = &changes.city {
            active.city = Set(city.clone());
        }
        if let Some(email) = &changes.email {
            active.email_cipher = Set(self.cipher.encrypt(email)?);
        }
        if let Some(phone) = &changes.mobile_phone {
            active.phone_cipher = Set(self.cipher.encrypt(phone)?);
        }

        active
            .update(&self.conn)
            .await
            .context("Failed to update traveller")?;

        Ok(true)
    }

    pub async fn delete(&self, customer_id: &str) -> Result<bool> {
        let result = Travellers::delete_by_id(customer_id)
            .exec(&self.conn)
            .await
            .context("Failed to delete traveller")?;

        Ok(result.rows_affected > 0)
    }

    fn to_traveller(&self, row: travellers::Model) -> Traveller {
        Traveller {
            customer_id: row.customer_id,
            first_name: row.first_name,
            last_name: row.last_name,
            birthday: row.birthday,
            gender: row.gender,
            street: self.cipher.decrypt_lossy(&row.street_cipher),
            house_number: self.cipher.decrypt_lossy(&row.house_number_cipher),
            zip_code: row.zip_code,
            city: row.city,
            email: self.cipher.decrypt_lossy(&row.email_cipher),
            mobile_phone: self.cipher.decrypt_lossy(&row.phone_cipher),
            driving_licence: row.driving_licence,
            registered_at: row.registered_at,
        }
    }
}
