// src/seed.rs
//
// Idempotent first-boot seeding, invoked once at process start. Creates the
// indexes that carry the store-level invariants and inserts the default
// reference data if it is absent. Safe to run on every start.
use bcrypt::{hash, DEFAULT_COST};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::pump::Pump;
use crate::models::settings::{
    Setting, MPESA_CONSUMER_KEY, MPESA_CONSUMER_SECRET, MPESA_PASSKEY,
    MPESA_SIMULATION_DELAY_SECS, MPESA_TILL_NUMBER,
};
use crate::models::shift::Shift;
use crate::models::user::{Role, User};

pub async fn initialize_db(db: &Database) -> Result<()> {
    create_indexes(db).await?;
    seed_shifts(db).await?;
    seed_pumps(db).await?;
    seed_users(db).await?;
    seed_settings(db).await?;
    Ok(())
}

async fn create_indexes(db: &Database) -> Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    let users = db.collection::<User>("users");
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "mobile_no": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<Pump>("pumps")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "pump_no": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<Shift>("shifts")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "shift_name": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    // The one-open-shift-per-pump invariant. Concurrent opens race on this
    // index, not on application state: exactly one insert wins, the rest
    // surface as duplicate-key conflicts.
    db.collection::<crate::models::shift::PumpShift>("pump_shifts")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "pump_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "is_closed": false })
                        .build(),
                )
                .build(),
        )
        .await?;

    db.collection::<crate::models::sale::SalesRecord>("sales_records")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "sale_id_no": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    Ok(())
}

async fn seed_shifts(db: &Database) -> Result<()> {
    let shifts: Collection<Shift> = db.collection("shifts");
    for shift_name in ["Day Shift", "Night Shift"] {
        let exists = shifts
            .find_one(doc! { "shift_name": shift_name })
            .await?
            .is_some();
        if !exists {
            shifts
                .insert_one(&Shift {
                    _id: None,
                    shift_name: shift_name.to_string(),
                })
                .await?;
            info!("Seeded shift template: {}", shift_name);
        }
    }
    Ok(())
}

async fn seed_pumps(db: &Database) -> Result<()> {
    let pumps: Collection<Pump> = db.collection("pumps");
    for (pump_no, pump_name) in default_pumps() {
        let exists = pumps.find_one(doc! { "pump_no": pump_no }).await?.is_some();
        if !exists {
            pumps
                .insert_one(&Pump {
                    _id: None,
                    pump_no: pump_no.to_string(),
                    pump_name: pump_name.to_string(),
                    is_active: true,
                })
                .await?;
            info!("Seeded pump: {} ({})", pump_no, pump_name);
        }
    }
    Ok(())
}

async fn seed_users(db: &Database) -> Result<()> {
    let users: Collection<User> = db.collection("users");

    // Bootstrap credentials; rotate them before exposing the service.
    let defaults = [
        (
            "System Administrator",
            "admin",
            "0700123456",
            "admin123",
            Role::Admin,
        ),
        (
            "John Doe",
            "attendant1",
            "0711223344",
            "pass123",
            Role::PumpAttendant,
        ),
    ];

    for (full_name, username, mobile_no, password, role) in defaults {
        let exists = users
            .find_one(doc! { "username": username })
            .await?
            .is_some();
        if exists {
            continue;
        }

        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

        users
            .insert_one(&User {
                _id: None,
                full_name: full_name.to_string(),
                username: username.to_string(),
                password_hash,
                mobile_no: mobile_no.to_string(),
                role,
                is_active: true,
            })
            .await?;
        info!("Seeded user: {} ({})", username, role.as_name());
    }
    Ok(())
}

async fn seed_settings(db: &Database) -> Result<()> {
    let settings: Collection<Setting> = db.collection("settings");
    for (key, value) in default_settings() {
        let exists = settings.find_one(doc! { "_id": key }).await?.is_some();
        if !exists {
            settings
                .insert_one(&Setting {
                    setting_key: key.to_string(),
                    setting_value: value.to_string(),
                })
                .await?;
            info!("Seeded setting: {}", key);
        }
    }
    Ok(())
}

fn default_pumps() -> [(&'static str, &'static str); 3] {
    [
        ("P1", "Pump One"),
        ("P2", "Pump Two"),
        ("P3", "Pump Three"),
    ]
}

fn default_settings() -> [(&'static str, &'static str); 5] {
    [
        (MPESA_TILL_NUMBER, "174379"),
        (MPESA_CONSUMER_KEY, "mock_key"),
        (MPESA_CONSUMER_SECRET, "mock_secret"),
        (MPESA_PASSKEY, "mock_passkey"),
        (MPESA_SIMULATION_DELAY_SECS, "5"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_cover_simulator_needs() {
        let defaults = default_settings();
        let keys: Vec<&str> = defaults.iter().map(|(k, _)| *k).collect();

        assert!(keys.contains(&MPESA_TILL_NUMBER));
        assert!(keys.contains(&MPESA_PASSKEY));
        assert!(keys.contains(&MPESA_SIMULATION_DELAY_SECS));

        let delay = defaults
            .iter()
            .find(|(k, _)| *k == MPESA_SIMULATION_DELAY_SECS)
            .map(|(_, v)| v.parse::<u64>().unwrap())
            .unwrap();
        assert_eq!(delay, 5);
    }

    #[test]
    fn default_pumps_have_unique_numbers() {
        let pumps = default_pumps();
        let mut numbers: Vec<&str> = pumps.iter().map(|(no, _)| *no).collect();
        numbers.dedup();
        assert_eq!(numbers.len(), pumps.len());
    }
}
