use std::collections::BTreeMap;

use baseseva_shared::{BankStatus, BloodBank, BloodType, Coordinates, InventoryLevel};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::rows::{parse_enum, parse_json, parse_uuid};

const BANK_COLUMNS: &str = "id, name, address, phone, lat, lng, open_hours, blood_types, status,
     rating, verified, emergency, inventory";

impl Database {
    pub fn insert_blood_bank(&self, bank: &BloodBank) -> Result<()> {
        let blood_types = serde_json::to_string(&bank.blood_types)?;
        let inventory = serde_json::to_string(&bank.inventory)?;

        self.conn().execute(
            &format!(
                "INSERT INTO blood_banks ({BANK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                bank.id.to_string(),
                bank.name,
                bank.address,
                bank.phone,
                bank.coordinates.lat,
                bank.coordinates.lng,
                bank.open_hours,
                blood_types,
                bank.status.as_str(),
                bank.rating as f64,
                bank.verified,
                bank.emergency,
                inventory,
            ],
        )?;
        Ok(())
    }

    /// Every bank in the directory, by name. Filtering and distance sorting
    /// happen in the caller, which knows the query origin.
    pub fn list_blood_banks(&self) -> Result<Vec<BloodBank>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {BANK_COLUMNS} FROM blood_banks ORDER BY name ASC"))?;
        let rows = stmt.query_map([], row_to_bank)?;

        let mut banks = Vec::new();
        for row in rows {
            banks.push(row?);
        }
        Ok(banks)
    }

    pub fn count_blood_banks(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM blood_banks", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn row_to_bank(row: &rusqlite::Row<'_>) -> rusqlite::Result<BloodBank> {
    let id_str: String = row.get(0)?;
    let blood_types: String = row.get(7)?;
    let status: String = row.get(8)?;
    let rating: f64 = row.get(9)?;
    let inventory: String = row.get(12)?;

    Ok(BloodBank {
        id: parse_uuid(0, &id_str)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        coordinates: Coordinates::new(row.get(4)?, row.get(5)?),
        open_hours: row.get(6)?,
        blood_types: parse_json::<Vec<BloodType>>(7, &blood_types)?,
        status: parse_enum::<BankStatus>(8, &status)?,
        rating: rating as f32,
        verified: row.get(10)?,
        emergency: row.get(11)?,
        inventory: parse_json::<BTreeMap<BloodType, InventoryLevel>>(12, &inventory)?,
        distance_km: None,
    })
}
