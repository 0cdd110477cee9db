use baseseva_shared::{BloodType, Donation};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{parse_enum, parse_ts, parse_uuid, ts};

const DONATION_COLUMNS: &str = "id, donor_address, blood_type, donation_date, certificate_url,
     nft_token_id, transaction_hash, verified, impact_points";

impl Database {
    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO donations ({DONATION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                donation.id.to_string(),
                donation.donor_address,
                donation.blood_type.as_str(),
                ts(&donation.donation_date),
                donation.certificate_url,
                donation.nft_token_id,
                donation.transaction_hash,
                donation.verified,
                donation.impact_points as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_donation(&self, id: Uuid) -> Result<Donation> {
        self.conn()
            .query_row(
                &format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"),
                params![id.to_string()],
                row_to_donation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// A donor's donations, newest first.
    pub fn list_donations_for(&self, donor_address: &str) -> Result<Vec<Donation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations
             WHERE donor_address = ?1
             ORDER BY donation_date DESC"
        ))?;
        let rows = stmt.query_map(params![donor_address], row_to_donation)?;

        let mut donations = Vec::new();
        for row in rows {
            donations.push(row?);
        }
        Ok(donations)
    }

    /// Returns `true` if the donation exists and was updated.
    pub fn attach_certificate_url(&self, id: Uuid, url: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE donations SET certificate_url = ?2 WHERE id = ?1",
            params![id.to_string(), url],
        )?;
        Ok(affected > 0)
    }

    /// Record a mint. Only succeeds while `nft_token_id` is still unset, so a
    /// token id is never reassigned; returns `false` otherwise.
    pub fn mark_minted(
        &self,
        id: Uuid,
        token_id: &str,
        transaction_hash: &str,
        certificate_url: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE donations
             SET nft_token_id = ?2,
                 transaction_hash = ?3,
                 certificate_url = COALESCE(?4, certificate_url),
                 verified = 1
             WHERE id = ?1 AND nft_token_id IS NULL",
            params![id.to_string(), token_id, transaction_hash, certificate_url],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_donation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Donation> {
    let id_str: String = row.get(0)?;
    let blood_type: String = row.get(2)?;
    let date_str: String = row.get(3)?;
    let impact_points: i64 = row.get(8)?;

    Ok(Donation {
        id: parse_uuid(0, &id_str)?,
        donor_address: row.get(1)?,
        blood_type: parse_enum::<BloodType>(2, &blood_type)?,
        donation_date: parse_ts(3, &date_str)?,
        certificate_url: row.get(4)?,
        nft_token_id: row.get(5)?,
        transaction_hash: row.get(6)?,
        verified: row.get(7)?,
        impact_points: impact_points.max(0) as u64,
    })
}
