use baseseva_shared::{BloodRequest, BloodType, RequestStatus, Urgency};
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{parse_enum, parse_ts, parse_uuid, ts};

const REQUEST_COLUMNS: &str = "id, requester_address, patient_name, blood_type, hospital, contact,
     description, units_needed, urgency, city, status, verified, created_at, expires_at";

impl Database {
    pub fn insert_blood_request(&self, request: &BloodRequest) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO blood_requests ({REQUEST_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                request.id.to_string(),
                request.requester_address,
                request.patient_name,
                request.blood_type.as_str(),
                request.hospital,
                request.contact,
                request.description,
                request.units_needed,
                request.urgency.as_str(),
                request.city,
                request.status.as_str(),
                request.verified,
                ts(&request.created_at),
                ts(&request.expires_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_blood_request(&self, id: Uuid) -> Result<BloodRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM blood_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Active requests that have not passed `expires_at`, most urgent first,
    /// then newest first. Expired rows stay `active` in storage; they are
    /// only filtered out here.
    pub fn list_active_requests(
        &self,
        blood_type: Option<BloodType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BloodRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM blood_requests
             WHERE status = ?1
               AND expires_at > ?2
               AND (?3 IS NULL OR blood_type = ?3)
             ORDER BY CASE urgency
                        WHEN 'critical' THEN 0
                        WHEN 'urgent' THEN 1
                        ELSE 2
                      END ASC,
                      created_at DESC"
        ))?;

        let rows = stmt.query_map(
            params![
                RequestStatus::Active.as_str(),
                ts(&now),
                blood_type.map(|b| b.as_str()),
            ],
            row_to_request,
        )?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<BloodRequest> {
    let id_str: String = row.get(0)?;
    let blood_type: String = row.get(3)?;
    let urgency: String = row.get(8)?;
    let status: String = row.get(10)?;
    let created_str: String = row.get(12)?;
    let expires_str: String = row.get(13)?;

    Ok(BloodRequest {
        id: parse_uuid(0, &id_str)?,
        requester_address: row.get(1)?,
        patient_name: row.get(2)?,
        blood_type: parse_enum::<BloodType>(3, &blood_type)?,
        hospital: row.get(4)?,
        contact: row.get(5)?,
        description: row.get(6)?,
        units_needed: row.get(7)?,
        urgency: parse_enum::<Urgency>(8, &urgency)?,
        city: row.get(9)?,
        status: parse_enum::<RequestStatus>(10, &status)?,
        verified: row.get(11)?,
        created_at: parse_ts(12, &created_str)?,
        expires_at: parse_ts(13, &expires_str)?,
    })
}
