//! Metadata for certificate files kept by the server's file store.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::rows::{parse_ts, parse_uuid, ts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub file_name: String,
    pub wallet_address: String,
    pub donation_id: Option<Uuid>,
    pub file_size: u64,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Database {
    pub fn insert_certificate(&self, record: &CertificateRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO certificates
                (file_name, wallet_address, donation_id, file_size, file_type, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.file_name,
                record.wallet_address,
                record.donation_id.map(|id| id.to_string()),
                record.file_size as i64,
                record.file_type,
                ts(&record.uploaded_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_certificate(&self, file_name: &str) -> Result<Option<CertificateRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT file_name, wallet_address, donation_id, file_size, file_type, uploaded_at
                 FROM certificates WHERE file_name = ?1",
                params![file_name],
                row_to_certificate,
            )
            .optional()?;
        Ok(record)
    }

    /// Returns `true` if a record was removed.
    pub fn delete_certificate(&self, file_name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM certificates WHERE file_name = ?1",
            params![file_name],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_certificate(row: &rusqlite::Row<'_>) -> rusqlite::Result<CertificateRecord> {
    let donation_id: Option<String> = row.get(2)?;
    let file_size: i64 = row.get(3)?;
    let uploaded_str: String = row.get(5)?;

    Ok(CertificateRecord {
        file_name: row.get(0)?,
        wallet_address: row.get(1)?,
        donation_id: donation_id.map(|s| parse_uuid(2, &s)).transpose()?,
        file_size: file_size.max(0) as u64,
        file_type: row.get(4)?,
        uploaded_at: parse_ts(5, &uploaded_str)?,
    })
}
