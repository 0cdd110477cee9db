use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS certificates (
    file_name      TEXT PRIMARY KEY NOT NULL,   -- name under the storage root
    wallet_address TEXT NOT NULL,
    donation_id    TEXT,                        -- UUID v4, nullable
    file_size      INTEGER NOT NULL,
    file_type      TEXT NOT NULL,               -- MIME type
    uploaded_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_certificates_wallet ON certificates(wallet_address);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
