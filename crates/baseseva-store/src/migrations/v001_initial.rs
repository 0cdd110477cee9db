//! v001 -- Initial schema creation.
//!
//! Creates the local key/value table and the five backend tables: `users`,
//! `blood_requests`, `donations`, `blood_banks` and `notifications`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Local key/value store (client session cache)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,              -- JSON blob
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    address          TEXT PRIMARY KEY NOT NULL,   -- 0x-prefixed wallet address
    name             TEXT NOT NULL DEFAULT '',
    email            TEXT,
    blood_type       TEXT,
    phone            TEXT,
    city             TEXT,
    age              INTEGER,
    donation_count   INTEGER NOT NULL DEFAULT 0,
    last_donation    TEXT,
    is_eligible      INTEGER NOT NULL DEFAULT 1,
    nft_count        INTEGER NOT NULL DEFAULT 0,
    streak           INTEGER NOT NULL DEFAULT 0,
    impact_points    INTEGER NOT NULL DEFAULT 0,
    profile_complete INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_city_type ON users(city, blood_type);

-- ----------------------------------------------------------------
-- Blood requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS blood_requests (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    requester_address TEXT NOT NULL,
    patient_name      TEXT NOT NULL DEFAULT '',
    blood_type        TEXT NOT NULL,
    hospital          TEXT NOT NULL DEFAULT '',
    contact           TEXT NOT NULL DEFAULT '',
    description       TEXT NOT NULL,
    units_needed      INTEGER NOT NULL CHECK (units_needed >= 1),
    urgency           TEXT NOT NULL,
    city              TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'active',
    verified          INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    expires_at        TEXT NOT NULL,

    CHECK (expires_at > created_at),
    FOREIGN KEY (requester_address) REFERENCES users(address)
);

CREATE INDEX IF NOT EXISTS idx_requests_status_expiry
    ON blood_requests(status, expires_at);

-- ----------------------------------------------------------------
-- Donations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS donations (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    donor_address    TEXT NOT NULL,
    blood_type       TEXT NOT NULL,
    donation_date    TEXT NOT NULL,
    certificate_url  TEXT,
    nft_token_id     TEXT,
    transaction_hash TEXT,
    verified         INTEGER NOT NULL DEFAULT 0,
    impact_points    INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (donor_address) REFERENCES users(address)
);

CREATE INDEX IF NOT EXISTS idx_donations_donor_date
    ON donations(donor_address, donation_date DESC);

-- ----------------------------------------------------------------
-- Blood banks (directory, read-only for clients)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS blood_banks (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    name        TEXT NOT NULL,
    address     TEXT NOT NULL,
    phone       TEXT NOT NULL,
    lat         REAL NOT NULL,
    lng         REAL NOT NULL,
    open_hours  TEXT NOT NULL,
    blood_types TEXT NOT NULL,                -- JSON array
    status      TEXT NOT NULL,
    rating      REAL NOT NULL DEFAULT 0,
    verified    INTEGER NOT NULL DEFAULT 0,
    emergency   INTEGER NOT NULL DEFAULT 0,
    inventory   TEXT NOT NULL                 -- JSON object blood_type -> level
);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_address TEXT NOT NULL,
    kind         TEXT NOT NULL,
    title        TEXT NOT NULL,
    message      TEXT NOT NULL,
    data         TEXT NOT NULL DEFAULT 'null', -- JSON
    is_read      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (user_address) REFERENCES users(address)
);

CREATE INDEX IF NOT EXISTS idx_notifications_user_ts
    ON notifications(user_address, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
