use baseseva_shared::{BloodType, User, UserPatch};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{parse_enum, parse_opt_ts, parse_ts, ts};

const USER_COLUMNS: &str = "address, name, email, blood_type, phone, city, age, donation_count,
     last_donation, is_eligible, nft_count, streak, impact_points, profile_complete,
     created_at, updated_at";

impl Database {
    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                user.address,
                user.name,
                user.email,
                user.blood_type.map(|b| b.as_str()),
                user.phone,
                user.city,
                user.age,
                user.donation_count,
                user.last_donation.as_ref().map(ts),
                user.is_eligible,
                user.nft_count,
                user.streak,
                user.impact_points as i64,
                user.profile_complete,
                ts(&user.created_at),
                ts(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Overwrite every mutable column of an existing user.
    pub fn save_user(&self, user: &User) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET
                name = ?2, email = ?3, blood_type = ?4, phone = ?5, city = ?6, age = ?7,
                donation_count = ?8, last_donation = ?9, is_eligible = ?10, nft_count = ?11,
                streak = ?12, impact_points = ?13, profile_complete = ?14, updated_at = ?15
             WHERE address = ?1",
            params![
                user.address,
                user.name,
                user.email,
                user.blood_type.map(|b| b.as_str()),
                user.phone,
                user.city,
                user.age,
                user.donation_count,
                user.last_donation.as_ref().map(ts),
                user.is_eligible,
                user.nft_count,
                user.streak,
                user.impact_points as i64,
                user.profile_complete,
                ts(&user.updated_at),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Fetch a user with the derived flags recomputed for `now`.
    pub fn get_user(&self, address: &str) -> Result<User> {
        let mut user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE address = ?1"),
                params![address],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;
        user.refresh_derived(Utc::now());
        Ok(user)
    }

    /// Create the user on first sight, otherwise apply the non-empty patch.
    ///
    /// Keyed by address, so repeated logins never create a second row.
    pub fn upsert_user_on_login(
        &self,
        address: &str,
        patch: &UserPatch,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let existing = match self.get_user(address) {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(other) => return Err(other),
        };

        match existing {
            Some(mut user) => {
                if !patch.is_empty() {
                    user.apply_patch(patch, now);
                    self.save_user(&user)?;
                } else {
                    user.refresh_derived(now);
                }
                Ok(user)
            }
            None => {
                let mut user = User::new(address, now);
                user.apply_patch(patch, now);
                self.insert_user(&user)?;
                tracing::info!(address, "registered new user");
                Ok(user)
            }
        }
    }

    pub fn update_user_profile(&self, address: &str, patch: &UserPatch) -> Result<User> {
        let mut user = self.get_user(address)?;
        user.apply_patch(patch, Utc::now());
        self.save_user(&user)?;
        Ok(user)
    }

    pub fn increment_nft_count(&self, address: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET nft_count = nft_count + 1, updated_at = ?2 WHERE address = ?1",
            params![address, ts(&Utc::now())],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Users in `city` (case-insensitive) with the given blood type.
    pub fn list_donors_in_city(&self, city: &str, blood_type: BloodType) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE lower(city) = lower(?1) AND blood_type = ?2
             ORDER BY address ASC"
        ))?;
        let rows = stmt.query_map(params![city.trim(), blood_type.as_str()], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let blood_type: Option<String> = row.get(3)?;
    let last_donation: Option<String> = row.get(8)?;
    let impact_points: i64 = row.get(12)?;
    let created_str: String = row.get(14)?;
    let updated_str: String = row.get(15)?;

    Ok(User {
        address: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        blood_type: blood_type
            .map(|s| parse_enum::<BloodType>(3, &s))
            .transpose()?,
        phone: row.get(4)?,
        city: row.get(5)?,
        age: row.get(6)?,
        donation_count: row.get(7)?,
        last_donation: parse_opt_ts(8, last_donation)?,
        is_eligible: row.get(9)?,
        nft_count: row.get(10)?,
        streak: row.get(11)?,
        impact_points: impact_points.max(0) as u64,
        profile_complete: row.get(13)?,
        created_at: parse_ts(14, &created_str)?,
        updated_at: parse_ts(15, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_login_is_idempotent_by_address() {
        let db = db();
        let now = Utc::now();
        let patch = UserPatch {
            name: Some("Ravi".into()),
            ..Default::default()
        };

        let first = db.upsert_user_on_login("0xaaa", &patch, now).unwrap();
        let second = db.upsert_user_on_login("0xaaa", &patch, now).unwrap();
        assert_eq!(first.address, second.address);
        assert_eq!(second.name, "Ravi");

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM users WHERE address = '0xaaa'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_login_with_empty_patch_keeps_profile() {
        let db = db();
        let now = Utc::now();
        db.upsert_user_on_login(
            "0xaaa",
            &UserPatch {
                city: Some("Pune".into()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        let user = db
            .upsert_user_on_login("0xaaa", &UserPatch::default(), now)
            .unwrap();
        assert_eq!(user.city.as_deref(), Some("Pune"));
    }

    #[test]
    fn test_created_user_reads_back_unchanged() {
        use chrono::TimeZone;

        let db = db();
        let now = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let created = db
            .upsert_user_on_login(
                "0xccc",
                &UserPatch {
                    name: Some("Asha".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();

        let loaded = db.get_user("0xccc").unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.created_at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_get_missing_user() {
        assert!(matches!(db().get_user("0xnope"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_save_round_trip() {
        let db = db();
        let now = Utc::now();
        let mut user = User::new("0xbbb", now);
        db.insert_user(&user).unwrap();

        user.record_donation(now, 100);
        db.save_user(&user).unwrap();
        db.increment_nft_count("0xbbb").unwrap();

        let loaded = db.get_user("0xbbb").unwrap();
        assert_eq!(loaded.donation_count, 1);
        assert_eq!(loaded.impact_points, 100);
        assert_eq!(loaded.nft_count, 1);
        assert!(!loaded.is_eligible);
    }

    #[test]
    fn test_list_donors_in_city() {
        let db = db();
        let now = Utc::now();
        for (addr, city, bt) in [
            ("0x1", "Pune", BloodType::ONegative),
            ("0x2", "pune", BloodType::ONegative),
            ("0x3", "Pune", BloodType::APositive),
            ("0x4", "Delhi", BloodType::ONegative),
        ] {
            db.upsert_user_on_login(
                addr,
                &UserPatch {
                    city: Some(city.into()),
                    blood_type: Some(bt),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        }

        let donors = db.list_donors_in_city("Pune", BloodType::ONegative).unwrap();
        let addresses: Vec<_> = donors.iter().map(|u| u.address.as_str()).collect();
        assert_eq!(addresses, vec!["0x1", "0x2"]);
    }
}
