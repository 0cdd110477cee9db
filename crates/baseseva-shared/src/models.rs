//! Domain records and request payloads exchanged between client and server.
//!
//! Field names follow the backend's snake_case column names so the same
//! structs can be written to SQLite, sent over HTTP and cached locally.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::{DONATION_COOLDOWN_DAYS, REQUEST_TTL_HOURS, STREAK_WINDOW_DAYS};
use crate::types::{
    BankStatus, BloodType, Coordinates, InventoryLevel, NotificationKind, RequestStatus, Urgency,
};

/// Drop sub-microsecond digits, the precision timestamps are stored with,
/// so a record reads back exactly as it was created.
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// `Utc::now()` at stored precision.
pub fn timestamp_now() -> DateTime<Utc> {
    stored_precision(Utc::now())
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A donor profile. The wallet address is the unique key on both sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub address: String,
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub blood_type: Option<BloodType>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub age: Option<u32>,
    #[serde(default)]
    pub donation_count: u32,
    pub last_donation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_eligible: bool,
    #[serde(default)]
    pub nft_count: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub impact_points: u64,
    #[serde(default)]
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh record for an address seen for the first time.
    pub fn new(address: impl Into<String>, now: DateTime<Utc>) -> Self {
        let now = stored_precision(now);
        Self {
            address: address.into(),
            name: String::new(),
            email: None,
            blood_type: None,
            phone: None,
            city: None,
            age: None,
            donation_count: 0,
            last_donation: None,
            is_eligible: true,
            nft_count: 0,
            streak: 0,
            impact_points: 0,
            profile_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the fields present in `patch`; absent fields are left alone.
    pub fn apply_patch(&mut self, patch: &UserPatch, now: DateTime<Utc>) {
        let now = stored_precision(now);
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref email) = patch.email {
            self.email = Some(email.clone());
        }
        if let Some(blood_type) = patch.blood_type {
            self.blood_type = Some(blood_type);
        }
        if let Some(ref phone) = patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(ref city) = patch.city {
            self.city = Some(city.clone());
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        self.updated_at = now;
        self.refresh_derived(now);
    }

    /// Account for a donation made at `at` worth `points` impact points.
    pub fn record_donation(&mut self, at: DateTime<Utc>, points: u64) {
        let at = stored_precision(at);
        self.streak = match self.last_donation {
            Some(prev) if at - prev <= Duration::days(STREAK_WINDOW_DAYS) => self.streak + 1,
            _ => 1,
        };
        self.donation_count += 1;
        self.impact_points += points;
        self.last_donation = Some(match self.last_donation {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        self.updated_at = timestamp_now();
        self.refresh_derived(self.updated_at);
    }

    /// Recompute `is_eligible` and `profile_complete`.
    pub fn refresh_derived(&mut self, now: DateTime<Utc>) {
        self.is_eligible = self.eligible_at(now);
        self.profile_complete = !self.name.trim().is_empty()
            && self.blood_type.is_some()
            && self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
            && self.city.as_deref().is_some_and(|c| !c.trim().is_empty());
    }

    pub fn eligible_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_donation {
            Some(last) => now - last >= Duration::days(DONATION_COOLDOWN_DAYS),
            None => true,
        }
    }
}

/// Profile fields a donor can edit. Used for login-time registration and
/// later profile updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 18, max = 65))]
    pub age: Option<u32>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.blood_type.is_none()
            && self.phone.is_none()
            && self.city.is_none()
            && self.age.is_none()
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub address: String,
    #[serde(default)]
    #[validate]
    pub profile: UserPatch,
}

// ---------------------------------------------------------------------------
// Blood requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodRequest {
    pub id: Uuid,
    pub requester_address: String,
    pub patient_name: String,
    pub blood_type: BloodType,
    pub hospital: String,
    pub contact: String,
    pub description: String,
    pub units_needed: u32,
    pub urgency: Urgency,
    pub city: String,
    pub status: RequestStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BloodRequest {
    /// Build an active, unverified request that expires after the fixed window.
    pub fn open(new: NewBloodRequest, now: DateTime<Utc>) -> Self {
        let now = stored_precision(now);
        let NewBloodRequest {
            requester_address,
            draft,
        } = new;
        Self {
            id: Uuid::new_v4(),
            requester_address,
            patient_name: draft.patient_name,
            blood_type: draft.blood_type,
            hospital: draft.hospital,
            contact: draft.contact,
            description: draft.description,
            units_needed: draft.units_needed,
            urgency: draft.urgency,
            city: draft.city,
            status: RequestStatus::Active,
            verified: false,
            created_at: now,
            expires_at: now + Duration::hours(REQUEST_TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Status as it should be displayed. The stored status is never rewritten
    /// when the clock passes `expires_at`; this only reports it.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RequestStatus {
        if self.status == RequestStatus::Active && self.is_expired(now) {
            RequestStatus::Expired
        } else {
            self.status
        }
    }
}

fn default_units() -> u32 {
    1
}

/// What a requester fills in. The requester's address is added by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct BloodRequestDraft {
    #[serde(default)]
    pub patient_name: String,
    pub blood_type: BloodType,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub contact: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[serde(default = "default_units")]
    #[validate(range(min = 1, max = 50))]
    pub units_needed: u32,
    pub urgency: Urgency,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
}

impl BloodRequestDraft {
    pub fn new(
        blood_type: BloodType,
        city: impl Into<String>,
        urgency: Urgency,
        description: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: String::new(),
            blood_type,
            hospital: String::new(),
            contact: String::new(),
            description: description.into(),
            units_needed: 1,
            urgency,
            city: city.into(),
        }
    }
}

/// Body of `POST /requests`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewBloodRequest {
    #[validate(length(min = 1))]
    pub requester_address: String,
    #[serde(flatten)]
    #[validate]
    pub draft: BloodRequestDraft,
}

/// Query parameters of `GET /requests`. The geo fields are accepted but not
/// applied: requests carry a city, not coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
}

// ---------------------------------------------------------------------------
// Donations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    pub id: Uuid,
    pub donor_address: String,
    pub blood_type: BloodType,
    pub donation_date: DateTime<Utc>,
    pub certificate_url: Option<String>,
    pub nft_token_id: Option<String>,
    pub transaction_hash: Option<String>,
    pub verified: bool,
    pub impact_points: u64,
}

impl Donation {
    pub fn is_minted(&self) -> bool {
        self.nft_token_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct DonationDraft {
    pub blood_type: BloodType,
    /// Defaults to the time the server records it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_date: Option<DateTime<Utc>>,
}

/// Body of `POST /donations`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewDonation {
    #[validate(length(min = 1))]
    pub donor_address: String,
    #[serde(flatten)]
    #[validate]
    pub draft: DonationDraft,
}

// ---------------------------------------------------------------------------
// Blood banks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodBank {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub coordinates: Coordinates,
    pub open_hours: String,
    pub blood_types: Vec<BloodType>,
    pub status: BankStatus,
    pub rating: f32,
    pub verified: bool,
    pub emergency: bool,
    pub inventory: BTreeMap<BloodType, InventoryLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl BloodBank {
    pub fn stocks(&self, blood_type: BloodType) -> bool {
        self.blood_types.contains(&blood_type)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BankFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_only: Option<bool>,
}

impl BankFilters {
    pub fn origin(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppNotification {
    pub id: Uuid,
    pub user_address: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl AppNotification {
    pub fn new(
        user_address: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_address: user_address.into(),
            kind,
            title: title.into(),
            message: message.into(),
            data,
            read: false,
            created_at: timestamp_now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// A certificate image picked by the donor, before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Response of `POST /upload/certificate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_name: String,
    pub public_url: String,
    pub file_size: u64,
    pub file_type: String,
}

/// Response of `GET /upload/:file_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub public_url: String,
    pub file_size: u64,
    pub file_type: String,
    pub wallet_address: String,
    pub donation_id: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

/// Response of `DELETE /upload/:file_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    pub file_name: String,
    pub deleted: bool,
}

/// Body of `POST /blockchain/mint-certificate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct MintCertificateRequest {
    pub donation_id: Uuid,
    #[validate(length(min = 1))]
    pub wallet_address: String,
    pub blood_type: BloodType,
    pub donation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
}

/// Result of a certificate mint. `simulated` is true for every receipt the
/// backend can currently produce: no chain is contacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MintReceipt {
    pub donation_id: Uuid,
    pub token_id: String,
    pub transaction_hash: String,
    pub network: String,
    pub certificate_url: Option<String>,
    pub minted_at: DateTime<Utc>,
    pub simulated: bool,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
