//! In-memory session state held by [`DataContext`](crate::context::DataContext).

use baseseva_shared::{
    AppNotification, BloodBank, BloodRequest, Coordinates, Donation, LocationPermission,
    NetworkStatus, NotificationPermission, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime facts about the device and the last sync.
#[derive(Debug, Clone, PartialEq)]
pub struct AppData {
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub network_status: NetworkStatus,
    /// Never persisted; re-acquired each session.
    pub location: Option<Coordinates>,
    pub location_permission: LocationPermission,
    pub notification_permission: NotificationPermission,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            is_online: true,
            last_sync: None,
            network_status: NetworkStatus::Online,
            location: None,
            location_permission: LocationPermission::Prompt,
            notification_permission: NotificationPermission::Default,
        }
    }
}

impl AppData {
    pub fn apply(&mut self, patch: &AppDataPatch) {
        if let Some(is_online) = patch.is_online {
            self.is_online = is_online;
        }
        if let Some(last_sync) = patch.last_sync {
            self.last_sync = last_sync;
        }
        if let Some(status) = patch.network_status {
            self.network_status = status;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(permission) = patch.location_permission {
            self.location_permission = permission;
        }
        if let Some(permission) = patch.notification_permission {
            self.notification_permission = permission;
        }
    }

    pub fn persisted(&self) -> PersistedAppData {
        PersistedAppData {
            is_online: self.is_online,
            last_sync: self.last_sync,
            network_status: self.network_status,
            notification_permission: self.notification_permission,
        }
    }

    /// Rebuild from storage. Location state always starts over.
    pub fn from_persisted(stored: PersistedAppData) -> Self {
        Self {
            is_online: stored.is_online,
            last_sync: stored.last_sync,
            network_status: stored.network_status,
            notification_permission: stored.notification_permission,
            ..Self::default()
        }
    }
}

/// The subset of [`AppData`] written to the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAppData {
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub network_status: NetworkStatus,
    pub notification_permission: NotificationPermission,
}

/// Partial update for [`AppData`]. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppDataPatch {
    pub is_online: Option<bool>,
    pub last_sync: Option<Option<DateTime<Utc>>>,
    pub network_status: Option<NetworkStatus>,
    pub location: Option<Option<Coordinates>>,
    pub location_permission: Option<LocationPermission>,
    pub notification_permission: Option<NotificationPermission>,
}

/// Everything the UI renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub user: Option<User>,
    pub blood_requests: Vec<BloodRequest>,
    pub donations: Vec<Donation>,
    pub blood_banks: Vec<BloodBank>,
    pub notifications: Vec<AppNotification>,
    pub app_data: AppData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_not_persisted() {
        let mut data = AppData::default();
        data.apply(&AppDataPatch {
            location: Some(Some(Coordinates::new(18.52, 73.85))),
            location_permission: Some(LocationPermission::Granted),
            notification_permission: Some(NotificationPermission::Granted),
            ..Default::default()
        });

        let json = serde_json::to_value(data.persisted()).unwrap();
        assert!(json.get("location").is_none());

        let restored = AppData::from_persisted(data.persisted());
        assert_eq!(restored.location, None);
        assert_eq!(restored.location_permission, LocationPermission::Prompt);
        assert_eq!(
            restored.notification_permission,
            NotificationPermission::Granted
        );
    }

    #[test]
    fn test_patch_can_clear_last_sync() {
        let mut data = AppData {
            last_sync: Some(Utc::now()),
            ..Default::default()
        };
        data.apply(&AppDataPatch::default());
        assert!(data.last_sync.is_some());

        data.apply(&AppDataPatch {
            last_sync: Some(None),
            ..Default::default()
        });
        assert!(data.last_sync.is_none());
    }
}
