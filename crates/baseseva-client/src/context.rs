//! Session and cache container.
//!
//! [`DataContext`] owns the signed-in user, the four cached collections and
//! [`AppData`]. The user and the persisted part of `AppData` are written
//! through to the [`LocalStore`] on every change. Collections are replaced
//! wholesale by the `refresh_*` operations; a response older than the last
//! applied one for the same collection is discarded.
//!
//! Operations that need a user return `false`/`None` without touching the
//! network when nobody is signed in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use baseseva_shared::constants::{APP_DATA_KEY, SESSION_KEY, USER_KEY};
use baseseva_shared::{
    AppNotification, BankFilters, BloodBank, BloodRequest, BloodRequestDraft, CertificateFile,
    Donation, DonationDraft, MintCertificateRequest, MintReceipt, NewBloodRequest, NewDonation,
    RequestFilters, User, UserPatch,
};
use baseseva_store::LocalStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthProvider;
use crate::events::{Collection, DataEvent};
use crate::gateway::Gateway;
use crate::state::{AppData, AppDataPatch, PersistedAppData, Snapshot};

const EVENT_CAPACITY: usize = 64;

/// Result of [`DataContext::sync_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Offline or nobody signed in. No requests were made.
    Skipped,
    /// Another sync was still in flight. No requests were made.
    AlreadyRunning,
    /// The session was cleared while the refreshes were in flight. Nothing
    /// was stamped or persisted.
    Interrupted,
    Completed { at: DateTime<Utc> },
}

struct Inner {
    snapshot: Snapshot,
    /// Generation of the last response applied, per [`Collection`].
    applied: [u64; 4],
}

pub struct DataContext {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn LocalStore>,
    inner: Mutex<Inner>,
    generation: AtomicU64,
    /// Bumped by [`DataContext::clear_user_data`].
    session: AtomicU64,
    sync_guard: tokio::sync::Mutex<()>,
    location_guard: tokio::sync::Mutex<()>,
    online_tx: watch::Sender<bool>,
    events: broadcast::Sender<DataEvent>,
}

impl DataContext {
    /// Build the container and hydrate it from `store`. Corrupt entries are
    /// removed and the matching state starts empty.
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<dyn LocalStore>) -> Self {
        let user = load_json::<User>(store.as_ref(), USER_KEY);
        let app_data = load_json::<PersistedAppData>(store.as_ref(), APP_DATA_KEY)
            .map(AppData::from_persisted)
            .unwrap_or_default();

        if let Some(ref user) = user {
            info!(address = %user.address, "Restored session");
        }

        let (online_tx, _) = watch::channel(app_data.is_online);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            gateway,
            store,
            inner: Mutex::new(Inner {
                snapshot: Snapshot {
                    user,
                    app_data,
                    ..Snapshot::default()
                },
                applied: [0; 4],
            }),
            generation: AtomicU64::new(0),
            session: AtomicU64::new(0),
            sync_guard: tokio::sync::Mutex::new(()),
            location_guard: tokio::sync::Mutex::new(()),
            online_tx,
            events,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().snapshot.user.clone()
    }

    pub fn blood_requests(&self) -> Vec<BloodRequest> {
        self.lock().snapshot.blood_requests.clone()
    }

    pub fn donations(&self) -> Vec<Donation> {
        self.lock().snapshot.donations.clone()
    }

    pub fn blood_banks(&self) -> Vec<BloodBank> {
        self.lock().snapshot.blood_banks.clone()
    }

    pub fn notifications(&self) -> Vec<AppNotification> {
        self.lock().snapshot.notifications.clone()
    }

    pub fn app_data(&self) -> AppData {
        self.lock().snapshot.app_data.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.events.subscribe()
    }

    /// Follows `app_data().is_online`.
    pub fn subscribe_online(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    // -- Local mutations -----------------------------------------------------

    /// Merge `patch` into the loaded user and persist the result. Returns
    /// `false` when no user is loaded.
    pub fn update_user(&self, patch: &UserPatch) -> bool {
        {
            let mut inner = self.lock();
            let Some(mut user) = inner.snapshot.user.clone() else {
                debug!("update_user ignored: no user loaded");
                return false;
            };
            user.apply_patch(patch, Utc::now());
            self.persist_json(USER_KEY, &user);
            inner.snapshot.user = Some(user);
        }
        self.emit(DataEvent::UserChanged);
        true
    }

    pub fn update_app_data(&self, patch: AppDataPatch) {
        let is_online = {
            let mut inner = self.lock();
            let mut app_data = inner.snapshot.app_data.clone();
            app_data.apply(&patch);
            self.persist_json(APP_DATA_KEY, &app_data.persisted());
            let is_online = app_data.is_online;
            inner.snapshot.app_data = app_data;
            is_online
        };
        self.online_tx.send_if_modified(|current| {
            let changed = *current != is_online;
            *current = is_online;
            changed
        });
        self.emit(DataEvent::AppDataChanged);
    }

    /// Sign out locally: forget the user and their collections and remove
    /// every persisted key.
    pub fn clear_user_data(&self) {
        {
            let mut inner = self.lock();
            self.session.fetch_add(1, Ordering::SeqCst);
            // In-flight refreshes for the old user must not land afterwards.
            let barrier = self.next_generation();
            inner.applied[Collection::Donations.index()] = barrier;
            inner.applied[Collection::Notifications.index()] = barrier;

            inner.snapshot.user = None;
            inner.snapshot.donations = Vec::new();
            inner.snapshot.notifications = Vec::new();
            inner.snapshot.app_data.last_sync = None;

            for key in [SESSION_KEY, USER_KEY, APP_DATA_KEY] {
                if let Err(e) = self.store.remove(key) {
                    warn!(key, error = %e, "Failed to remove persisted key");
                }
            }
        }
        info!("Session cleared");
        self.emit(DataEvent::SessionCleared);
    }

    /// Whether a previous login left a session marker behind.
    pub fn has_session(&self) -> bool {
        matches!(self.store.get(SESSION_KEY), Ok(Some(_)))
    }

    // -- Session -------------------------------------------------------------

    pub async fn login_user(&self, address: &str, profile: Option<UserPatch>) -> bool {
        match self.gateway.login(address, profile.as_ref()).await.into_result() {
            Ok(user) => {
                info!(address = %user.address, "Logged in");
                self.set_user(user);
                if let Err(e) = self.store.set(SESSION_KEY, "true") {
                    warn!(error = %e, "Failed to persist session marker");
                }
                true
            }
            Err(error) => {
                warn!(address, %error, "Login failed");
                false
            }
        }
    }

    /// Connect the wallet, then log in with its address.
    pub async fn login_with(&self, auth: &dyn AuthProvider, profile: Option<UserPatch>) -> bool {
        match auth.connect().await {
            Ok(address) => self.login_user(&address, profile).await,
            Err(e) => {
                warn!(provider = auth.name(), error = %e, "Wallet connection failed");
                false
            }
        }
    }

    pub async fn logout(&self, auth: &dyn AuthProvider) {
        auth.disconnect().await;
        self.clear_user_data();
    }

    /// Push profile edits, then keep the server's copy.
    pub async fn save_profile(&self, patch: &UserPatch) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        match self.gateway.update_profile(&address, patch).await.into_result() {
            Ok(user) => self.replace_user_if_current(user),
            Err(error) => {
                warn!(%address, %error, "Profile update failed");
                false
            }
        }
    }

    pub async fn refresh_profile(&self) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        match self.gateway.get_profile(&address).await.into_result() {
            Ok(user) => self.replace_user_if_current(user),
            Err(error) => {
                warn!(%address, %error, "Profile refresh failed");
                false
            }
        }
    }

    // -- Remote mutations ----------------------------------------------------

    pub async fn create_blood_request(&self, draft: BloodRequestDraft) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        let request = NewBloodRequest {
            requester_address: address,
            draft,
        };
        match self.gateway.create_request(&request).await.into_result() {
            Ok(created) => {
                info!(id = %created.id, blood_type = %created.blood_type, "Blood request created");
                self.refresh_blood_requests().await;
                true
            }
            Err(error) => {
                warn!(%error, "Blood request creation failed");
                false
            }
        }
    }

    pub async fn create_donation(&self, draft: DonationDraft) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        let donation = NewDonation {
            donor_address: address,
            draft,
        };
        match self.gateway.create_donation(&donation).await.into_result() {
            Ok(created) => {
                info!(id = %created.id, "Donation recorded");
                tokio::join!(self.refresh_donations(), self.refresh_profile());
                true
            }
            Err(error) => {
                warn!(%error, "Donation creation failed");
                false
            }
        }
    }

    /// Upload a certificate image and return its public URL.
    pub async fn upload_certificate(
        &self,
        file: &CertificateFile,
        donation_id: Option<Uuid>,
    ) -> Option<String> {
        let address = self.current_address()?;
        match self
            .gateway
            .upload_certificate(file, &address, donation_id)
            .await
            .into_result()
        {
            Ok(receipt) => {
                info!(file = %receipt.file_name, size = receipt.file_size, "Certificate uploaded");
                if donation_id.is_some() {
                    self.refresh_donations().await;
                }
                Some(receipt.public_url)
            }
            Err(error) => {
                warn!(file = %file.file_name, %error, "Certificate upload failed");
                None
            }
        }
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> bool {
        match self.gateway.mark_as_read(id).await.into_result() {
            Ok(updated) => {
                {
                    let mut inner = self.lock();
                    let notifications = inner
                        .snapshot
                        .notifications
                        .iter()
                        .map(|n| if n.id == id { updated.clone() } else { n.clone() })
                        .collect();
                    inner.snapshot.notifications = notifications;
                }
                self.emit(DataEvent::CollectionRefreshed(Collection::Notifications));
                true
            }
            Err(error) => {
                warn!(%id, %error, "Mark as read failed");
                false
            }
        }
    }

    /// Mint a certificate for one of the user's cached donations.
    pub async fn mint_certificate(&self, donation_id: Uuid) -> Option<MintReceipt> {
        let address = self.current_address()?;
        let Some(donation) = self.donations().into_iter().find(|d| d.id == donation_id) else {
            warn!(%donation_id, "Mint requested for a donation that is not cached");
            return None;
        };
        if donation.is_minted() {
            warn!(%donation_id, "Donation already minted");
            return None;
        }

        let request = MintCertificateRequest {
            donation_id,
            wallet_address: address,
            blood_type: donation.blood_type,
            donation_date: donation.donation_date,
            certificate_url: donation.certificate_url,
        };
        match self.gateway.mint_certificate(&request).await.into_result() {
            Ok(receipt) => {
                info!(%donation_id, token_id = %receipt.token_id, "Certificate minted");
                tokio::join!(self.refresh_donations(), self.refresh_profile());
                Some(receipt)
            }
            Err(error) => {
                warn!(%donation_id, %error, "Mint failed");
                None
            }
        }
    }

    // -- Refresh -------------------------------------------------------------

    pub async fn refresh_blood_requests(&self) -> bool {
        let generation = self.next_generation();
        let location = self.app_data().location;
        let filters = RequestFilters {
            lat: location.map(|c| c.lat),
            lng: location.map(|c| c.lng),
            ..RequestFilters::default()
        };
        match self.gateway.get_requests(&filters).await.into_result() {
            Ok(requests) => self.apply(Collection::Requests, generation, |s| {
                s.blood_requests = requests;
            }),
            Err(error) => {
                warn!(%error, "Blood request refresh failed");
                false
            }
        }
    }

    pub async fn refresh_donations(&self) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        let generation = self.next_generation();
        match self.gateway.get_user_donations(&address).await.into_result() {
            Ok(donations) => self.apply(Collection::Donations, generation, |s| {
                s.donations = donations;
            }),
            Err(error) => {
                warn!(%error, "Donation refresh failed");
                false
            }
        }
    }

    pub async fn refresh_blood_banks(&self) -> bool {
        let generation = self.next_generation();
        let location = self.app_data().location;
        let filters = BankFilters {
            lat: location.map(|c| c.lat),
            lng: location.map(|c| c.lng),
            ..BankFilters::default()
        };
        match self.gateway.get_blood_banks(&filters).await.into_result() {
            Ok(banks) => self.apply(Collection::Banks, generation, |s| {
                s.blood_banks = banks;
            }),
            Err(error) => {
                warn!(%error, "Blood bank refresh failed");
                false
            }
        }
    }

    pub async fn refresh_notifications(&self) -> bool {
        let Some(address) = self.current_address() else {
            return false;
        };
        let generation = self.next_generation();
        match self
            .gateway
            .get_user_notifications(&address, false)
            .await
            .into_result()
        {
            Ok(notifications) => self.apply(Collection::Notifications, generation, |s| {
                s.notifications = notifications;
            }),
            Err(error) => {
                warn!(%error, "Notification refresh failed");
                false
            }
        }
    }

    /// Refresh all four collections concurrently and stamp `last_sync`.
    /// Individual refresh failures do not prevent the stamp.
    pub async fn sync_data(&self) -> SyncOutcome {
        let (ready, session) = {
            let inner = self.lock();
            (
                inner.snapshot.app_data.is_online && inner.snapshot.user.is_some(),
                self.session.load(Ordering::SeqCst),
            )
        };
        if !ready {
            debug!("Sync skipped: offline or signed out");
            return SyncOutcome::Skipped;
        }

        let Ok(_guard) = self.sync_guard.try_lock() else {
            debug!("Sync already in flight");
            return SyncOutcome::AlreadyRunning;
        };

        let (requests, donations, banks, notifications) = tokio::join!(
            self.refresh_blood_requests(),
            self.refresh_donations(),
            self.refresh_blood_banks(),
            self.refresh_notifications(),
        );

        let at = Utc::now();
        if !self.stamp_last_sync(session, at) {
            info!("Session cleared during sync; not stamping");
            return SyncOutcome::Interrupted;
        }
        info!(requests, donations, banks, notifications, "Sync finished");
        self.emit(DataEvent::Synced { at });
        SyncOutcome::Completed { at }
    }

    /// Held while the location permission is being resolved.
    pub(crate) async fn lock_location(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.location_guard.lock().await
    }

    // -- Internals -----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DataEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_address(&self) -> Option<String> {
        let address = self.lock().snapshot.user.as_ref().map(|u| u.address.clone());
        if address.is_none() {
            debug!("No user loaded");
        }
        address
    }

    fn set_user(&self, user: User) {
        {
            let mut inner = self.lock();
            self.persist_json(USER_KEY, &user);
            inner.snapshot.user = Some(user);
        }
        self.emit(DataEvent::UserChanged);
    }

    /// Replace the user only if the same address is still signed in.
    fn replace_user_if_current(&self, user: User) -> bool {
        {
            let mut inner = self.lock();
            let current = inner.snapshot.user.as_ref().map(|u| u.address.as_str());
            if current != Some(user.address.as_str()) {
                debug!(address = %user.address, "Discarding profile for a user no longer signed in");
                return false;
            }
            self.persist_json(USER_KEY, &user);
            inner.snapshot.user = Some(user);
        }
        self.emit(DataEvent::UserChanged);
        true
    }

    fn apply(&self, collection: Collection, generation: u64, f: impl FnOnce(&mut Snapshot)) -> bool {
        {
            let mut inner = self.lock();
            let slot = &mut inner.applied[collection.index()];
            if generation <= *slot {
                debug!(?collection, generation, last = *slot, "Discarding stale response");
                return false;
            }
            *slot = generation;
            f(&mut inner.snapshot);
        }
        self.emit(DataEvent::CollectionRefreshed(collection));
        true
    }

    /// Record `at` as the last sync, unless the session changed since
    /// `session` was read.
    fn stamp_last_sync(&self, session: u64, at: DateTime<Utc>) -> bool {
        {
            let mut inner = self.lock();
            if self.session.load(Ordering::SeqCst) != session || inner.snapshot.user.is_none() {
                return false;
            }
            inner.snapshot.app_data.last_sync = Some(at);
            self.persist_json(APP_DATA_KEY, &inner.snapshot.app_data.persisted());
        }
        self.emit(DataEvent::AppDataChanged);
        true
    }

    fn persist_json<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|e| e.to_string())
            .and_then(|json| self.store.set(key, &json).map_err(|e| e.to_string()));
        if let Err(error) = result {
            warn!(key, %error, "Failed to persist state");
        }
    }
}

/// Read and decode a persisted value. Undecodable entries are purged.
fn load_json<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding corrupt persisted state");
            if let Err(e) = store.remove(key) {
                warn!(key, error = %e, "Failed to remove corrupt state");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use baseseva_shared::{
        BloodType, LocationPermission, NetworkStatus, RequestStatus, Urgency,
    };
    use baseseva_store::MemoryStore;

    use super::*;
    use crate::auth::MockAuthProvider;
    use crate::testing::FakeGateway;

    fn context() -> (Arc<FakeGateway>, Arc<MemoryStore>, DataContext) {
        let gateway = Arc::new(FakeGateway::new());
        let store = Arc::new(MemoryStore::new());
        let ctx = DataContext::new(gateway.clone(), store.clone());
        (gateway, store, ctx)
    }

    async fn logged_in() -> (Arc<FakeGateway>, Arc<MemoryStore>, DataContext) {
        let (gateway, store, ctx) = context();
        assert!(ctx.login_user("0xdonor", None).await);
        gateway.reset_calls();
        (gateway, store, ctx)
    }

    fn stored_user(store: &MemoryStore) -> Option<User> {
        store
            .get(USER_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    fn critical_draft() -> BloodRequestDraft {
        BloodRequestDraft::new(BloodType::ONegative, "X", Urgency::Critical, "Surgery")
    }

    #[tokio::test]
    async fn test_update_user_writes_through() {
        let (_gw, store, ctx) = logged_in().await;

        for name in ["Asha", "Asha K", "Asha Kulkarni"] {
            assert!(ctx.update_user(&UserPatch {
                name: Some(name.into()),
                ..Default::default()
            }));
            assert_eq!(stored_user(&store), ctx.user());
        }
        assert_eq!(ctx.user().unwrap().name, "Asha Kulkarni");
    }

    #[test]
    fn test_update_user_without_user_is_noop() {
        let (_gw, store, ctx) = context();
        assert!(!ctx.update_user(&UserPatch::default()));
        assert!(store.get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_user_blob_is_purged() {
        let store = Arc::new(MemoryStore::new());
        store.set(USER_KEY, "{not json").unwrap();
        store.set(APP_DATA_KEY, "[]").unwrap();

        let ctx = DataContext::new(Arc::new(FakeGateway::new()), store.clone());
        assert!(ctx.user().is_none());
        assert_eq!(ctx.app_data(), AppData::default());
        assert!(store.get(USER_KEY).unwrap().is_none());
        assert!(store.get(APP_DATA_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hydration_restores_user_but_not_location() {
        let (gateway, store, ctx) = logged_in().await;
        ctx.update_app_data(AppDataPatch {
            location: Some(Some(baseseva_shared::Coordinates::new(18.5, 73.8))),
            location_permission: Some(LocationPermission::Granted),
            ..Default::default()
        });

        let rehydrated = DataContext::new(gateway, store);
        assert_eq!(rehydrated.user(), ctx.user());
        assert!(rehydrated.has_session());
        assert_eq!(rehydrated.app_data().location, None);
        assert_eq!(
            rehydrated.app_data().location_permission,
            LocationPermission::Prompt
        );
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_alone() {
        let (gateway, store, ctx) = context();
        gateway.fail_all(true);
        assert!(!ctx.login_user("0xdonor", None).await);
        assert!(ctx.user().is_none());
        assert!(!ctx.has_session());
        assert!(store.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preconditions_make_no_calls() {
        let (gateway, _store, ctx) = context();
        let png = CertificateFile {
            file_name: "c.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1],
        };

        assert!(!ctx.create_blood_request(critical_draft()).await);
        assert!(
            !ctx.create_donation(DonationDraft {
                blood_type: BloodType::OPositive,
                donation_date: None,
            })
            .await
        );
        assert!(ctx.upload_certificate(&png, None).await.is_none());
        assert!(ctx.mint_certificate(Uuid::new_v4()).await.is_none());
        assert!(!ctx.refresh_donations().await);
        assert!(!ctx.refresh_notifications().await);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_offline_sync_makes_no_calls() {
        let (gateway, _store, ctx) = logged_in().await;
        ctx.update_app_data(AppDataPatch {
            is_online: Some(false),
            network_status: Some(NetworkStatus::Offline),
            ..Default::default()
        });

        assert_eq!(ctx.sync_data().await, SyncOutcome::Skipped);
        assert_eq!(gateway.calls(), 0);
        assert!(ctx.app_data().last_sync.is_none());
    }

    #[tokio::test]
    async fn test_sync_stamps_even_when_refreshes_fail() {
        let (gateway, _store, ctx) = logged_in().await;
        gateway.fail_all(true);

        let outcome = ctx.sync_data().await;
        let SyncOutcome::Completed { at } = outcome else {
            panic!("unexpected {outcome:?}");
        };
        assert_eq!(ctx.app_data().last_sync, Some(at));
        assert_eq!(gateway.calls(), 4);
    }

    #[tokio::test]
    async fn test_create_request_then_refresh_lists_it() {
        let (_gw, _store, ctx) = logged_in().await;
        assert!(ctx.create_blood_request(critical_draft()).await);
        assert!(ctx.refresh_blood_requests().await);

        let requests = ctx.blood_requests();
        assert!(requests
            .iter()
            .any(|r| r.blood_type == BloodType::ONegative && r.status == RequestStatus::Active));
    }

    #[tokio::test]
    async fn test_create_donation_refreshes_profile() {
        let (_gw, _store, ctx) = logged_in().await;
        assert!(
            ctx.create_donation(DonationDraft {
                blood_type: BloodType::BPositive,
                donation_date: None,
            })
            .await
        );
        assert_eq!(ctx.donations().len(), 1);
        assert_eq!(ctx.user().unwrap().donation_count, 1);
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded() {
        let (gateway, _store, ctx) = logged_in().await;
        gateway.seed_request(BloodType::APositive);

        let release = gateway.hold_next_request_fetch();
        let (first, second) = tokio::join!(ctx.refresh_blood_requests(), async {
            // The held fetch already captured one request.
            gateway.seed_request(BloodType::BNegative);
            let fresh = ctx.refresh_blood_requests().await;
            let _ = release.send(());
            fresh
        });

        assert!(second);
        assert!(!first, "older response must not overwrite a newer one");
        assert_eq!(ctx.blood_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_sync_does_not_stack() {
        let (gateway, _store, ctx) = logged_in().await;

        let release = gateway.hold_next_request_fetch();
        let (first, second) = tokio::join!(ctx.sync_data(), async {
            let outcome = ctx.sync_data().await;
            let _ = release.send(());
            outcome
        });

        assert!(matches!(first, SyncOutcome::Completed { .. }));
        assert_eq!(second, SyncOutcome::AlreadyRunning);
        assert_eq!(gateway.calls(), 4);
    }

    #[tokio::test]
    async fn test_logout_during_sync_leaves_nothing_behind() {
        let (gateway, store, ctx) = logged_in().await;

        let release = gateway.hold_next_request_fetch();
        let (outcome, ()) = tokio::join!(ctx.sync_data(), async {
            ctx.clear_user_data();
            let _ = release.send(());
        });

        assert_eq!(outcome, SyncOutcome::Interrupted);
        assert!(ctx.user().is_none());
        assert!(ctx.app_data().last_sync.is_none());
        assert!(store.keys().unwrap().is_empty());

        let rehydrated = DataContext::new(gateway, store.clone());
        assert!(rehydrated.app_data().last_sync.is_none());
        assert!(rehydrated.user().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let (gateway, store, ctx) = logged_in().await;
        ctx.update_app_data(AppDataPatch {
            last_sync: Some(Some(Utc::now())),
            ..Default::default()
        });
        let auth = MockAuthProvider::new("seed");
        auth.connect().await.unwrap();

        ctx.logout(&auth).await;
        assert!(!auth.is_connected());
        assert!(ctx.user().is_none());
        assert!(store.keys().unwrap().is_empty());

        let rehydrated = DataContext::new(gateway, store.clone());
        assert!(rehydrated.user().is_none());
        assert!(!rehydrated.has_session());
    }

    #[tokio::test]
    async fn test_login_with_provider_uses_wallet_address() {
        let (_gw, _store, ctx) = context();
        let auth = MockAuthProvider::new("seed");
        assert!(ctx.login_with(&auth, None).await);
        assert_eq!(ctx.user().unwrap().address, auth.address().unwrap());
    }

    #[tokio::test]
    async fn test_save_profile_keeps_server_copy() {
        let (_gw, store, ctx) = logged_in().await;
        let patch = UserPatch {
            city: Some("Pune".into()),
            blood_type: Some(BloodType::ONegative),
            ..Default::default()
        };
        assert!(ctx.save_profile(&patch).await);
        let user = ctx.user().unwrap();
        assert_eq!(user.city.as_deref(), Some("Pune"));
        assert_eq!(stored_user(&store), Some(user));
    }

    #[tokio::test]
    async fn test_mark_read_replaces_one_element() {
        let (gateway, _store, ctx) = logged_in().await;
        let first = gateway.seed_notification("0xdonor");
        let second = gateway.seed_notification("0xdonor");
        assert!(ctx.refresh_notifications().await);

        assert!(ctx.mark_notification_read(first).await);
        let notifications = ctx.notifications();
        assert!(notifications.iter().find(|n| n.id == first).unwrap().read);
        assert!(!notifications.iter().find(|n| n.id == second).unwrap().read);
    }

    #[tokio::test]
    async fn test_mint_refreshes_and_is_once() {
        let (gateway, _store, ctx) = logged_in().await;
        assert!(
            ctx.create_donation(DonationDraft {
                blood_type: BloodType::OPositive,
                donation_date: None,
            })
            .await
        );
        let donation_id = ctx.donations()[0].id;

        let receipt = ctx.mint_certificate(donation_id).await.unwrap();
        assert_eq!(receipt.donation_id, donation_id);
        assert!(ctx.donations()[0].is_minted());
        assert_eq!(ctx.user().unwrap().nft_count, 1);

        let before = gateway.calls();
        assert!(ctx.mint_certificate(donation_id).await.is_none());
        assert_eq!(gateway.calls(), before);
        assert_eq!(gateway.mint_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (_gw, _store, ctx) = logged_in().await;
        let mut events = ctx.subscribe();
        assert!(ctx.refresh_blood_banks().await);
        assert_eq!(
            events.recv().await.unwrap(),
            DataEvent::CollectionRefreshed(Collection::Banks)
        );
    }
}
