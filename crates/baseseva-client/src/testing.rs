//! In-process doubles for the gateway and the platform.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use baseseva_shared::constants::DONATION_IMPACT_POINTS;
use baseseva_shared::upload::validate_certificate;
use baseseva_shared::{
    ApiResponse, AppNotification, BankFilters, BloodBank, BloodRequest, BloodRequestDraft,
    BloodType, CertificateFile, Coordinates, DeleteReceipt, Donation, FileInfo, HealthStatus,
    LocationPermission, MintCertificateRequest, MintReceipt, NewBloodRequest, NewDonation,
    NotificationKind, NotificationPermission, RequestFilters, UploadReceipt, Urgency, User,
    UserPatch,
};
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::gateway::Gateway;
use crate::watchers::{Platform, PositionError};

#[derive(Default)]
struct Backend {
    users: HashMap<String, User>,
    requests: Vec<BloodRequest>,
    donations: Vec<Donation>,
    notifications: Vec<AppNotification>,
}

/// A [`Gateway`] over an in-memory backend that counts every call.
#[derive(Default)]
pub struct FakeGateway {
    calls: AtomicUsize,
    pub mint_calls: AtomicUsize,
    failing: AtomicBool,
    backend: Mutex<Backend>,
    request_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Every subsequent call fails as if the backend were unreachable.
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next `get_requests` reads the backend, then waits for the
    /// returned sender before answering.
    pub fn hold_next_request_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.request_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn seed_request(&self, blood_type: BloodType) {
        let request = BloodRequest::open(
            NewBloodRequest {
                requester_address: "0xother".into(),
                draft: BloodRequestDraft::new(blood_type, "Pune", Urgency::Normal, "seeded"),
            },
            Utc::now(),
        );
        self.backend.lock().unwrap().requests.push(request);
    }

    pub fn seed_notification(&self, address: &str) -> Uuid {
        let notification = AppNotification::new(
            address,
            NotificationKind::System,
            "Welcome",
            "Thanks for joining",
            serde_json::Value::Null,
        );
        let id = notification.id;
        self.backend.lock().unwrap().notifications.push(notification);
        id
    }

    /// Count the call and report whether it should fail.
    fn enter(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failing.load(Ordering::SeqCst)
    }

    fn with_backend<T>(&self, f: impl FnOnce(&mut Backend) -> ApiResponse<T>) -> ApiResponse<T> {
        if self.enter() {
            return ApiResponse::failure("Network error: connection refused");
        }
        f(&mut self.backend.lock().unwrap())
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn login(&self, address: &str, profile: Option<&UserPatch>) -> ApiResponse<User> {
        self.with_backend(|b| {
            let now = Utc::now();
            let user = b
                .users
                .entry(address.to_string())
                .or_insert_with(|| User::new(address, now));
            if let Some(patch) = profile {
                user.apply_patch(patch, now);
            }
            ApiResponse::ok(user.clone())
        })
    }

    async fn get_profile(&self, address: &str) -> ApiResponse<User> {
        self.with_backend(|b| match b.users.get(address) {
            Some(user) => ApiResponse::ok(user.clone()),
            None => ApiResponse::failure("User not found"),
        })
    }

    async fn update_profile(&self, address: &str, patch: &UserPatch) -> ApiResponse<User> {
        self.with_backend(|b| match b.users.get_mut(address) {
            Some(user) => {
                user.apply_patch(patch, Utc::now());
                ApiResponse::ok(user.clone())
            }
            None => ApiResponse::failure("User not found"),
        })
    }

    async fn get_requests(&self, _filters: &RequestFilters) -> ApiResponse<Vec<BloodRequest>> {
        let gate = self.request_gates.lock().unwrap().pop_front();
        let response = self.with_backend(|b| ApiResponse::ok(b.requests.clone()));
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        response
    }

    async fn create_request(&self, request: &NewBloodRequest) -> ApiResponse<BloodRequest> {
        self.with_backend(|b| {
            let created = BloodRequest::open(request.clone(), Utc::now());
            b.requests.push(created.clone());
            ApiResponse::ok(created)
        })
    }

    async fn get_user_donations(&self, address: &str) -> ApiResponse<Vec<Donation>> {
        self.with_backend(|b| {
            ApiResponse::ok(
                b.donations
                    .iter()
                    .filter(|d| d.donor_address == address)
                    .cloned()
                    .collect(),
            )
        })
    }

    async fn create_donation(&self, donation: &NewDonation) -> ApiResponse<Donation> {
        self.with_backend(|b| {
            let now = Utc::now();
            let Some(user) = b.users.get_mut(&donation.donor_address) else {
                return ApiResponse::failure("User not found");
            };
            let date = donation.draft.donation_date.unwrap_or(now);
            user.record_donation(date, DONATION_IMPACT_POINTS);
            let created = Donation {
                id: Uuid::new_v4(),
                donor_address: donation.donor_address.clone(),
                blood_type: donation.draft.blood_type,
                donation_date: date,
                certificate_url: None,
                nft_token_id: None,
                transaction_hash: None,
                verified: false,
                impact_points: DONATION_IMPACT_POINTS,
            };
            b.donations.push(created.clone());
            ApiResponse::ok(created)
        })
    }

    async fn upload_certificate(
        &self,
        file: &CertificateFile,
        _address: &str,
        _donation_id: Option<Uuid>,
    ) -> ApiResponse<UploadReceipt> {
        if let Err(e) = validate_certificate(&file.content_type, file.bytes.len()) {
            return ApiResponse::failure(e.to_string());
        }
        self.with_backend(|_| {
            ApiResponse::ok(UploadReceipt {
                file_name: file.file_name.clone(),
                public_url: format!("http://fake/files/{}", file.file_name),
                file_size: file.bytes.len() as u64,
                file_type: file.content_type.clone(),
            })
        })
    }

    async fn get_file_info(&self, _file_name: &str) -> ApiResponse<FileInfo> {
        self.with_backend(|_| ApiResponse::failure("File not found"))
    }

    async fn delete_file(&self, file_name: &str) -> ApiResponse<DeleteReceipt> {
        self.with_backend(|_| {
            ApiResponse::ok(DeleteReceipt {
                file_name: file_name.to_string(),
                deleted: true,
            })
        })
    }

    async fn get_blood_banks(&self, _filters: &BankFilters) -> ApiResponse<Vec<BloodBank>> {
        self.with_backend(|_| ApiResponse::ok(Vec::new()))
    }

    async fn get_user_notifications(
        &self,
        address: &str,
        unread_only: bool,
    ) -> ApiResponse<Vec<AppNotification>> {
        self.with_backend(|b| {
            ApiResponse::ok(
                b.notifications
                    .iter()
                    .filter(|n| n.user_address == address && (!unread_only || !n.read))
                    .cloned()
                    .collect(),
            )
        })
    }

    async fn mark_as_read(&self, id: Uuid) -> ApiResponse<AppNotification> {
        self.with_backend(|b| match b.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                ApiResponse::ok(n.clone())
            }
            None => ApiResponse::failure("Notification not found"),
        })
    }

    async fn mint_certificate(&self, request: &MintCertificateRequest) -> ApiResponse<MintReceipt> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        self.with_backend(|b| {
            let Some(donation) = b.donations.iter_mut().find(|d| d.id == request.donation_id)
            else {
                return ApiResponse::failure("Donation not found");
            };
            if donation.is_minted() {
                return ApiResponse::failure("Certificate already minted for this donation");
            }
            let token_id = format!("{}", b.users.len() + 1000);
            donation.nft_token_id = Some(token_id.clone());
            donation.transaction_hash = Some("0xfeed".into());
            donation.verified = true;
            if let Some(user) = b.users.get_mut(&request.wallet_address) {
                user.nft_count += 1;
            }
            ApiResponse::ok(MintReceipt {
                donation_id: request.donation_id,
                token_id,
                transaction_hash: "0xfeed".into(),
                network: "simulated".into(),
                certificate_url: request.certificate_url.clone(),
                minted_at: Utc::now(),
                simulated: true,
            })
        })
    }

    async fn health(&self) -> ApiResponse<HealthStatus> {
        self.with_backend(|_| {
            ApiResponse::ok(HealthStatus {
                status: "ok".into(),
                timestamp: Utc::now(),
                version: "test".into(),
            })
        })
    }
}

/// Scriptable [`Platform`].
pub struct FakePlatform {
    pub online: AtomicBool,
    pub connection_type: Mutex<Option<String>>,
    pub policy: Option<LocationPermission>,
    pub position: Result<Coordinates, PositionError>,
    pub position_calls: AtomicUsize,
    pub notifications: NotificationPermission,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
            connection_type: Mutex::new(None),
            policy: None,
            position: Ok(Coordinates::new(18.5204, 73.8567)),
            position_calls: AtomicUsize::new(0),
            notifications: NotificationPermission::Default,
        }
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn effective_connection_type(&self) -> Option<String> {
        self.connection_type.lock().unwrap().clone()
    }

    async fn location_permission_policy(&self) -> Option<LocationPermission> {
        self.policy
    }

    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.position.clone()
    }

    fn notification_permission(&self) -> NotificationPermission {
        self.notifications
    }
}
