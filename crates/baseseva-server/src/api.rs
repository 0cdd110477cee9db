use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use baseseva_shared::constants::{
    DEFAULT_SEARCH_RADIUS_KM, DONATION_IMPACT_POINTS, MAX_CERTIFICATE_SIZE,
};
use baseseva_shared::geo::distance_km;
use baseseva_shared::upload::normalize_content_type;
use baseseva_shared::{
    ApiResponse, AppNotification, BankFilters, BloodBank, BloodRequest, DeleteReceipt, Donation,
    FileInfo, HealthStatus, LoginRequest, MintCertificateRequest, MintReceipt, NewBloodRequest,
    NewDonation, NotificationKind, RequestFilters, Urgency, UploadReceipt, User, UserPatch,
    stored_precision, timestamp_now,
};
use baseseva_store::{CertificateRecord, Database, StoreError};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::certificate_store::CertificateStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::minter::CertificateMinter;

/// Multipart overhead on top of the largest accepted certificate, so an
/// oversized file reaches the upload validator instead of the body limit.
const UPLOAD_BODY_LIMIT: usize = MAX_CERTIFICATE_SIZE + 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub certificates: Arc<CertificateStore>,
    pub minter: Arc<dyn CertificateMinter>,
    pub config: Arc<ServerConfig>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ServerError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

fn or_not_found(what: &'static str) -> impl Fn(StoreError) -> ServerError {
    move |e| match e {
        StoreError::NotFound => ServerError::NotFound(what.to_string()),
        other => ServerError::Store(other),
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // On the notification routes `:id` is the owner's address for the
    // listing and the notification id for `/read`.
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/profile/:address", get(get_profile).put(update_profile))
        .route("/requests", get(list_requests).post(create_request))
        .route("/donations", post(create_donation))
        .route("/donations/:address", get(list_donations))
        .route("/blood-banks", get(list_blood_banks))
        .route("/notifications/:id", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        .route("/upload/certificate", post(upload_certificate))
        .route("/upload/:file_name", get(file_info).delete(delete_file))
        .route("/files/:file_name", get(serve_file))
        .route("/blockchain/mint-certificate", post(mint_certificate))
        .fallback(|| async { ServerError::NotFound("Route".to_string()) })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::ok(HealthStatus {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

// ─── Auth & profile ───

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(req) = payload?;
    req.validate()?;

    let db = state.db.lock().await;
    let user = db.upsert_user_on_login(&req.address, &req.profile, timestamp_now())?;

    info!(address = %user.address, "User logged in");
    ok(user)
}

async fn get_profile(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<User> {
    let Path(address) = path?;
    let user = state
        .db
        .lock()
        .await
        .get_user(&address)
        .map_err(or_not_found("User"))?;
    ok(user)
}

async fn update_profile(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<User> {
    let Path(address) = path?;
    let Json(patch) = payload?;
    patch.validate()?;

    let user = state
        .db
        .lock()
        .await
        .update_user_profile(&address, &patch)
        .map_err(or_not_found("User"))?;

    info!(address = %address, "Profile updated");
    ok(user)
}

// ─── Blood requests ───

async fn list_requests(
    State(state): State<AppState>,
    query: Result<Query<RequestFilters>, QueryRejection>,
) -> ApiResult<Vec<BloodRequest>> {
    let Query(filters) = query?;
    if filters.lat.is_some() || filters.radius_km.is_some() {
        debug!("Geo filters are not applied to blood requests");
    }

    let requests = state
        .db
        .lock()
        .await
        .list_active_requests(filters.blood_type, Utc::now())?;
    ok(requests)
}

async fn create_request(
    State(state): State<AppState>,
    payload: Result<Json<NewBloodRequest>, JsonRejection>,
) -> ApiResult<BloodRequest> {
    let Json(new) = payload?;
    new.validate()?;

    let db = state.db.lock().await;
    db.get_user(&new.requester_address)
        .map_err(or_not_found("User"))?;

    let request = BloodRequest::open(new, timestamp_now());
    db.insert_blood_request(&request)?;

    info!(
        id = %request.id,
        blood_type = %request.blood_type,
        urgency = %request.urgency,
        city = %request.city,
        "Blood request created"
    );

    if request.urgency == Urgency::Critical {
        let notified = notify_matching_donors(&db, &request);
        info!(id = %request.id, notified, "Emergency alerts sent");
    }

    ok(request)
}

/// Alert donors in the request's city with the requested blood type.
/// Failures are logged and skipped.
fn notify_matching_donors(db: &Database, request: &BloodRequest) -> usize {
    let donors = match db.list_donors_in_city(&request.city, request.blood_type) {
        Ok(donors) => donors,
        Err(e) => {
            warn!(error = %e, id = %request.id, "Could not look up donors for alert");
            return 0;
        }
    };

    let mut sent = 0;
    for donor in donors
        .iter()
        .filter(|d| d.address != request.requester_address)
    {
        let notification = AppNotification::new(
            &donor.address,
            NotificationKind::EmergencyAlert,
            format!("Urgent: {} blood needed", request.blood_type),
            format!(
                "{} unit(s) of {} needed in {}",
                request.units_needed, request.blood_type, request.city
            ),
            serde_json::json!({
                "request_id": request.id,
                "blood_type": request.blood_type,
                "city": request.city,
            }),
        );
        match db.insert_notification(&notification) {
            Ok(()) => sent += 1,
            Err(e) => warn!(error = %e, donor = %donor.address, "Failed to store alert"),
        }
    }
    sent
}

// ─── Donations ───

async fn list_donations(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<Donation>> {
    let Path(address) = path?;
    let donations = state.db.lock().await.list_donations_for(&address)?;
    ok(donations)
}

async fn create_donation(
    State(state): State<AppState>,
    payload: Result<Json<NewDonation>, JsonRejection>,
) -> ApiResult<Donation> {
    let Json(new) = payload?;
    new.validate()?;

    let db = state.db.lock().await;
    let mut user = db
        .get_user(&new.donor_address)
        .map_err(or_not_found("User"))?;

    let donation = Donation {
        id: Uuid::new_v4(),
        donor_address: new.donor_address,
        blood_type: new.draft.blood_type,
        donation_date: new
            .draft
            .donation_date
            .map_or_else(timestamp_now, stored_precision),
        certificate_url: None,
        nft_token_id: None,
        transaction_hash: None,
        verified: false,
        impact_points: DONATION_IMPACT_POINTS,
    };
    db.insert_donation(&donation)?;

    user.record_donation(donation.donation_date, donation.impact_points);
    db.save_user(&user)?;

    info!(
        id = %donation.id,
        donor = %donation.donor_address,
        donation_count = user.donation_count,
        "Donation recorded"
    );
    ok(donation)
}

// ─── Blood banks ───

async fn list_blood_banks(
    State(state): State<AppState>,
    query: Result<Query<BankFilters>, QueryRejection>,
) -> ApiResult<Vec<BloodBank>> {
    let Query(filters) = query?;
    let mut banks = state.db.lock().await.list_blood_banks()?;

    let emergency_only = filters.emergency_only.unwrap_or(false);
    banks.retain(|bank| {
        filters.blood_type.map_or(true, |bt| bank.stocks(bt)) && (!emergency_only || bank.emergency)
    });

    if let Some(origin) = filters.origin() {
        let radius = filters.radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
        for bank in banks.iter_mut() {
            bank.distance_km = Some(distance_km(origin, bank.coordinates));
        }
        banks.retain(|bank| bank.distance_km.is_some_and(|d| d <= radius));
        banks.sort_by(|a, b| {
            a.distance_km
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
        });
    }

    ok(banks)
}

// ─── Notifications ───

#[derive(Debug, Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
}

async fn list_notifications(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult<Vec<AppNotification>> {
    let Path(address) = path?;
    let Query(query) = query?;
    let notifications = state
        .db
        .lock()
        .await
        .list_notifications(&address, query.unread_only)?;
    ok(notifications)
}

async fn mark_notification_read(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<AppNotification> {
    let Path(id) = path?;
    let notification = state
        .db
        .lock()
        .await
        .mark_notification_read(id)
        .map_err(or_not_found("Notification"))?;
    ok(notification)
}

// ─── Certificates ───

fn multipart_err(e: impl std::fmt::Display) -> ServerError {
    ServerError::BadRequest(format!("Multipart error: {e}"))
}

/// Accepts `file`, `walletAddress` and an optional `donationId`. The file is
/// validated before anything is written; attaching the URL to the donation
/// is best-effort.
async fn upload_certificate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadReceipt> {
    let mut multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut wallet_address: Option<String> = None;
    let mut donation_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_err)?;
                file = Some((content_type, data.to_vec()));
            }
            "walletAddress" => wallet_address = Some(field.text().await.map_err(multipart_err)?),
            "donationId" => donation_id = Some(field.text().await.map_err(multipart_err)?),
            _ => {}
        }
    }

    let (content_type, data) = file.ok_or_else(|| {
        ServerError::BadRequest("Missing 'file' field in multipart form".to_string())
    })?;
    let wallet_address = wallet_address
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing 'walletAddress' field".to_string()))?;
    if !wallet_address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServerError::BadRequest(format!(
            "Invalid wallet address: {wallet_address}"
        )));
    }
    let donation_id = match donation_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| ServerError::BadRequest(format!("Invalid donationId: {raw}")))?,
        ),
        None => None,
    };

    let now = timestamp_now();
    let file_name = state
        .certificates
        .store(&wallet_address, &content_type, &data, now)
        .await?;
    let public_url = state.config.public_url(&file_name);
    let file_type = normalize_content_type(&content_type);

    let db = state.db.lock().await;
    let record = CertificateRecord {
        file_name: file_name.clone(),
        wallet_address: wallet_address.clone(),
        donation_id,
        file_size: data.len() as u64,
        file_type: file_type.clone(),
        uploaded_at: now,
    };
    if let Err(e) = db.insert_certificate(&record) {
        if let Err(cleanup) = state.certificates.delete(&file_name).await {
            warn!(error = %cleanup, file = %file_name, "Failed to remove orphaned certificate");
        }
        return Err(e.into());
    }

    if let Some(id) = donation_id {
        match db.attach_certificate_url(id, &public_url) {
            Ok(true) => debug!(donation = %id, "Certificate attached to donation"),
            Ok(false) => warn!(donation = %id, "Donation not found, certificate left unattached"),
            Err(e) => warn!(error = %e, donation = %id, "Failed to attach certificate"),
        }
    }

    info!(
        file = %file_name,
        wallet = %wallet_address,
        size = data.len(),
        "Certificate uploaded"
    );

    ok(UploadReceipt {
        file_name,
        public_url,
        file_size: data.len() as u64,
        file_type,
    })
}

async fn file_info(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<FileInfo> {
    let Path(file_name) = path?;
    let record = state
        .db
        .lock()
        .await
        .get_certificate(&file_name)?
        .ok_or_else(|| ServerError::NotFound(format!("File {file_name}")))?;

    ok(FileInfo {
        public_url: state.config.public_url(&record.file_name),
        file_name: record.file_name,
        file_size: record.file_size,
        file_type: record.file_type,
        wallet_address: record.wallet_address,
        donation_id: record.donation_id,
        uploaded_at: record.uploaded_at,
    })
}

async fn delete_file(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<DeleteReceipt> {
    let Path(file_name) = path?;
    let removed_file = state.certificates.delete(&file_name).await?;
    let removed_record = state.db.lock().await.delete_certificate(&file_name)?;

    if !removed_file && !removed_record {
        return Err(ServerError::NotFound(format!("File {file_name}")));
    }

    info!(file = %file_name, "Certificate deleted");
    ok(DeleteReceipt {
        file_name,
        deleted: true,
    })
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Target of the public certificate URLs.
async fn serve_file(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ServerError> {
    let Path(file_name) = path?;
    let data = state.certificates.read(&file_name).await?;
    let content_type = state
        .db
        .lock()
        .await
        .get_certificate(&file_name)?
        .map(|record| record.file_type)
        .unwrap_or_else(|| content_type_for(&file_name).to_string());

    let mut response = data.into_response();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

// ─── Minting ───

async fn mint_certificate(
    State(state): State<AppState>,
    payload: Result<Json<MintCertificateRequest>, JsonRejection>,
) -> ApiResult<MintReceipt> {
    let Json(req) = payload?;
    req.validate()?;

    {
        let db = state.db.lock().await;
        let donation = db
            .get_donation(req.donation_id)
            .map_err(or_not_found("Donation"))?;
        if donation.donor_address != req.wallet_address {
            return Err(ServerError::Forbidden(
                "Donation belongs to another wallet".to_string(),
            ));
        }
        if donation.is_minted() {
            return Err(ServerError::Conflict(
                "Certificate already minted for this donation".to_string(),
            ));
        }
    }

    let receipt = state.minter.mint(&req).await?;

    let db = state.db.lock().await;
    // The conditional update is what enforces mint-once if two mints race.
    let recorded = db.mark_minted(
        req.donation_id,
        &receipt.token_id,
        &receipt.transaction_hash,
        req.certificate_url.as_deref(),
    )?;
    if !recorded {
        return Err(ServerError::Conflict(
            "Certificate already minted for this donation".to_string(),
        ));
    }
    db.increment_nft_count(&req.wallet_address)
        .map_err(or_not_found("User"))?;

    let notification = AppNotification::new(
        &req.wallet_address,
        NotificationKind::NftMinted,
        "Donation certificate minted",
        format!(
            "Your {} donation certificate was minted as token #{}",
            req.blood_type, receipt.token_id
        ),
        serde_json::json!({
            "donation_id": req.donation_id,
            "token_id": receipt.token_id,
            "transaction_hash": receipt.transaction_hash,
            "simulated": receipt.simulated,
        }),
    );
    if let Err(e) = db.insert_notification(&notification) {
        warn!(error = %e, "Failed to store mint notification");
    }

    info!(
        donation = %req.donation_id,
        token_id = %receipt.token_id,
        "Certificate minted"
    );
    ok(receipt)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(state, listener).await
}

/// Serve on an already bound listener.
pub async fn serve_listener(state: AppState, listener: TcpListener) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "Starting HTTP API server");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
