//! Remote data gateway.
//!
//! One method per backend operation. Every method resolves to an
//! [`ApiResponse`]: transport failures, non-2xx statuses and undecodable
//! bodies all come back as `success: false` with a non-empty `error`.
//! Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use baseseva_shared::upload::{normalize_content_type, validate_certificate};
use baseseva_shared::{
    ApiResponse, AppNotification, BankFilters, BloodBank, BloodRequest, CertificateFile,
    DeleteReceipt, Donation, FileInfo, HealthStatus, LoginRequest, MintCertificateRequest,
    MintReceipt, NewBloodRequest, NewDonation, RequestFilters, UploadReceipt, User, UserPatch,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConfigError;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Create-or-fetch the user keyed by `address`.
    async fn login(&self, address: &str, profile: Option<&UserPatch>) -> ApiResponse<User>;
    async fn get_profile(&self, address: &str) -> ApiResponse<User>;
    async fn update_profile(&self, address: &str, patch: &UserPatch) -> ApiResponse<User>;

    async fn get_requests(&self, filters: &RequestFilters) -> ApiResponse<Vec<BloodRequest>>;
    async fn create_request(&self, request: &NewBloodRequest) -> ApiResponse<BloodRequest>;

    async fn get_user_donations(&self, address: &str) -> ApiResponse<Vec<Donation>>;
    async fn create_donation(&self, donation: &NewDonation) -> ApiResponse<Donation>;

    /// Validated locally before anything is sent.
    async fn upload_certificate(
        &self,
        file: &CertificateFile,
        address: &str,
        donation_id: Option<Uuid>,
    ) -> ApiResponse<UploadReceipt>;
    async fn get_file_info(&self, file_name: &str) -> ApiResponse<FileInfo>;
    async fn delete_file(&self, file_name: &str) -> ApiResponse<DeleteReceipt>;

    async fn get_blood_banks(&self, filters: &BankFilters) -> ApiResponse<Vec<BloodBank>>;

    async fn get_user_notifications(
        &self,
        address: &str,
        unread_only: bool,
    ) -> ApiResponse<Vec<AppNotification>>;
    async fn mark_as_read(&self, id: Uuid) -> ApiResponse<AppNotification>;

    async fn mint_certificate(&self, request: &MintCertificateRequest) -> ApiResponse<MintReceipt>;

    async fn health(&self) -> ApiResponse<HealthStatus>;
}

/// [`Gateway`] over the BaseSeva REST backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidApiUrl {
            url: base_url.to_string(),
            reason,
        };

        let base_url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(invalid("expected an http(s) URL".to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> ApiResponse<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(operation, error = %e, "Backend unreachable");
                return ApiResponse::failure(format!("Network error: {e}"));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(operation, error = %e, "Failed to read response body");
                return ApiResponse::failure(format!("Network error: {e}"));
            }
        };

        let decoded = serde_json::from_slice::<ApiResponse<T>>(&body);
        let result = match decoded {
            Ok(envelope) if status.is_success() => envelope.normalized(),
            Ok(envelope) => ApiResponse::failure(
                envelope
                    .error
                    .unwrap_or_else(|| format!("Request failed with status {status}")),
            ),
            Err(_) if !status.is_success() => {
                ApiResponse::failure(format!("Request failed with status {status}"))
            }
            Err(e) => ApiResponse::failure(format!("Malformed response: {e}")),
        };

        if let Some(error) = result.error_message() {
            warn!(operation, status = status.as_u16(), error, "Backend call failed");
        } else {
            debug!(operation, status = status.as_u16(), "Backend call succeeded");
        }
        result
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        segments: &[&str],
    ) -> ApiResponse<T> {
        self.dispatch(operation, self.client.get(self.endpoint(segments)))
            .await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        body: &B,
    ) -> ApiResponse<T> {
        self.dispatch(operation, request.json(body)).await
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn login(&self, address: &str, profile: Option<&UserPatch>) -> ApiResponse<User> {
        let body = LoginRequest {
            address: address.to_string(),
            profile: profile.cloned().unwrap_or_default(),
        };
        let request = self.client.post(self.endpoint(&["auth", "login"]));
        self.send_json("login", request, &body).await
    }

    async fn get_profile(&self, address: &str) -> ApiResponse<User> {
        self.get_json("get_profile", &["auth", "profile", address])
            .await
    }

    async fn update_profile(&self, address: &str, patch: &UserPatch) -> ApiResponse<User> {
        let request = self.client.put(self.endpoint(&["auth", "profile", address]));
        self.send_json("update_profile", request, patch).await
    }

    async fn get_requests(&self, filters: &RequestFilters) -> ApiResponse<Vec<BloodRequest>> {
        let request = self.client.get(self.endpoint(&["requests"])).query(filters);
        self.dispatch("get_requests", request).await
    }

    async fn create_request(&self, request: &NewBloodRequest) -> ApiResponse<BloodRequest> {
        let builder = self.client.post(self.endpoint(&["requests"]));
        self.send_json("create_request", builder, request).await
    }

    async fn get_user_donations(&self, address: &str) -> ApiResponse<Vec<Donation>> {
        self.get_json("get_user_donations", &["donations", address])
            .await
    }

    async fn create_donation(&self, donation: &NewDonation) -> ApiResponse<Donation> {
        let request = self.client.post(self.endpoint(&["donations"]));
        self.send_json("create_donation", request, donation).await
    }

    async fn upload_certificate(
        &self,
        file: &CertificateFile,
        address: &str,
        donation_id: Option<Uuid>,
    ) -> ApiResponse<UploadReceipt> {
        if let Err(e) = validate_certificate(&file.content_type, file.bytes.len()) {
            warn!(file = %file.file_name, error = %e, "Certificate rejected before upload");
            return ApiResponse::failure(e.to_string());
        }

        let part = match Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&normalize_content_type(&file.content_type))
        {
            Ok(part) => part,
            Err(e) => return ApiResponse::failure(format!("Invalid content type: {e}")),
        };

        let mut form = Form::new()
            .text("walletAddress", address.to_string())
            .part("file", part);
        if let Some(id) = donation_id {
            form = form.text("donationId", id.to_string());
        }

        let request = self
            .client
            .post(self.endpoint(&["upload", "certificate"]))
            .multipart(form);
        self.dispatch("upload_certificate", request).await
    }

    async fn get_file_info(&self, file_name: &str) -> ApiResponse<FileInfo> {
        self.get_json("get_file_info", &["upload", file_name]).await
    }

    async fn delete_file(&self, file_name: &str) -> ApiResponse<DeleteReceipt> {
        let request = self.client.delete(self.endpoint(&["upload", file_name]));
        self.dispatch("delete_file", request).await
    }

    async fn get_blood_banks(&self, filters: &BankFilters) -> ApiResponse<Vec<BloodBank>> {
        let request = self
            .client
            .get(self.endpoint(&["blood-banks"]))
            .query(filters);
        self.dispatch("get_blood_banks", request).await
    }

    async fn get_user_notifications(
        &self,
        address: &str,
        unread_only: bool,
    ) -> ApiResponse<Vec<AppNotification>> {
        let mut request = self.client.get(self.endpoint(&["notifications", address]));
        if unread_only {
            request = request.query(&[("unread_only", "true")]);
        }
        self.dispatch("get_user_notifications", request).await
    }

    async fn mark_as_read(&self, id: Uuid) -> ApiResponse<AppNotification> {
        let id = id.to_string();
        let request = self
            .client
            .post(self.endpoint(&["notifications", &id, "read"]));
        self.dispatch("mark_as_read", request).await
    }

    async fn mint_certificate(&self, request: &MintCertificateRequest) -> ApiResponse<MintReceipt> {
        let builder = self
            .client
            .post(self.endpoint(&["blockchain", "mint-certificate"]));
        self.send_json("mint_certificate", builder, request).await
    }

    async fn health(&self) -> ApiResponse<HealthStatus> {
        self.get_json("health", &["health"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use baseseva_shared::constants::MAX_CERTIFICATE_SIZE;
    use baseseva_shared::{BloodRequestDraft, BloodType, DonationDraft, Urgency};
    use chrono::Utc;

    fn unreachable() -> HttpGateway {
        // Port 1 is never served in the test environment.
        HttpGateway::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap()
    }

    fn assert_failed<T: std::fmt::Debug>(resp: ApiResponse<T>) {
        assert!(!resp.success, "{resp:?}");
        assert!(resp.data.is_none());
        assert!(!resp.error.as_deref().unwrap_or("").trim().is_empty());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpGateway::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpGateway::new("ftp://files.example", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let gateway = HttpGateway::new("http://api.local/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            gateway.endpoint(&["auth", "profile", "0xabc"]).as_str(),
            "http://api.local/v1/auth/profile/0xabc"
        );
        assert_eq!(
            gateway.endpoint(&["upload", "a b/c"]).as_str(),
            "http://api.local/v1/upload/a%20b%2Fc"
        );
    }

    #[tokio::test]
    async fn test_every_operation_fails_softly_when_unreachable() {
        let gw = unreachable();
        let address = "0xabc";
        let png = CertificateFile {
            file_name: "c.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let mint = MintCertificateRequest {
            donation_id: Uuid::new_v4(),
            wallet_address: address.into(),
            blood_type: BloodType::OPositive,
            donation_date: Utc::now(),
            certificate_url: None,
        };

        assert_failed(gw.login(address, None).await);
        assert_failed(gw.get_profile(address).await);
        assert_failed(gw.update_profile(address, &UserPatch::default()).await);
        assert_failed(gw.get_requests(&RequestFilters::default()).await);
        assert_failed(
            gw.create_request(&NewBloodRequest {
                requester_address: address.into(),
                draft: BloodRequestDraft::new(BloodType::ONegative, "X", Urgency::Critical, "d"),
            })
            .await,
        );
        assert_failed(gw.get_user_donations(address).await);
        assert_failed(
            gw.create_donation(&NewDonation {
                donor_address: address.into(),
                draft: DonationDraft {
                    blood_type: BloodType::OPositive,
                    donation_date: None,
                },
            })
            .await,
        );
        assert_failed(gw.upload_certificate(&png, address, None).await);
        assert_failed(gw.get_file_info("c.png").await);
        assert_failed(gw.delete_file("c.png").await);
        assert_failed(gw.get_blood_banks(&BankFilters::default()).await);
        assert_failed(gw.get_user_notifications(address, true).await);
        assert_failed(gw.mark_as_read(Uuid::new_v4()).await);
        assert_failed(gw.mint_certificate(&mint).await);
        assert_failed(gw.health().await);
    }

    #[tokio::test]
    async fn test_upload_validation_happens_before_network() {
        // Unreachable backend: a validation message proves nothing was sent.
        let gw = unreachable();
        let text = CertificateFile {
            file_name: "notes.txt".into(),
            content_type: "text/plain".into(),
            bytes: b"hello".to_vec(),
        };
        let resp = gw.upload_certificate(&text, "0xabc", None).await;
        assert!(resp.error_message().unwrap().contains("Unsupported file type"));

        let big = CertificateFile {
            file_name: "big.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0; MAX_CERTIFICATE_SIZE + 1],
        };
        let resp = gw.upload_certificate(&big, "0xabc", None).await;
        assert!(resp.error_message().unwrap().contains("too large"));
    }

    async fn stub_backend() -> HttpGateway {
        let app = Router::new()
            .route("/health", get(|| async { "this is not json" }))
            .route(
                "/auth/profile/:address",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        axum::Json(serde_json::json!({ "success": false, "error": "db down" })),
                    )
                }),
            )
            .route(
                "/donations/:address",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
            )
            .route(
                "/requests",
                get(|| async { axum::Json(serde_json::json!({ "success": true })) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpGateway::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_bad_responses_are_normalized() {
        let gw = stub_backend().await;

        let malformed = gw.health().await;
        assert!(malformed.error_message().unwrap().starts_with("Malformed response"));

        let server_error = gw.get_profile("0xabc").await;
        assert_eq!(server_error.error_message(), Some("db down"));

        let plain_error = gw.get_user_donations("0xabc").await;
        assert!(plain_error.error_message().unwrap().contains("502"));

        let no_data = gw.get_requests(&RequestFilters::default()).await;
        assert_failed(no_data);
    }
}
