//! The `{ success, data, error }` envelope every API call resolves to.
//!
//! The server wraps every body in it and the client gateway converts every
//! failure mode (transport, status, payload) into it, so callers only ever
//! branch on `success`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response. Empty messages are replaced so `error` is never
    /// blank.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            error
        };
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Enforce the envelope contract on a decoded body: a success must carry
    /// data and a failure must carry a message.
    pub fn normalized(self) -> Self {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Self::ok(data),
            (true, None, _) => Self::failure("Response carried no data"),
            (false, _, error) => Self::failure(error.unwrap_or_default()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_result(self) -> Result<T, String> {
        match self.normalized() {
            ApiResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            ApiResponse { error, .. } => Err(error.unwrap_or_else(|| "Unknown error".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_skips_error_field() {
        let json = serde_json::to_value(ApiResponse::ok(5u32)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": 5 }));
    }

    #[test]
    fn test_failure_never_blank() {
        let resp: ApiResponse<()> = ApiResponse::failure("  ");
        assert_eq!(resp.error_message(), Some("Unknown error"));
    }

    #[test]
    fn test_normalized_success_without_data() {
        let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        let resp = resp.normalized();
        assert!(!resp.success);
        assert!(resp.error.is_some());
    }

    #[test]
    fn test_decodes_payloads_without_default() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Receipt {
            token_id: String,
        }

        let resp: ApiResponse<Receipt> =
            serde_json::from_str(r#"{"success":true,"data":{"token_id":"7"}}"#).unwrap();
        assert_eq!(resp.into_result().unwrap().token_id, "7");

        let resp: ApiResponse<Receipt> =
            serde_json::from_str(r#"{"success":false,"error":"Donation not found"}"#).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.error_message(), Some("Donation not found"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ApiResponse::ok(1).into_result(), Ok(1));
        let failed: ApiResponse<u8> = ApiResponse::failure("nope");
        assert_eq!(failed.into_result(), Err("nope".to_string()));
    }
}
