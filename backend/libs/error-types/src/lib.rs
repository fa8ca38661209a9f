//! Shared error envelope for Encore backend services
//!
//! Every service serializes its HTTP error responses through [`ErrorResponse`]
//! so clients can rely on a single wire shape regardless of which service
//! produced the error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable machine-readable error codes shared across services.
pub mod error_codes {
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
}

/// Wire format for error responses.
///
/// ```json
/// {
///   "error": {
///     "title": "Service Unavailable",
///     "message": "signal store fetch failed",
///     "status": 503,
///     "type": "upstream_error",
///     "code": "UPSTREAM_UNAVAILABLE",
///     "timestamp": "2026-01-01T00:00:00Z"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub title: String,
    pub message: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(title: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: ErrorDetail {
                title: title.to_string(),
                message: message.to_string(),
                status,
                error_type: error_type.to_string(),
                code: code.to_string(),
                timestamp: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let resp = ErrorResponse::new(
            "Bad Request",
            "limit must be numeric",
            400,
            "validation_error",
            error_codes::INVALID_REQUEST,
        );

        assert_eq!(resp.error.status, 400);
        assert_eq!(resp.error.code, "INVALID_REQUEST");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"]["type"], "validation_error");
    }
}
