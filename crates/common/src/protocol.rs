//! Response types and wire constants shared by the HTTP service and its clients.
//!
//! Envelope payloads travel as raw bytes; only errors and health checks are JSON.

use serde::{Deserialize, Serialize};

/// Content type of encrypted request and response bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status. Always `"ok"` once the service is serving.
    pub status: String,
    /// Whether the encryption key is loaded. The service refuses to start
    /// without one.
    pub key_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("bad_request", "invalid envelope");
        assert_eq!(e.code, "bad_request");
        assert!(e.message.contains("invalid envelope"));
    }

    #[test]
    fn error_response_from_service_error() {
        let e = ErrorResponse::from(&ServiceError::UnsupportedMediaType(
            "expected application/octet-stream".into(),
        ));
        assert_eq!(e.code, "unsupported_media_type");
        assert!(e.message.contains("application/octet-stream"));
    }

    #[test]
    fn health_response_serde() {
        let h = HealthResponse {
            status: "ok".into(),
            key_loaded: true,
        };
        let json = serde_json::to_string(&h).unwrap();
        let decoded: HealthResponse = serde_json::from_str(&json).unwrap();
        assert!(decoded.key_loaded);
        assert_eq!(decoded.status, "ok");
    }
}
