//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::UnsupportedMediaType`] → 415
/// - [`ServiceError::EncryptionFailure`] → 500
///
/// Messages are shown to callers and must never carry cipher internals or key
/// material.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request body is not a valid envelope or could not be read.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body has the wrong content type for the route.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Encryption or decryption failed due to a crypto-layer error.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::UnsupportedMediaType(_) => 415,
            ServiceError::EncryptionFailure(_) => 500,
        }
    }

    /// Short machine-readable error code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::UnsupportedMediaType(_) => "unsupported_media_type",
            ServiceError::EncryptionFailure(_) => "encryption_failure",
        }
    }
}
