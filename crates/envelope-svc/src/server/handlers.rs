//! Axum request handlers for all service endpoints.
//!
//! Request and response bodies are streamed: neither handler buffers more of
//! the payload than the codec itself holds back.

use std::{io, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{
    protocol::{ErrorResponse, HealthResponse, OCTET_STREAM},
    ServiceError,
};
use envelope::{CodecError, EnvelopeStream};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use super::{middleware::idle_timeout, state::AppState};

/// `POST /encrypt`: wrap the request body in a fresh envelope.
pub async fn encrypt(State(state): State<AppState>, body: Body) -> Response {
    let input = body.into_data_stream().map_err(io::Error::other);
    match envelope::encode(input, state.key.as_bytes()) {
        Ok(output) => start_stream(output, state.body_idle_timeout).await,
        Err(e) => error_response(codec_error(e)),
    }
}

/// `POST /decrypt`: open an envelope sent as `application/octet-stream`.
pub async fn decrypt(State(state): State<AppState>, headers: HeaderMap, body: Body) -> Response {
    if !is_octet_stream(&headers) {
        return error_response(ServiceError::UnsupportedMediaType(format!(
            "expected {OCTET_STREAM}"
        )));
    }

    let input = body.into_data_stream().map_err(io::Error::other);
    match envelope::decode(input, state.key.as_bytes()) {
        Ok(output) => start_stream(output, state.body_idle_timeout).await,
        Err(e) => error_response(codec_error(e)),
    }
}

/// `GET /health`: liveness check.
///
/// The process only serves once its key is loaded, so a reachable service
/// always reports `ok`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        key_loaded: true,
    })
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Streaming helpers
// ---------------------------------------------------------------------------

/// Poll `output` for its first chunk, then hand the rest to the response body.
///
/// Failures before the first chunk become a JSON error response. Once the
/// status line is committed a failure, including a stall longer than `idle`,
/// can only abort the body.
async fn start_stream(mut output: EnvelopeStream, idle: Duration) -> Response {
    let first = match output.next().await.transpose() {
        Ok(first) => first,
        Err(e) => return error_response(codec_error(e)),
    };

    let rest = idle_timeout(output, idle)
        .inspect_err(|e| warn!(error = %e, "envelope stream aborted mid-body"));
    let body = stream::iter(first.map(Ok::<_, io::Error>)).chain(rest);

    ([(CONTENT_TYPE, OCTET_STREAM)], Body::from_stream(body)).into_response()
}

fn is_octet_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(OCTET_STREAM))
}

/// Map a codec failure to a caller-safe [`ServiceError`].
fn codec_error(err: CodecError) -> ServiceError {
    debug!(error = %err, "codec error");
    match err {
        CodecError::TruncatedEnvelope { .. } => {
            ServiceError::BadRequest("envelope is truncated".into())
        }
        CodecError::CorruptCiphertext => {
            ServiceError::BadRequest("envelope could not be decrypted".into())
        }
        CodecError::Upstream(_) => ServiceError::BadRequest("failed to read request body".into()),
        CodecError::InvalidKeyLength(_) => {
            ServiceError::EncryptionFailure("encryption key is misconfigured".into())
        }
    }
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warn!(status = status.as_u16(), code = err.code(), "request failed");
    (status, Json(ErrorResponse::from(&err))).into_response()
}
