//! Shared application state injected into every Axum handler.

use std::{sync::Arc, time::Duration};

use envelope::CipherKey;

/// Application state shared across all request handlers.
///
/// The service does not start without a key, so every state holds one.
/// Cloned per request; the key sits behind an `Arc` so it is never copied.
#[derive(Clone)]
pub struct AppState {
    /// The loaded encryption key.
    pub key: Arc<CipherKey>,
    /// Longest wait for the next chunk of a streamed response body.
    pub body_idle_timeout: Duration,
}

impl AppState {
    /// Create a new [`AppState`] holding `key`.
    pub fn new(key: CipherKey, body_idle_timeout: Duration) -> Self {
        Self {
            key: Arc::new(key),
            body_idle_timeout,
        }
    }
}
