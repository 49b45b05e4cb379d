//! Tower layers and body timeouts applied to every route.
//!
//! `TimeoutLayer` bounds the handler future, which ends once the response
//! head is ready. Streamed bodies outlive it, so [`idle_timeout`] bounds the
//! wait for each further body chunk separately.

use std::{io, time::Duration};

use axum::Router;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::state::AppState;

/// Default per-request timeout applied to all routes.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Attach request tracing and the handler timeout to `router`.
pub fn apply(router: Router<AppState>, request_timeout: Duration) -> Router<AppState> {
    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}

/// Fail `body` with [`io::ErrorKind::TimedOut`] if no chunk arrives within
/// `idle`. The stream ends after the first error.
pub fn idle_timeout<S, E>(body: S, idle: Duration) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Into<io::Error>,
{
    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(e.into()), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "response body idle timeout",
                )),
                None,
            )),
        }
    })
}
