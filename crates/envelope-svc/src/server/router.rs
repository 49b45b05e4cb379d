//! Axum router construction.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/encrypt", post(handlers::encrypt))
        .route("/decrypt", post(handlers::decrypt))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found);

    middleware::apply(routes, request_timeout).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::middleware::DEFAULT_REQUEST_TIMEOUT;
    use axum::{body::Body, http::Request};
    use envelope::CipherKey;
    use tower::ServiceExt;

    fn app() -> Router {
        build(
            AppState::new(CipherKey::from_array([5u8; 32]), DEFAULT_REQUEST_TIMEOUT),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = app();
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = app();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn encrypt_rejects_get() {
        let app = app();
        let req = Request::builder()
            .uri("/encrypt")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 405);
    }
}
