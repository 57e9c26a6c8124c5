use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use super::account::account_router;
use super::admin::admin_router;
use super::social::social_router;
use super::user::user_router;
use crate::assistant::Assistant;
use crate::config::AuthSettings;
use crate::emissions::EmissionCalculator;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub calculator: EmissionCalculator,
    pub assistant: Assistant,
    pub auth: AuthSettings,
}

impl AppState {
    /// State with the built-in factor catalog only and no assistant backend.
    pub fn local(store: Arc<dyn Store>) -> Self {
        Self {
            calculator: EmissionCalculator::new(store.clone(), "global"),
            assistant: Assistant::new(None),
            auth: AuthSettings::default(),
            store,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", account_router())
        .nest("/api/social", social_router())
        .nest("/api/admin", admin_router())
        .nest("/api", user_router())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, StatusCode, header};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::store::SqliteStore;

    fn app() -> (TempDir, Router) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let state = Arc::new(AppState::local(Arc::new(store)));
        (temp, create_router(state))
    }

    #[tokio::test]
    async fn test_health() {
        let (_temp, app) = app();
        let response = app
            .oneshot(axum::http::Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight_is_allowed() {
        let (_temp, app) = app();
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/scenarios")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (_temp, app) = app();
        let response = app
            .oneshot(axum::http::Request::get("/api/scenarios").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
