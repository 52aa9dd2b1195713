//! HTTP routes for QueueHub.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /features               - Feature overview
//! GET  /pricing                - Plan cards
//! GET  /login                  - Points to the dashboard login
//! GET  /signup?plan=           - Points to the dashboard signup wizard
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//! GET  /ws                     - Live-update relay (WebSocket)
//! GET  /static/*               - Stylesheet and images
//!
//! # JSON API (see [`api`])
//! /api/auth/*                  - Signup, login, logout, me, password (rate limited)
//! /api/merchant/*              - Merchant dashboard (owner or staff)
//! /api/public/*                - Customer join and ticket tracking (rate limited)
//! /api/admin/*                 - Platform admin
//! ```

pub mod api;
pub mod pages;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::middleware::{
    create_session_layer, request_id_middleware, security_headers_middleware,
};
use crate::realtime::ws::ws_handler;
use crate::state::AppState;

/// Directory served under `/static`.
const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Create the page, API and relay routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/features", get(pages::features))
        .route("/pricing", get(pages::pricing))
        .route("/login", get(pages::login))
        .route("/signup", get(pages::signup))
        .route("/dashboard", get(pages::dashboard))
        .nest("/api", api::api_routes())
        .route("/ws", get(ws_handler))
}

/// Build the full application with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.sessions().clone(), state.config());
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .fallback(pages::not_found)
        .layer(from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Allow the configured dashboard origins to call the API with cookies.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
