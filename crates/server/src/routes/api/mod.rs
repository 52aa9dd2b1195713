//! JSON API consumed by the dashboards and customer screens.
//!
//! Every handler returns `Result<_, AppError>`; errors are rendered as
//! `{"error": "..."}` with a matching status code.

pub mod admin;
pub mod auth;
pub mod merchant;
pub mod public;

use axum::Router;

use crate::db::ActivityRepository;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::models::NewActivity;
use crate::state::AppState;

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes().layer(auth_rate_limiter()))
        .nest("/merchant", merchant::routes())
        .nest("/public", public::routes().layer(api_rate_limiter()))
        .nest("/admin", admin::routes())
}

/// Write an audit entry. Failures are logged, never surfaced to the caller.
pub(crate) async fn record_activity(state: &AppState, entry: NewActivity) {
    if let Err(e) = ActivityRepository::new(state.pool()).record(&entry).await {
        tracing::warn!(error = %e, action = entry.action, "Failed to record activity");
    }
}

/// Trim an optional text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Main St ")), Some("Main St".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
