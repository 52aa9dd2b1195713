//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions and
//! [`PgSessionStore`].

use tower_sessions::{Expiry, SessionManagerLayer};

use crate::config::ServerConfig;
use crate::db::PgSessionStore;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "qh_session";

/// Create the session layer over the shared session store.
#[must_use]
pub fn create_session_layer(
    store: PgSessionStore,
    config: &ServerConfig,
) -> SessionManagerLayer<PgSessionStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::hours(config.session_hours),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
