//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::PgSessionStore;
use crate::realtime::RoomHub;
use crate::services::AnalyticsService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and the relay hub.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    hub: RoomHub,
    sessions: PgSessionStore,
    analytics: AnalyticsService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                sessions: PgSessionStore::new(pool.clone()),
                analytics: AnalyticsService::new(pool.clone()),
                hub: RoomHub::default(),
                config,
                pool,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the live-update relay.
    #[must_use]
    pub fn hub(&self) -> &RoomHub {
        &self.inner.hub
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn sessions(&self) -> &PgSessionStore {
        &self.inner.sessions
    }

    /// Get a reference to the cached analytics service.
    #[must_use]
    pub fn analytics(&self) -> &AnalyticsService {
        &self.inner.analytics
    }
}
