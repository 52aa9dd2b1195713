//! Database operations for the QueueHub `PostgreSQL` schema.
//!
//! # Schema: `queuehub`
//!
//! ## Tables
//!
//! - `merchant` - Tenants, with status and plan
//! - `user` - Admins, merchant owners and staff
//! - `branch` - Physical locations of a merchant
//! - `queue` - Waiting lines at a branch
//! - `ticket` - One customer's place in a queue
//! - `message` - Merchant messages relayed to queue rooms
//! - `activity_log` - Audit trail of dashboard actions
//! - `session` - Server-side login sessions (see [`sessions::PgSessionStore`])
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p queuehub-cli -- migrate
//! ```

pub mod activity;
pub mod analytics;
pub mod branches;
pub mod merchants;
pub mod messages;
pub mod queues;
pub mod sessions;
pub mod tickets;
pub mod users;

use std::time::Duration;

use queuehub_core::PlanTier;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use activity::ActivityRepository;
pub use analytics::AnalyticsRepository;
pub use branches::BranchRepository;
pub use merchants::MerchantRepository;
pub use messages::MessageRepository;
pub use queues::QueueRepository;
pub use sessions::PgSessionStore;
pub use tickets::TicketRepository;
pub use users::UserRepository;

/// Outcome of an insert bounded by the merchant's plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanLimited<T> {
    Created(T),
    /// The plan's limit was already reached; nothing was inserted.
    LimitReached { plan: PlanTier, existing: i64 },
}

impl<T> PlanLimited<T> {
    /// The inserted value, if the plan allowed it.
    pub fn created(self) -> Option<T> {
        match self {
            Self::Created(value) => Some(value),
            Self::LimitReached { .. } => None,
        }
    }
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert 1-based page parameters into `LIMIT`/`OFFSET`.
#[must_use]
pub(crate) fn limit_offset(page: u32, per_page: u32) -> (i64, i64) {
    let page = i64::from(page.max(1));
    let per_page = i64::from(per_page);
    (per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_offset() {
        assert_eq!(limit_offset(1, 20), (20, 0));
        assert_eq!(limit_offset(3, 20), (20, 40));
        assert_eq!(limit_offset(0, 10), (10, 0));
    }
}
