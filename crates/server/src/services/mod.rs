//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Signup, login, password changes and staff accounts
//! - `queue` - Ticket lifecycle and queue status, with live relay
//! - `analytics` - Cached dashboard analytics

pub mod analytics;
pub mod auth;
pub mod queue;

pub use analytics::AnalyticsService;
pub use auth::{AuthError, AuthService};
pub use queue::{JoinRequest, QueueError, QueueService};
