//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use queuehub_core::{Email, MerchantId, UserId, UserRole};

/// A QueueHub user (domain type).
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    /// Set for merchant owners and staff, `None` for admins.
    pub merchant_id: Option<MerchantId>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
