//! Domain models for the QueueHub server.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod activity;
pub mod analytics;
pub mod branch;
pub mod merchant;
pub mod message;
pub mod page;
pub mod queue;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

use queuehub_core::{Email, MerchantId, UserId, UserRole};

pub use activity::{ActivityEntry, NewActivity};
pub use analytics::{MerchantAnalytics, PlatformAnalytics};
pub use branch::Branch;
pub use merchant::{Merchant, MerchantDetail};
pub use message::Message;
pub use page::{Page, PageQuery};
pub use queue::{Queue, QueueWithCounts};
pub use ticket::{PublicTicket, Ticket};
pub use user::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user. The
/// role and merchant binding are copied at login so tenancy checks do not
/// need a database round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role at login time.
    pub role: UserRole,
    /// Merchant the user belongs to, `None` for admins.
    pub merchant_id: Option<MerchantId>,
}

impl CurrentUser {
    /// Whether this user is QueueHub staff.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether this user may act on resources of `merchant_id`.
    #[must_use]
    pub fn can_access_merchant(&self, merchant_id: MerchantId) -> bool {
        self.is_admin() || self.merchant_id == Some(merchant_id)
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            merchant_id: user.merchant_id,
        }
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
