//! Activity (audit) log types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use queuehub_core::{ActivityLogId, MerchantId, UserId};

/// Well-known `action` values.
pub mod actions {
    pub const SIGNUP: &str = "merchant.signup";
    pub const LOGIN: &str = "user.login";
    pub const PASSWORD_CHANGED: &str = "user.password_changed";
    pub const SESSIONS_REVOKED: &str = "user.sessions_revoked";
    pub const PROFILE_UPDATED: &str = "merchant.profile_updated";
    pub const MERCHANT_STATUS_CHANGED: &str = "merchant.status_changed";
    pub const MERCHANT_PLAN_CHANGED: &str = "merchant.plan_changed";
    pub const BRANCH_CREATED: &str = "branch.created";
    pub const BRANCH_UPDATED: &str = "branch.updated";
    pub const BRANCH_DELETED: &str = "branch.deleted";
    pub const QUEUE_CREATED: &str = "queue.created";
    pub const QUEUE_UPDATED: &str = "queue.updated";
    pub const QUEUE_STATUS_CHANGED: &str = "queue.status_changed";
    pub const QUEUE_DELETED: &str = "queue.deleted";
    pub const TICKET_WALK_IN: &str = "ticket.walk_in";
    pub const TICKET_CALLED: &str = "ticket.called";
    pub const TICKET_STATUS_CHANGED: &str = "ticket.status_changed";
    pub const MESSAGE_SENT: &str = "message.sent";
    pub const STAFF_INVITED: &str = "staff.invited";
    pub const STAFF_REMOVED: &str = "staff.removed";
}

/// A recorded dashboard action.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: ActivityLogId,
    pub merchant_id: Option<MerchantId>,
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i32>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// An activity entry about to be written.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub merchant_id: Option<MerchantId>,
    pub user_id: Option<UserId>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i32>,
    pub details: Value,
}

impl NewActivity {
    /// Start an entry for `action` on an entity.
    #[must_use]
    pub fn new(action: &'static str, entity_type: &'static str, entity_id: i32) -> Self {
        Self {
            merchant_id: None,
            user_id: None,
            action,
            entity_type,
            entity_id: Some(entity_id),
            details: Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub const fn merchant(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    #[must_use]
    pub const fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_empty_details() {
        let entry = NewActivity::new(actions::QUEUE_CREATED, "queue", 4)
            .merchant(MerchantId::new(2))
            .by(UserId::new(9));
        assert_eq!(entry.merchant_id, Some(MerchantId::new(2)));
        assert_eq!(entry.user_id, Some(UserId::new(9)));
        assert_eq!(entry.entity_id, Some(4));
        assert!(entry.details.as_object().is_some_and(serde_json::Map::is_empty));
    }
}
