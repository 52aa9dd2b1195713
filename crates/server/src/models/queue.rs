//! Queue domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use queuehub_core::{BranchId, MerchantId, QueueId, QueueStatus};

/// A named waiting line at a branch.
#[derive(Debug, Clone, Serialize)]
pub struct Queue {
    pub id: QueueId,
    pub merchant_id: MerchantId,
    pub branch_id: BranchId,
    pub name: String,
    pub description: String,
    pub status: QueueStatus,
    /// Minutes one customer takes at the counter, used for wait estimates.
    pub avg_service_minutes: i32,
    /// Cap on active tickets; `None` means unlimited.
    pub max_size: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Queue {
    /// Whether `active` tickets already fill the queue.
    #[must_use]
    pub fn is_full(&self, active: i64) -> bool {
        self.max_size.is_some_and(|max| active >= i64::from(max))
    }

    /// Estimated wait for a customer with `position` tickets ahead.
    #[must_use]
    pub fn estimated_wait_minutes(&self, position: i64) -> i64 {
        position.max(0) * i64::from(self.avg_service_minutes)
    }
}

/// A queue with its live ticket counts.
#[derive(Debug, Clone, Serialize)]
pub struct QueueWithCounts {
    #[serde(flatten)]
    pub queue: Queue,
    pub waiting_count: i64,
    pub called_count: i64,
    pub serving_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(max_size: Option<i32>) -> Queue {
        Queue {
            id: QueueId::new(1),
            merchant_id: MerchantId::new(1),
            branch_id: BranchId::new(1),
            name: "Counter".to_owned(),
            description: String::new(),
            status: QueueStatus::Open,
            avg_service_minutes: 4,
            max_size,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_full() {
        assert!(!queue(None).is_full(10_000));
        assert!(!queue(Some(3)).is_full(2));
        assert!(queue(Some(3)).is_full(3));
    }

    #[test]
    fn test_estimated_wait() {
        let q = queue(None);
        assert_eq!(q.estimated_wait_minutes(0), 0);
        assert_eq!(q.estimated_wait_minutes(5), 20);
    }
}
