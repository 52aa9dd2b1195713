//! Dashboard analytics.

use chrono::NaiveDate;
use serde::Serialize;

use queuehub_core::QueueId;

/// Ticket counts by outcome.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TicketTotals {
    pub issued: i64,
    pub served: i64,
    pub cancelled: i64,
    pub no_show: i64,
    /// Tickets waiting right now, regardless of the window.
    pub waiting_now: i64,
}

/// Per-queue numbers within the window.
#[derive(Debug, Clone, Serialize)]
pub struct QueueBreakdown {
    pub queue_id: QueueId,
    pub queue_name: String,
    pub issued: i64,
    pub served: i64,
    pub avg_wait_minutes: Option<f64>,
}

/// Tickets issued and served on one day.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub issued: i64,
    pub served: i64,
}

/// Analytics for one merchant over the last `days` days.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantAnalytics {
    pub days: u32,
    pub totals: TicketTotals,
    /// Mean minutes from joining to being called.
    pub avg_wait_minutes: Option<f64>,
    /// Mean minutes from serving to completion.
    pub avg_service_minutes: Option<f64>,
    pub per_queue: Vec<QueueBreakdown>,
    pub daily: Vec<DailyCount>,
}

impl MerchantAnalytics {
    pub const DEFAULT_DAYS: u32 = 7;
    pub const MAX_DAYS: u32 = 90;

    /// Clamp a requested window to `1..=MAX_DAYS`.
    #[must_use]
    pub fn clamp_days(days: Option<u32>) -> u32 {
        days.unwrap_or(Self::DEFAULT_DAYS).clamp(1, Self::MAX_DAYS)
    }

    /// Share of issued tickets that were served, in percent.
    #[must_use]
    pub fn service_rate(&self) -> Option<f64> {
        if self.totals.issued == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)] // ticket counts stay far below 2^52
        Some(self.totals.served as f64 * 100.0 / self.totals.issued as f64)
    }
}

/// Merchant counts by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MerchantStatusCounts {
    pub pending: i64,
    pub active: i64,
    pub suspended: i64,
}

/// Platform-wide numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformAnalytics {
    pub merchants: MerchantStatusCounts,
    pub users: i64,
    pub queues_open: i64,
    pub tickets_today: i64,
    pub tickets_served_last_7_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_days() {
        assert_eq!(MerchantAnalytics::clamp_days(None), 7);
        assert_eq!(MerchantAnalytics::clamp_days(Some(0)), 1);
        assert_eq!(MerchantAnalytics::clamp_days(Some(365)), 90);
        assert_eq!(MerchantAnalytics::clamp_days(Some(30)), 30);
    }

    #[test]
    fn test_service_rate() {
        let mut analytics = MerchantAnalytics {
            days: 7,
            totals: TicketTotals::default(),
            avg_wait_minutes: None,
            avg_service_minutes: None,
            per_queue: Vec::new(),
            daily: Vec::new(),
        };
        assert_eq!(analytics.service_rate(), None);
        analytics.totals.issued = 4;
        analytics.totals.served = 3;
        assert_eq!(analytics.service_rate(), Some(75.0));
    }
}
