//! Aggregate queries behind the merchant and admin dashboards.

use chrono::NaiveDate;
use sqlx::PgPool;

use queuehub_core::{MerchantId, QueueId};

use super::RepositoryError;
use crate::models::analytics::{
    DailyCount, MerchantStatusCounts, QueueBreakdown, TicketTotals,
};
use crate::models::{MerchantAnalytics, PlatformAnalytics};

#[derive(sqlx::FromRow)]
struct TotalsRow {
    issued: i64,
    served: i64,
    cancelled: i64,
    no_show: i64,
    avg_wait_minutes: Option<f64>,
    avg_service_minutes: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct QueueBreakdownRow {
    queue_id: i32,
    queue_name: String,
    issued: i64,
    served: i64,
    avg_wait_minutes: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct DailyRow {
    day: NaiveDate,
    issued: i64,
    served: i64,
}

#[derive(sqlx::FromRow)]
struct PlatformRow {
    pending: i64,
    active: i64,
    suspended: i64,
    users: i64,
    queues_open: i64,
    tickets_today: i64,
    tickets_served_last_7_days: i64,
}

/// Repository for dashboard aggregates.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

/// Start of a window of `$2` calendar days ending today, shared by the
/// totals, per-queue and daily queries so their counts agree.
const WINDOW_START: &str = "(CURRENT_DATE - ($2 - 1))::timestamptz";

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Ticket analytics of one merchant over the last `days` calendar days,
    /// today included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn merchant(
        &self,
        merchant_id: MerchantId,
        days: u32,
    ) -> Result<MerchantAnalytics, RepositoryError> {
        let days_i = i32::try_from(days).unwrap_or(i32::MAX);

        let totals = sqlx::query_as::<_, TotalsRow>(&format!(
            r"
            SELECT COUNT(*) AS issued,
                   COUNT(*) FILTER (WHERE status = 'completed') AS served,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                   COUNT(*) FILTER (WHERE status = 'no_show') AS no_show,
                   (AVG(EXTRACT(EPOCH FROM (called_at - joined_at)) / 60.0)
                       FILTER (WHERE called_at IS NOT NULL))::float8 AS avg_wait_minutes,
                   (AVG(EXTRACT(EPOCH FROM (finished_at - serving_at)) / 60.0)
                       FILTER (WHERE status = 'completed' AND serving_at IS NOT NULL))::float8
                       AS avg_service_minutes
            FROM queuehub.ticket
            WHERE merchant_id = $1 AND joined_at >= {WINDOW_START}
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(days_i)
        .fetch_one(self.pool)
        .await?;

        let waiting_now = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queuehub.ticket WHERE merchant_id = $1 AND status = 'waiting'",
        )
        .bind(merchant_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        let per_queue = sqlx::query_as::<_, QueueBreakdownRow>(&format!(
            r"
            SELECT q.id AS queue_id, q.name AS queue_name,
                   COUNT(t.id) AS issued,
                   COUNT(t.id) FILTER (WHERE t.status = 'completed') AS served,
                   (AVG(EXTRACT(EPOCH FROM (t.called_at - t.joined_at)) / 60.0)
                       FILTER (WHERE t.called_at IS NOT NULL))::float8 AS avg_wait_minutes
            FROM queuehub.queue q
            LEFT JOIN queuehub.ticket t
                ON t.queue_id = q.id AND t.joined_at >= {WINDOW_START}
            WHERE q.merchant_id = $1
            GROUP BY q.id, q.name
            ORDER BY issued DESC, q.id
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(days_i)
        .fetch_all(self.pool)
        .await?;

        let daily = sqlx::query_as::<_, DailyRow>(
            r"
            SELECT d.day::date AS day,
                   COUNT(t.id) AS issued,
                   COUNT(t.id) FILTER (WHERE t.status = 'completed') AS served
            FROM generate_series(
                CURRENT_DATE - ($2 - 1), CURRENT_DATE, INTERVAL '1 day'
            ) AS d(day)
            LEFT JOIN queuehub.ticket t
                ON t.merchant_id = $1 AND t.joined_at::date = d.day::date
            GROUP BY d.day
            ORDER BY d.day
            ",
        )
        .bind(merchant_id.as_i32())
        .bind(days_i)
        .fetch_all(self.pool)
        .await?;

        Ok(MerchantAnalytics {
            days,
            totals: TicketTotals {
                issued: totals.issued,
                served: totals.served,
                cancelled: totals.cancelled,
                no_show: totals.no_show,
                waiting_now,
            },
            avg_wait_minutes: totals.avg_wait_minutes,
            avg_service_minutes: totals.avg_service_minutes,
            per_queue: per_queue
                .into_iter()
                .map(|r| QueueBreakdown {
                    queue_id: QueueId::new(r.queue_id),
                    queue_name: r.queue_name,
                    issued: r.issued,
                    served: r.served,
                    avg_wait_minutes: r.avg_wait_minutes,
                })
                .collect(),
            daily: daily
                .into_iter()
                .map(|r| DailyCount {
                    day: r.day,
                    issued: r.issued,
                    served: r.served,
                })
                .collect(),
        })
    }

    /// Platform-wide totals for admins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn platform(&self) -> Result<PlatformAnalytics, RepositoryError> {
        let r = sqlx::query_as::<_, PlatformRow>(
            r"
            SELECT
                (SELECT COUNT(*) FROM queuehub.merchant WHERE status = 'pending') AS pending,
                (SELECT COUNT(*) FROM queuehub.merchant WHERE status = 'active') AS active,
                (SELECT COUNT(*) FROM queuehub.merchant WHERE status = 'suspended') AS suspended,
                (SELECT COUNT(*) FROM queuehub.user) AS users,
                (SELECT COUNT(*) FROM queuehub.queue WHERE status = 'open') AS queues_open,
                (SELECT COUNT(*) FROM queuehub.ticket
                    WHERE joined_at >= CURRENT_DATE) AS tickets_today,
                (SELECT COUNT(*) FROM queuehub.ticket
                    WHERE status = 'completed'
                      AND finished_at >= NOW() - INTERVAL '7 days') AS tickets_served_last_7_days
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(PlatformAnalytics {
            merchants: MerchantStatusCounts {
                pending: r.pending,
                active: r.active,
                suspended: r.suspended,
            },
            users: r.users,
            queues_open: r.queues_open,
            tickets_today: r.tickets_today,
            tickets_served_last_7_days: r.tickets_served_last_7_days,
        })
    }
}
