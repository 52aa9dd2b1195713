//! Queue repository. Every dashboard query is scoped by merchant.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use queuehub_core::{BranchId, MerchantId, QueueId, QueueStatus};

use super::{PlanLimited, RepositoryError, merchants};
use crate::models::{Queue, QueueWithCounts};

const QUEUE_COLUMNS: &str = "q.id, q.merchant_id, q.branch_id, q.name, q.description, q.status, \
     q.avg_service_minutes, q.max_size, q.created_at, q.updated_at";

/// Live counts joined onto each queue row.
const COUNTS_JOIN: &str = r"
    LEFT JOIN LATERAL (
        SELECT COUNT(*) FILTER (WHERE t.status = 'waiting') AS waiting_count,
               COUNT(*) FILTER (WHERE t.status = 'called') AS called_count,
               COUNT(*) FILTER (WHERE t.status = 'serving') AS serving_count
        FROM queuehub.ticket t
        WHERE t.queue_id = q.id
    ) c ON TRUE";

#[derive(sqlx::FromRow)]
pub(crate) struct QueueRow {
    id: i32,
    merchant_id: i32,
    branch_id: i32,
    name: String,
    description: String,
    status: QueueStatus,
    avg_service_minutes: i32,
    max_size: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QueueRow> for Queue {
    fn from(r: QueueRow) -> Self {
        Self {
            id: QueueId::new(r.id),
            merchant_id: MerchantId::new(r.merchant_id),
            branch_id: BranchId::new(r.branch_id),
            name: r.name,
            description: r.description,
            status: r.status,
            avg_service_minutes: r.avg_service_minutes,
            max_size: r.max_size,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QueueCountsRow {
    #[sqlx(flatten)]
    queue: QueueRow,
    waiting_count: i64,
    called_count: i64,
    serving_count: i64,
}

impl From<QueueCountsRow> for QueueWithCounts {
    fn from(r: QueueCountsRow) -> Self {
        Self {
            queue: r.queue.into(),
            waiting_count: r.waiting_count,
            called_count: r.called_count,
            serving_count: r.serving_count,
        }
    }
}

/// Fields of a new queue.
#[derive(Debug, Clone)]
pub struct NewQueue {
    pub branch_id: BranchId,
    pub name: String,
    pub description: String,
    pub avg_service_minutes: i32,
    pub max_size: Option<i32>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct QueueChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avg_service_minutes: Option<i32>,
    /// `Some(None)` removes the cap.
    pub max_size: Option<Option<i32>>,
}

/// Repository for queue database operations.
pub struct QueueRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QueueRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Queues of a merchant with live counts, optionally for one branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        merchant_id: MerchantId,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<QueueWithCounts>, RepositoryError> {
        let rows = sqlx::query_as::<_, QueueCountsRow>(&format!(
            r"
            SELECT {QUEUE_COLUMNS}, c.waiting_count, c.called_count, c.serving_count
            FROM queuehub.queue q
            {COUNTS_JOIN}
            WHERE q.merchant_id = $1 AND ($2::int IS NULL OR q.branch_id = $2)
            ORDER BY q.branch_id, q.id
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(branch_id.map(|id| id.as_i32()))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(QueueWithCounts::from).collect())
    }

    /// Open queues at active branches, for the public merchant page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_public(
        &self,
        merchant_id: MerchantId,
    ) -> Result<Vec<QueueWithCounts>, RepositoryError> {
        let rows = sqlx::query_as::<_, QueueCountsRow>(&format!(
            r"
            SELECT {QUEUE_COLUMNS}, c.waiting_count, c.called_count, c.serving_count
            FROM queuehub.queue q
            JOIN queuehub.branch b ON b.id = q.branch_id
            {COUNTS_JOIN}
            WHERE q.merchant_id = $1 AND q.status = 'open' AND b.is_active
            ORDER BY q.branch_id, q.id
            "
        ))
        .bind(merchant_id.as_i32())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(QueueWithCounts::from).collect())
    }

    /// Get one queue of a merchant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    pub async fn get(&self, merchant_id: MerchantId, id: QueueId) -> Result<Queue, RepositoryError> {
        sqlx::query_as::<_, QueueRow>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queuehub.queue q WHERE q.id = $1 AND q.merchant_id = $2"
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .map(Queue::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Get a queue without tenant scoping, for public and relay paths.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the queue doesn't exist.
    pub async fn get_any(&self, id: QueueId) -> Result<Queue, RepositoryError> {
        sqlx::query_as::<_, QueueRow>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queuehub.queue q WHERE q.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .map(Queue::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Get one queue of a merchant with live counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    pub async fn get_with_counts(
        &self,
        merchant_id: MerchantId,
        id: QueueId,
    ) -> Result<QueueWithCounts, RepositoryError> {
        sqlx::query_as::<_, QueueCountsRow>(&format!(
            r"
            SELECT {QUEUE_COLUMNS}, c.waiting_count, c.called_count, c.serving_count
            FROM queuehub.queue q
            {COUNTS_JOIN}
            WHERE q.id = $1 AND q.merchant_id = $2
            "
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .map(QueueWithCounts::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Tickets currently waiting in a queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn waiting_count(&self, id: QueueId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queuehub.ticket WHERE queue_id = $1 AND status = 'waiting'",
        )
        .bind(id.as_i32())
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Insert a queue at one of the merchant's branches, if the plan allows
    /// another queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the branch doesn't belong to the merchant.
    pub async fn create(
        &self,
        merchant_id: MerchantId,
        new: &NewQueue,
    ) -> Result<PlanLimited<Queue>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let plan = merchants::lock_plan(&mut *tx, merchant_id).await?;
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queuehub.queue WHERE merchant_id = $1",
        )
        .bind(merchant_id.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        if !plan.allows_another_queue(existing) {
            return Ok(PlanLimited::LimitReached { plan, existing });
        }

        let row = sqlx::query_as::<_, QueueRow>(&format!(
            r"
            WITH q AS (
                INSERT INTO queuehub.queue
                    (merchant_id, branch_id, name, description, avg_service_minutes, max_size)
                SELECT $1, b.id, $3, $4, $5, $6
                FROM queuehub.branch b
                WHERE b.id = $2 AND b.merchant_id = $1
                RETURNING *
            )
            SELECT {QUEUE_COLUMNS} FROM q
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(new.branch_id.as_i32())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.avg_service_minutes)
        .bind(new.max_size)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(RepositoryError::NotFound);
        };

        tx.commit().await?;
        Ok(PlanLimited::Created(row.into()))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    pub async fn update(
        &self,
        merchant_id: MerchantId,
        id: QueueId,
        changes: &QueueChanges,
    ) -> Result<Queue, RepositoryError> {
        sqlx::query_as::<_, QueueRow>(&format!(
            r"
            WITH q AS (
                UPDATE queuehub.queue SET
                    name = COALESCE($3, name),
                    description = COALESCE($4, description),
                    avg_service_minutes = COALESCE($5, avg_service_minutes),
                    max_size = CASE WHEN $6 THEN $7 ELSE max_size END,
                    updated_at = NOW()
                WHERE id = $1 AND merchant_id = $2
                RETURNING *
            )
            SELECT {QUEUE_COLUMNS} FROM q
            "
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.avg_service_minutes)
        .bind(changes.max_size.is_some())
        .bind(changes.max_size.flatten())
        .fetch_optional(self.pool)
        .await?
        .map(Queue::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Open, pause or close a queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    pub async fn set_status(
        &self,
        merchant_id: MerchantId,
        id: QueueId,
        status: QueueStatus,
    ) -> Result<Queue, RepositoryError> {
        sqlx::query_as::<_, QueueRow>(&format!(
            r"
            WITH q AS (
                UPDATE queuehub.queue SET status = $3, updated_at = NOW()
                WHERE id = $1 AND merchant_id = $2
                RETURNING *
            )
            SELECT {QUEUE_COLUMNS} FROM q
            "
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .map(Queue::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a queue that has no waiting, called or serving tickets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    /// Returns `RepositoryError::Conflict` if the queue still has active tickets.
    pub async fn delete(&self, merchant_id: MerchantId, id: QueueId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM queuehub.queue WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let active = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM queuehub.ticket
            WHERE queue_id = $1 AND status IN ('waiting', 'called', 'serving')
            ",
        )
        .bind(id.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(RepositoryError::Conflict(format!(
                "queue has {active} active ticket(s)"
            )));
        }

        sqlx::query("DELETE FROM queuehub.queue WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
