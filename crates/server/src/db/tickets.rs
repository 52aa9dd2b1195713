//! Ticket repository: joining, calling and status transitions.
//!
//! Ticket numbers are assigned as `MAX(number) + 1` while holding a row lock on
//! the parent queue, so concurrent joins to the same queue serialise and never
//! hand out the same number.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use queuehub_core::{MerchantId, MerchantStatus, QueueId, QueueStatus, TicketId, TicketStatus};

use super::RepositoryError;
use super::queues::QueueRow;
use crate::models::{PublicTicket, Queue, Ticket};

const TICKET_COLUMNS: &str = "id, queue_id, merchant_id, number, public_token, customer_name, \
     customer_phone, status, notes, joined_at, called_at, serving_at, finished_at";

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i32,
    queue_id: i32,
    merchant_id: i32,
    number: i32,
    public_token: Uuid,
    customer_name: String,
    customer_phone: Option<String>,
    status: TicketStatus,
    notes: Option<String>,
    joined_at: DateTime<Utc>,
    called_at: Option<DateTime<Utc>>,
    serving_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl From<TicketRow> for Ticket {
    fn from(r: TicketRow) -> Self {
        Self {
            id: TicketId::new(r.id),
            queue_id: QueueId::new(r.queue_id),
            merchant_id: MerchantId::new(r.merchant_id),
            number: r.number,
            public_token: r.public_token,
            customer_name: r.customer_name,
            customer_phone: r.customer_phone,
            status: r.status,
            notes: r.notes,
            joined_at: r.joined_at,
            called_at: r.called_at,
            serving_at: r.serving_at,
            finished_at: r.finished_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LockedQueueRow {
    #[sqlx(flatten)]
    queue: QueueRow,
    #[sqlx(flatten)]
    state: JoinState,
}

/// What besides the queue itself decides a join, read under the queue lock.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
struct JoinState {
    merchant_status: MerchantStatus,
    branch_active: bool,
    active_count: i64,
}

#[derive(sqlx::FromRow)]
struct PublicTicketRow {
    public_token: Uuid,
    number: i32,
    status: TicketStatus,
    customer_name: String,
    joined_at: DateTime<Utc>,
    called_at: Option<DateTime<Utc>>,
    queue_id: i32,
    queue_name: String,
    queue_status: QueueStatus,
    avg_service_minutes: i32,
    merchant_name: String,
    position: i64,
}

/// Who is adding the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSource {
    /// A customer through the public API: queue must be open and not full.
    Customer,
    /// Staff adding a walk-in for their own merchant: queue must be open.
    WalkIn(MerchantId),
}

/// Customer details for a new ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    QueueNotFound,
    QueueNotAccepting(QueueStatus),
    MerchantUnavailable,
    QueueFull,
}

/// Result of [`TicketRepository::join`].
#[derive(Debug)]
pub enum JoinOutcome {
    Joined { ticket: Ticket, queue: Queue },
    Rejected(JoinRejection),
}

/// Decide whether a ticket may be added, given the locked queue state.
///
/// Only open queues take tickets. Staff walk-ins may go past `max_size`;
/// customers may not, and only see queues of active branches.
fn check_join(source: JoinSource, queue: &Queue, state: JoinState) -> Option<JoinRejection> {
    match source {
        JoinSource::Customer => {
            if !state.branch_active {
                return Some(JoinRejection::QueueNotFound);
            }
            if !state.merchant_status.accepts_customers() {
                return Some(JoinRejection::MerchantUnavailable);
            }
            if !queue.status.accepts_tickets() {
                return Some(JoinRejection::QueueNotAccepting(queue.status));
            }
            if queue.is_full(state.active_count) {
                return Some(JoinRejection::QueueFull);
            }
            None
        }
        JoinSource::WalkIn(merchant_id) => {
            if queue.merchant_id != merchant_id {
                return Some(JoinRejection::QueueNotFound);
            }
            if !queue.status.accepts_tickets() {
                return Some(JoinRejection::QueueNotAccepting(queue.status));
            }
            None
        }
    }
}

/// Repository for ticket database operations.
pub struct TicketRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add a ticket to a queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails. Business-rule
    /// refusals are returned as [`JoinOutcome::Rejected`].
    pub async fn join(
        &self,
        queue_id: QueueId,
        source: JoinSource,
        new: &NewTicket,
    ) -> Result<JoinOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, LockedQueueRow>(
            r"
            SELECT q.id, q.merchant_id, q.branch_id, q.name, q.description, q.status,
                   q.avg_service_minutes, q.max_size, q.created_at, q.updated_at,
                   m.status AS merchant_status,
                   b.is_active AS branch_active,
                   (SELECT COUNT(*) FROM queuehub.ticket t
                    WHERE t.queue_id = q.id
                      AND t.status IN ('waiting', 'called', 'serving')) AS active_count
            FROM queuehub.queue q
            JOIN queuehub.merchant m ON m.id = q.merchant_id
            JOIN queuehub.branch b ON b.id = q.branch_id
            WHERE q.id = $1
            FOR UPDATE OF q
            ",
        )
        .bind(queue_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(locked) = locked else {
            return Ok(JoinOutcome::Rejected(JoinRejection::QueueNotFound));
        };
        let queue = Queue::from(locked.queue);

        if let Some(rejection) = check_join(source, &queue, locked.state) {
            return Ok(JoinOutcome::Rejected(rejection));
        }

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            INSERT INTO queuehub.ticket
                (queue_id, merchant_id, number, public_token, customer_name, customer_phone, notes)
            VALUES (
                $1, $2,
                (SELECT COALESCE(MAX(number), 0) + 1 FROM queuehub.ticket WHERE queue_id = $1),
                $3, $4, $5, $6
            )
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(queue.id.as_i32())
        .bind(queue.merchant_id.as_i32())
        .bind(Uuid::new_v4())
        .bind(&new.customer_name)
        .bind(new.customer_phone.as_deref())
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(JoinOutcome::Joined {
            ticket: row.into(),
            queue,
        })
    }

    /// Tickets of a queue in number order, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            SELECT {TICKET_COLUMNS} FROM queuehub.ticket
            WHERE merchant_id = $1 AND queue_id = $2
              AND ($3::queuehub.ticket_status IS NULL OR status = $3)
            ORDER BY number ASC
            LIMIT 500
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(queue_id.as_i32())
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    /// Get one ticket of a merchant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such ticket belongs to the merchant.
    pub async fn get(&self, merchant_id: MerchantId, id: TicketId) -> Result<Ticket, RepositoryError> {
        sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM queuehub.ticket WHERE id = $1 AND merchant_id = $2"
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .map(Ticket::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// The customer's view of a ticket, with position and estimated wait.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the token is unknown.
    pub async fn get_public(&self, token: Uuid) -> Result<PublicTicket, RepositoryError> {
        let r = sqlx::query_as::<_, PublicTicketRow>(
            r"
            SELECT t.public_token, t.number, t.status, t.customer_name, t.joined_at, t.called_at,
                   q.id AS queue_id, q.name AS queue_name, q.status AS queue_status,
                   q.avg_service_minutes, m.name AS merchant_name,
                   CASE WHEN t.status = 'waiting' THEN (
                       SELECT COUNT(*) FROM queuehub.ticket a
                       WHERE a.queue_id = t.queue_id AND a.status = 'waiting'
                         AND a.number < t.number
                   ) ELSE 0 END AS position
            FROM queuehub.ticket t
            JOIN queuehub.queue q ON q.id = t.queue_id
            JOIN queuehub.merchant m ON m.id = t.merchant_id
            WHERE t.public_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(PublicTicket {
            token: r.public_token,
            number: r.number,
            status: r.status,
            customer_name: r.customer_name,
            joined_at: r.joined_at,
            called_at: r.called_at,
            queue_id: QueueId::new(r.queue_id),
            queue_name: r.queue_name,
            queue_status: r.queue_status,
            merchant_name: r.merchant_name,
            position: r.position,
            estimated_wait_minutes: r.position * i64::from(r.avg_service_minutes),
        })
    }

    /// Call the lowest-numbered waiting ticket of a queue.
    ///
    /// Returns `None` when nobody is waiting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such queue belongs to the merchant.
    pub async fn call_next(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
    ) -> Result<Option<Ticket>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM queuehub.queue WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(queue_id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            UPDATE queuehub.ticket SET status = 'called', called_at = NOW()
            WHERE id = (
                SELECT id FROM queuehub.ticket
                WHERE queue_id = $1 AND status = 'waiting'
                ORDER BY number ASC
                LIMIT 1
            )
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(queue_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(Ticket::from))
    }

    /// Move a merchant's ticket to `next`.
    ///
    /// Returns the updated ticket and the status it had before.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such ticket belongs to the merchant.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn transition(
        &self,
        merchant_id: MerchantId,
        id: TicketId,
        next: TicketStatus,
    ) -> Result<(Ticket, TicketStatus), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, TicketStatus>(
            "SELECT status FROM queuehub.ticket WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let ticket = apply_transition(&mut tx, id, current, next).await?;
        tx.commit().await?;
        Ok((ticket, current))
    }

    /// Customer cancels their own ticket by token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the token is unknown.
    /// Returns `RepositoryError::Conflict` if the ticket is already finished.
    pub async fn cancel_by_token(&self, token: Uuid) -> Result<Ticket, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id, current) = sqlx::query_as::<_, (i32, TicketStatus)>(
            "SELECT id, status FROM queuehub.ticket WHERE public_token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let ticket =
            apply_transition(&mut tx, TicketId::new(id), current, TicketStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(ticket)
    }
}

/// Validate and write a status change on an already-locked ticket row.
async fn apply_transition(
    conn: &mut PgConnection,
    id: TicketId,
    current: TicketStatus,
    next: TicketStatus,
) -> Result<Ticket, RepositoryError> {
    if !current.can_transition_to(next) {
        return Err(RepositoryError::Conflict(format!(
            "cannot move ticket from {current} to {next}"
        )));
    }

    let row = sqlx::query_as::<_, TicketRow>(&format!(
        r"
        UPDATE queuehub.ticket SET
            status = $2,
            called_at = CASE
                WHEN $2 = 'called' THEN NOW()
                WHEN $2 = 'waiting' THEN NULL
                ELSE called_at END,
            serving_at = CASE WHEN $2 = 'serving' THEN NOW() ELSE serving_at END,
            finished_at = CASE
                WHEN $2 IN ('completed', 'cancelled', 'no_show') THEN NOW()
                ELSE finished_at END
        WHERE id = $1
        RETURNING {TICKET_COLUMNS}
        "
    ))
    .bind(id.as_i32())
    .bind(next)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuehub_core::BranchId;

    fn queue(status: QueueStatus, max_size: Option<i32>) -> Queue {
        Queue {
            id: QueueId::new(1),
            merchant_id: MerchantId::new(10),
            branch_id: BranchId::new(1),
            name: "Front desk".to_owned(),
            description: String::new(),
            status,
            avg_service_minutes: 5,
            max_size,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn state(merchant_status: MerchantStatus, active_count: i64) -> JoinState {
        JoinState {
            merchant_status,
            branch_active: true,
            active_count,
        }
    }

    fn active(active_count: i64) -> JoinState {
        state(MerchantStatus::Active, active_count)
    }

    #[test]
    fn test_customer_join_requires_open_queue() {
        let q = queue(QueueStatus::Paused, None);
        assert_eq!(
            check_join(JoinSource::Customer, &q, active(0)),
            Some(JoinRejection::QueueNotAccepting(QueueStatus::Paused))
        );
    }

    #[test]
    fn test_customer_join_requires_active_merchant() {
        let q = queue(QueueStatus::Open, None);
        assert_eq!(
            check_join(JoinSource::Customer, &q, state(MerchantStatus::Suspended, 0)),
            Some(JoinRejection::MerchantUnavailable)
        );
        assert_eq!(
            check_join(JoinSource::Customer, &q, state(MerchantStatus::Pending, 0)),
            Some(JoinRejection::MerchantUnavailable)
        );
    }

    #[test]
    fn test_customer_join_hidden_for_inactive_branch() {
        let q = queue(QueueStatus::Open, None);
        let closed_branch = JoinState {
            branch_active: false,
            ..active(0)
        };
        assert_eq!(
            check_join(JoinSource::Customer, &q, closed_branch),
            Some(JoinRejection::QueueNotFound)
        );
    }

    #[test]
    fn test_customer_join_respects_max_size() {
        let q = queue(QueueStatus::Open, Some(2));
        assert_eq!(check_join(JoinSource::Customer, &q, active(1)), None);
        assert_eq!(
            check_join(JoinSource::Customer, &q, active(2)),
            Some(JoinRejection::QueueFull)
        );
    }

    #[test]
    fn test_walk_in_may_exceed_max_size() {
        let q = queue(QueueStatus::Open, Some(1));
        let source = JoinSource::WalkIn(MerchantId::new(10));
        assert_eq!(check_join(source, &q, active(5)), None);
    }

    #[test]
    fn test_walk_in_requires_open_queue() {
        let source = JoinSource::WalkIn(MerchantId::new(10));
        for status in [QueueStatus::Paused, QueueStatus::Closed] {
            let q = queue(status, None);
            assert_eq!(
                check_join(source, &q, active(0)),
                Some(JoinRejection::QueueNotAccepting(status))
            );
        }
    }

    #[test]
    fn test_walk_in_is_tenant_scoped() {
        let q = queue(QueueStatus::Open, None);
        let source = JoinSource::WalkIn(MerchantId::new(11));
        assert_eq!(
            check_join(source, &q, active(0)),
            Some(JoinRejection::QueueNotFound)
        );
    }
}
