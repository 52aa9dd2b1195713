//! Message repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use queuehub_core::{MerchantId, MessageId, QueueId, TicketId, UserId};

use super::RepositoryError;
use crate::models::Message;

const MESSAGE_COLUMNS: &str =
    "m.id, m.merchant_id, m.queue_id, m.ticket_id, t.number AS ticket_number, \
     t.public_token AS ticket_token, m.body, m.sent_by, m.created_at";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i32,
    merchant_id: i32,
    queue_id: i32,
    ticket_id: Option<i32>,
    ticket_number: Option<i32>,
    ticket_token: Option<Uuid>,
    body: String,
    sent_by: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Self {
            id: MessageId::new(r.id),
            merchant_id: MerchantId::new(r.merchant_id),
            queue_id: QueueId::new(r.queue_id),
            ticket_id: r.ticket_id.map(TicketId::new),
            ticket_number: r.ticket_number,
            ticket_token: r.ticket_token,
            body: r.body,
            sent_by: r.sent_by.map(UserId::new),
            created_at: r.created_at,
        }
    }
}

/// A message about to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub queue_id: QueueId,
    pub ticket_id: Option<TicketId>,
    pub body: String,
    pub sent_by: UserId,
}

/// Repository for message database operations.
pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a message on one of the merchant's queues.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the queue isn't the merchant's, or
    /// the ticket isn't in that queue.
    pub async fn create(
        &self,
        merchant_id: MerchantId,
        new: &NewMessage,
    ) -> Result<Message, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r"
            WITH m AS (
                INSERT INTO queuehub.message (merchant_id, queue_id, ticket_id, body, sent_by)
                SELECT q.merchant_id, q.id, $3, $4, $5
                FROM queuehub.queue q
                WHERE q.id = $2 AND q.merchant_id = $1
                  AND ($3::int IS NULL OR EXISTS (
                      SELECT 1 FROM queuehub.ticket t WHERE t.id = $3 AND t.queue_id = q.id
                  ))
                RETURNING *
            )
            SELECT {MESSAGE_COLUMNS}
            FROM m LEFT JOIN queuehub.ticket t ON t.id = m.ticket_id
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(new.queue_id.as_i32())
        .bind(new.ticket_id.map(|id| id.as_i32()))
        .bind(&new.body)
        .bind(new.sent_by.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Message::from).ok_or(RepositoryError::NotFound)
    }

    /// Most recent messages of a queue, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM queuehub.message m
            LEFT JOIN queuehub.ticket t ON t.id = m.ticket_id
            WHERE m.merchant_id = $1 AND m.queue_id = $2
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $3
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(queue_id.as_i32())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }
}
