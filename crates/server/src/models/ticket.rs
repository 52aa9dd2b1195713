//! Ticket domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use queuehub_core::{MerchantId, QueueId, QueueStatus, TicketId, TicketSnapshot, TicketStatus};

/// One customer's place in a queue.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub queue_id: QueueId,
    pub merchant_id: MerchantId,
    /// Sequential per queue, starting at 1.
    pub number: i32,
    /// Bearer token the customer uses to check and cancel the ticket.
    pub public_token: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub status: TicketStatus,
    pub notes: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub serving_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// The broadcastable view of this ticket.
    #[must_use]
    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            id: self.id,
            number: self.number,
            status: self.status,
            customer_name: self.customer_name.clone(),
            joined_at: self.joined_at,
        }
    }
}

/// What a customer sees when checking their ticket.
#[derive(Debug, Clone, Serialize)]
pub struct PublicTicket {
    pub token: Uuid,
    pub number: i32,
    pub status: TicketStatus,
    pub customer_name: String,
    pub joined_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub queue_id: QueueId,
    pub queue_name: String,
    pub queue_status: QueueStatus,
    pub merchant_name: String,
    /// Waiting tickets ahead of this one; zero once called.
    pub position: i64,
    pub estimated_wait_minutes: i64,
}
