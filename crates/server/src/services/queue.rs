//! Queue and ticket operations with live relay.
//!
//! Every state change is committed first, then published on the [`RoomHub`]
//! to the queue's room and the merchant's room. Ticket changes also reach the
//! ticket holder's room; messages for one ticket skip the public queue room.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use queuehub_core::{
    MerchantId, QueueEvent, QueueId, QueueStatus, Room, TicketId, TicketStatus, UserId,
};

use crate::db::RepositoryError;
use crate::db::messages::{MessageRepository, NewMessage};
use crate::db::queues::QueueRepository;
use crate::db::tickets::{JoinOutcome, JoinRejection, JoinSource, NewTicket, TicketRepository};
use crate::models::{Message, Queue, Ticket};
use crate::realtime::RoomHub;

/// Longest accepted customer name.
const MAX_CUSTOMER_NAME_CHARS: usize = 100;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue not found")]
    QueueNotFound,

    #[error("ticket not found")]
    TicketNotFound,

    #[error("queue is {0} and not accepting customers")]
    NotAccepting(QueueStatus),

    #[error("this business is not accepting customers right now")]
    MerchantUnavailable,

    #[error("queue is full")]
    QueueFull,

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<JoinRejection> for QueueError {
    fn from(rejection: JoinRejection) -> Self {
        match rejection {
            JoinRejection::QueueNotFound => Self::QueueNotFound,
            JoinRejection::QueueNotAccepting(status) => Self::NotAccepting(status),
            JoinRejection::MerchantUnavailable => Self::MerchantUnavailable,
            JoinRejection::QueueFull => Self::QueueFull,
        }
    }
}

/// Customer details as submitted by a join form.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct JoinRequest {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

impl JoinRequest {
    fn validate(&self) -> Result<NewTicket, QueueError> {
        let name = self.customer_name.trim();
        if name.is_empty() {
            return Err(QueueError::Validation("customer name is required".to_owned()));
        }
        if name.chars().count() > MAX_CUSTOMER_NAME_CHARS {
            return Err(QueueError::Validation(format!(
                "customer name must be at most {MAX_CUSTOMER_NAME_CHARS} characters"
            )));
        }
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Ok(NewTicket {
            customer_name: name.to_owned(),
            customer_phone: non_empty(&self.customer_phone),
            notes: non_empty(&self.notes),
        })
    }
}

/// Map a ticket-scoped repository error.
fn ticket_error(e: RepositoryError) -> QueueError {
    match e {
        RepositoryError::NotFound => QueueError::TicketNotFound,
        RepositoryError::Conflict(msg) => QueueError::InvalidTransition(msg),
        other => QueueError::Repository(other),
    }
}

/// Map a queue-scoped repository error.
fn queue_error(e: RepositoryError) -> QueueError {
    match e {
        RepositoryError::NotFound => QueueError::QueueNotFound,
        other => QueueError::Repository(other),
    }
}

/// Queue operations service.
pub struct QueueService<'a> {
    queues: QueueRepository<'a>,
    tickets: TicketRepository<'a>,
    messages: MessageRepository<'a>,
    hub: &'a RoomHub,
}

impl<'a> QueueService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, hub: &'a RoomHub) -> Self {
        Self {
            queues: QueueRepository::new(pool),
            tickets: TicketRepository::new(pool),
            messages: MessageRepository::new(pool),
            hub,
        }
    }

    /// A customer joins an open queue.
    ///
    /// # Errors
    ///
    /// Returns the matching `QueueError` when the queue refuses the customer.
    #[instrument(skip(self, request), fields(queue_id = %queue_id))]
    pub async fn join(&self, queue_id: QueueId, request: &JoinRequest) -> Result<Ticket, QueueError> {
        let new = request.validate()?;
        self.add_ticket(queue_id, JoinSource::Customer, &new).await
    }

    /// Staff add a walk-in customer.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` if the queue isn't the merchant's.
    #[instrument(skip(self, request), fields(merchant_id = %merchant_id, queue_id = %queue_id))]
    pub async fn walk_in(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
        request: &JoinRequest,
    ) -> Result<Ticket, QueueError> {
        let new = request.validate()?;
        self.add_ticket(queue_id, JoinSource::WalkIn(merchant_id), &new)
            .await
    }

    async fn add_ticket(
        &self,
        queue_id: QueueId,
        source: JoinSource,
        new: &NewTicket,
    ) -> Result<Ticket, QueueError> {
        let (ticket, queue) = match self.tickets.join(queue_id, source, new).await? {
            JoinOutcome::Joined { ticket, queue } => (ticket, queue),
            JoinOutcome::Rejected(rejection) => return Err(rejection.into()),
        };

        tracing::info!(ticket_id = %ticket.id, number = ticket.number, "Ticket issued");

        let waiting_count = self.queues.waiting_count(queue.id).await?;
        self.hub
            .publish_queue_event(
                queue.merchant_id,
                QueueEvent::TicketCreated {
                    queue_id: queue.id,
                    ticket: ticket.snapshot(),
                    waiting_count,
                },
            )
            .await;
        Ok(ticket)
    }

    /// Call the next waiting customer. `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` if the queue isn't the merchant's.
    #[instrument(skip(self), fields(merchant_id = %merchant_id, queue_id = %queue_id))]
    pub async fn call_next(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
    ) -> Result<Option<Ticket>, QueueError> {
        let ticket = self
            .tickets
            .call_next(merchant_id, queue_id)
            .await
            .map_err(queue_error)?;

        if let Some(ticket) = &ticket {
            self.publish_ticket_change(merchant_id, ticket).await?;
        }
        Ok(ticket)
    }

    /// Move a ticket to a new status.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidTransition` if the status change isn't allowed.
    #[instrument(skip(self), fields(merchant_id = %merchant_id, ticket_id = %ticket_id))]
    pub async fn transition(
        &self,
        merchant_id: MerchantId,
        ticket_id: TicketId,
        next: TicketStatus,
    ) -> Result<(Ticket, TicketStatus), QueueError> {
        let (ticket, previous) = self
            .tickets
            .transition(merchant_id, ticket_id, next)
            .await
            .map_err(ticket_error)?;

        self.publish_ticket_change(merchant_id, &ticket).await?;
        Ok((ticket, previous))
    }

    /// A customer leaves the queue using their ticket token.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::TicketNotFound` for unknown tokens and
    /// `QueueError::InvalidTransition` if the ticket is already finished.
    pub async fn cancel_by_token(&self, token: Uuid) -> Result<Ticket, QueueError> {
        let ticket = self
            .tickets
            .cancel_by_token(token)
            .await
            .map_err(ticket_error)?;

        self.publish_ticket_change(ticket.merchant_id, &ticket).await?;
        Ok(ticket)
    }

    /// Open, pause or close a queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` if the queue isn't the merchant's.
    pub async fn set_status(
        &self,
        merchant_id: MerchantId,
        queue_id: QueueId,
        status: QueueStatus,
    ) -> Result<Queue, QueueError> {
        let queue = self
            .queues
            .set_status(merchant_id, queue_id, status)
            .await
            .map_err(queue_error)?;
        self.publish_queue_updated(&queue).await?;
        Ok(queue)
    }

    /// Announce queue metadata changes to watchers.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Repository` if the waiting count can't be read.
    pub async fn publish_queue_updated(&self, queue: &Queue) -> Result<(), QueueError> {
        let waiting_count = self.queues.waiting_count(queue.id).await?;
        self.hub
            .publish_queue_event(
                queue.merchant_id,
                QueueEvent::QueueUpdated {
                    queue_id: queue.id,
                    status: queue.status,
                    waiting_count,
                },
            )
            .await;
        Ok(())
    }

    /// Persist a merchant message and relay it.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for an empty or oversized body and
    /// `QueueError::QueueNotFound` if the queue or ticket isn't the merchant's.
    pub async fn send_message(
        &self,
        merchant_id: MerchantId,
        sent_by: UserId,
        queue_id: QueueId,
        ticket_id: Option<TicketId>,
        body: &str,
    ) -> Result<Message, QueueError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(QueueError::Validation("message body is required".to_owned()));
        }
        if body.chars().count() > Message::MAX_BODY_CHARS {
            return Err(QueueError::Validation(format!(
                "message must be at most {} characters",
                Message::MAX_BODY_CHARS
            )));
        }

        let message = self
            .messages
            .create(
                merchant_id,
                &NewMessage {
                    queue_id,
                    ticket_id,
                    body: body.to_owned(),
                    sent_by,
                },
            )
            .await
            .map_err(queue_error)?;

        self.hub
            .publish_to(&message.relay_rooms(), &message.to_event())
            .await;
        Ok(message)
    }

    /// Relay a ticket change to its queue, its merchant and its holder.
    async fn publish_ticket_change(
        &self,
        merchant_id: MerchantId,
        ticket: &Ticket,
    ) -> Result<(), QueueError> {
        let rooms = [
            Room::Queue(ticket.queue_id),
            Room::Merchant(merchant_id),
            Room::Ticket(ticket.public_token),
        ];

        if ticket.status == TicketStatus::Called {
            let called = QueueEvent::TicketCalled {
                queue_id: ticket.queue_id,
                ticket: ticket.snapshot(),
            };
            self.hub.publish_to(&rooms, &called).await;
        }

        let waiting_count = self.queues.waiting_count(ticket.queue_id).await?;
        let updated = QueueEvent::TicketUpdated {
            queue_id: ticket.queue_id,
            ticket: ticket.snapshot(),
            waiting_count,
        };
        self.hub.publish_to(&rooms, &updated).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(name: &str, phone: Option<&str>) -> JoinRequest {
        JoinRequest {
            customer_name: name.to_owned(),
            customer_phone: phone.map(str::to_owned),
            notes: None,
        }
    }

    #[test]
    fn test_join_request_trims_fields() {
        let new = join("  Sam ", Some("  ")).validate();
        let Ok(new) = new else {
            panic!("expected valid join request");
        };
        assert_eq!(new.customer_name, "Sam");
        assert_eq!(new.customer_phone, None);
    }

    #[test]
    fn test_join_request_requires_name() {
        assert!(matches!(
            join("   ", None).validate(),
            Err(QueueError::Validation(_))
        ));
        assert!(matches!(
            join(&"x".repeat(101), None).validate(),
            Err(QueueError::Validation(_))
        ));
    }

    #[test]
    fn test_rejections_map_to_errors() {
        assert!(matches!(
            QueueError::from(JoinRejection::QueueFull),
            QueueError::QueueFull
        ));
        assert!(matches!(
            QueueError::from(JoinRejection::QueueNotAccepting(QueueStatus::Closed)),
            QueueError::NotAccepting(QueueStatus::Closed)
        ));
    }

    #[test]
    fn test_conflict_becomes_invalid_transition() {
        let err = ticket_error(RepositoryError::Conflict("nope".to_owned()));
        assert!(matches!(err, QueueError::InvalidTransition(msg) if msg == "nope"));
        assert!(matches!(
            ticket_error(RepositoryError::NotFound),
            QueueError::TicketNotFound
        ));
    }
}
