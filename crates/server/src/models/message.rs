//! Merchant-to-customer messages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use queuehub_core::{MerchantId, MessageId, QueueEvent, QueueId, Room, TicketId, UserId};

/// A message sent by a merchant to a queue, or to one ticket holder.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub merchant_id: MerchantId,
    pub queue_id: QueueId,
    pub ticket_id: Option<TicketId>,
    pub ticket_number: Option<i32>,
    /// Token of the addressed ticket, used to route the relay event.
    #[serde(skip)]
    pub ticket_token: Option<Uuid>,
    pub body: String,
    pub sent_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Longest accepted message body, in characters.
    pub const MAX_BODY_CHARS: usize = 500;

    /// The relay event for this message.
    #[must_use]
    pub fn to_event(&self) -> QueueEvent {
        QueueEvent::Message {
            id: self.id,
            queue_id: self.queue_id,
            ticket_id: self.ticket_id,
            ticket_number: self.ticket_number,
            body: self.body.clone(),
            sent_at: self.created_at,
        }
    }

    /// Rooms the relay event goes to. A message for one ticket reaches that
    /// ticket's room, never the public queue room.
    #[must_use]
    pub fn relay_rooms(&self) -> [Room; 2] {
        let audience = self
            .ticket_token
            .map_or(Room::Queue(self.queue_id), Room::Ticket);
        [audience, Room::Merchant(self.merchant_id)]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(ticket: Option<(i32, Uuid)>) -> Message {
        Message {
            id: MessageId::new(1),
            merchant_id: MerchantId::new(3),
            queue_id: QueueId::new(7),
            ticket_id: ticket.map(|(id, _)| TicketId::new(id)),
            ticket_number: ticket.map(|_| 12),
            ticket_token: ticket.map(|(_, token)| token),
            body: "your order is ready".to_owned(),
            sent_by: Some(UserId::new(2)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_queue_message_goes_to_queue_room() {
        assert_eq!(
            message(None).relay_rooms(),
            [Room::Queue(QueueId::new(7)), Room::Merchant(MerchantId::new(3))]
        );
    }

    #[test]
    fn test_ticket_message_stays_off_queue_room() {
        let token = Uuid::new_v4();
        let rooms = message(Some((55, token))).relay_rooms();
        assert_eq!(rooms, [Room::Ticket(token), Room::Merchant(MerchantId::new(3))]);
        assert!(!rooms.contains(&Room::Queue(QueueId::new(7))));
    }

    #[test]
    fn test_ticket_token_not_serialized() {
        let token = Uuid::new_v4();
        let msg = message(Some((55, token)));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains(&token.to_string()));

        let event = serde_json::to_value(msg.to_event()).unwrap();
        assert_eq!(event["ticket_number"], 12);
    }
}
