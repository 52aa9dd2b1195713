//! Live-update events relayed to dashboards and customer screens.
//!
//! Events are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"ticket_called","queue_id":3,"ticket":{"id":17,"number":42,...}}
//! ```

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{MerchantId, MessageId, QueueId, TicketId};
use super::status::{QueueStatus, TicketStatus};

/// The parts of a ticket that are safe to broadcast to a public room.
///
/// Deliberately excludes the customer's phone number and the public token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub id: TicketId,
    pub number: i32,
    pub status: TicketStatus,
    pub customer_name: String,
    pub joined_at: DateTime<Utc>,
}

/// An event published to a [`Room`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Queue metadata or status changed.
    QueueUpdated {
        queue_id: QueueId,
        status: QueueStatus,
        waiting_count: i64,
    },
    /// A customer joined.
    TicketCreated {
        queue_id: QueueId,
        ticket: TicketSnapshot,
        waiting_count: i64,
    },
    /// A ticket moved to a new status.
    TicketUpdated {
        queue_id: QueueId,
        ticket: TicketSnapshot,
        waiting_count: i64,
    },
    /// A ticket was called to the counter.
    TicketCalled {
        queue_id: QueueId,
        ticket: TicketSnapshot,
    },
    /// A merchant message to a queue, or to a single ticket holder.
    ///
    /// Ticket-addressed messages are only relayed to that ticket's room and
    /// the merchant room.
    Message {
        id: MessageId,
        queue_id: QueueId,
        ticket_id: Option<TicketId>,
        ticket_number: Option<i32>,
        body: String,
        sent_at: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// The `type` tag, for logging.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::QueueUpdated { .. } => "queue_updated",
            Self::TicketCreated { .. } => "ticket_created",
            Self::TicketUpdated { .. } => "ticket_updated",
            Self::TicketCalled { .. } => "ticket_called",
            Self::Message { .. } => "message",
        }
    }

    /// The queue this event concerns.
    #[must_use]
    pub const fn queue_id(&self) -> QueueId {
        match self {
            Self::QueueUpdated { queue_id, .. }
            | Self::TicketCreated { queue_id, .. }
            | Self::TicketUpdated { queue_id, .. }
            | Self::TicketCalled { queue_id, .. }
            | Self::Message { queue_id, .. } => *queue_id,
        }
    }
}

/// Errors that can occur when parsing a [`Room`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomParseError {
    /// Missing `kind:id` separator.
    #[error("room must look like `queue:<id>`, `ticket:<token>` or `merchant:<id>`")]
    Malformed,
    /// Unknown room kind.
    #[error("unknown room kind: {0}")]
    UnknownKind(String),
    /// The id part is not a number.
    #[error("invalid room id: {0}")]
    InvalidId(String),
}

/// A relay room name.
///
/// Queue rooms are public so customers can watch their position. Ticket
/// rooms are addressed by the ticket's public token, which the customer
/// already holds, and carry that ticket's changes and messages. Merchant
/// rooms carry every event of a tenant and require a merchant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Room {
    Merchant(MerchantId),
    Queue(QueueId),
    Ticket(Uuid),
}

impl Room {
    /// Parse `merchant:<id>`, `queue:<id>` or `ticket:<token>`.
    ///
    /// # Errors
    ///
    /// Returns a [`RoomParseError`] if the input has the wrong shape.
    pub fn parse(s: &str) -> Result<Self, RoomParseError> {
        let (kind, id) = s.split_once(':').ok_or(RoomParseError::Malformed)?;
        let invalid = || RoomParseError::InvalidId(id.to_owned());
        match kind {
            "merchant" => Ok(Self::Merchant(MerchantId::new(
                id.parse().map_err(|_| invalid())?,
            ))),
            "queue" => Ok(Self::Queue(QueueId::new(id.parse().map_err(|_| invalid())?))),
            "ticket" => Ok(Self::Ticket(Uuid::parse_str(id).map_err(|_| invalid())?)),
            other => Err(RoomParseError::UnknownKind(other.to_owned())),
        }
    }

    /// Whether anyone may subscribe without signing in.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Queue(_) | Self::Ticket(_))
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merchant(id) => write!(f, "merchant:{id}"),
            Self::Queue(id) => write!(f, "queue:{id}"),
            Self::Ticket(token) => write!(f, "ticket:{token}"),
        }
    }
}

impl TryFrom<String> for Room {
    type Error = RoomParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_parse() {
        assert_eq!(Room::parse("queue:12"), Ok(Room::Queue(QueueId::new(12))));
        assert_eq!(
            Room::parse("merchant:3"),
            Ok(Room::Merchant(MerchantId::new(3)))
        );
        assert_eq!(Room::parse("queue"), Err(RoomParseError::Malformed));
        assert!(matches!(
            Room::parse("branch:1"),
            Err(RoomParseError::UnknownKind(_))
        ));
        assert!(matches!(
            Room::parse("queue:abc"),
            Err(RoomParseError::InvalidId(_))
        ));
        assert!(matches!(
            Room::parse("ticket:12"),
            Err(RoomParseError::InvalidId(_))
        ));
    }

    #[test]
    fn test_ticket_room_uses_public_token() {
        let token = Uuid::new_v4();
        let room = Room::parse(&format!("ticket:{token}")).unwrap();
        assert_eq!(room, Room::Ticket(token));
        assert_eq!(room.to_string(), format!("ticket:{token}"));
    }

    #[test]
    fn test_room_display_matches_parse() {
        let room = Room::Merchant(MerchantId::new(9));
        assert_eq!(Room::parse(&room.to_string()), Ok(room));
    }

    #[test]
    fn test_merchant_rooms_are_private() {
        assert!(Room::Queue(QueueId::new(1)).is_public());
        assert!(Room::Ticket(Uuid::new_v4()).is_public());
        assert!(!Room::Merchant(MerchantId::new(1)).is_public());
    }

    #[test]
    fn test_event_wire_format() {
        let event = QueueEvent::QueueUpdated {
            queue_id: QueueId::new(5),
            status: QueueStatus::Paused,
            waiting_count: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "queue_updated");
        assert_eq!(value["queue_id"], 5);
        assert_eq!(value["status"], "paused");
        assert_eq!(event.event_type(), "queue_updated");
        assert_eq!(event.queue_id(), QueueId::new(5));
    }
}
