//! WebSocket endpoint of the live-update relay.
//!
//! A socket joins rooms with JSON frames and receives every [`QueueEvent`]
//! published to them:
//!
//! ```text
//! client -> {"type":"join","room":"queue:7"}
//! server <- {"type":"joined","room":"queue:7"}
//! server <- {"type":"ticket_called","queue_id":7,"ticket":{...}}
//! ```
//!
//! Each joined room gets a forwarding task that drains its broadcast
//! receiver into the socket's outbound channel. A single writer task owns
//! the socket sink.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_sessions::Session;
use tower_sessions::session::Id;
use tracing::{debug, info, warn};

use queuehub_core::{QueueEvent, QueueId, Room, TicketId};

use crate::models::{CurrentUser, session_keys};
use crate::services::QueueService;
use crate::state::AppState;

/// How often the session is touched and the peer pinged.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Frames buffered for a slow socket before forwarders wait.
const OUTBOUND_CAPACITY: usize = 64;

/// Rooms a single socket may join.
const MAX_ROOMS_PER_SOCKET: usize = 32;

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join {
        room: Room,
    },
    Leave {
        room: Room,
    },
    Ping,
    /// Send a merchant message to a queue, or to one ticket in it.
    Message {
        queue_id: QueueId,
        ticket_id: Option<TicketId>,
        body: String,
    },
}

/// Control frames sent by the server. Relayed events are sent as bare
/// [`QueueEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Joined { room: Room },
    Left { room: Room },
    Pong,
    Error { message: String },
}

/// Check whether `user` may subscribe to `room`.
///
/// # Errors
///
/// Returns the message to send back when the join is refused.
pub fn authorize_join(user: Option<&CurrentUser>, room: Room) -> Result<(), &'static str> {
    match room {
        Room::Queue(_) | Room::Ticket(_) => Ok(()),
        Room::Merchant(merchant_id) => match user {
            None => Err("sign in to join merchant rooms"),
            Some(user) if user.can_access_merchant(merchant_id) => Ok(()),
            Some(_) => Err("you do not have access to this room"),
        },
    }
}

/// `GET /ws` - upgrade to a relay socket.
///
/// The session is optional: customers watch queue rooms anonymously.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Session,
) -> impl IntoResponse {
    let user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten();
    let session_id = user.as_ref().and_then(|_| session.id());

    debug!(
        user_id = ?user.as_ref().map(|u| u.id),
        "WebSocket upgrade request received"
    );

    ws.on_upgrade(move |socket| handle_socket(socket, state, user, session_id))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    user: Option<CurrentUser>,
    session_id: Option<Id>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let mut conn = Connection {
        state,
        user,
        session_id,
        out: tx,
        rooms: HashMap::new(),
    };

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !conn.heartbeat().await {
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => conn.handle_text(text.as_str()).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    let joined = conn.rooms.len();
    conn.leave_all();
    drop(conn);
    let _ = send_task.await;
    debug!(rooms = joined, "WebSocket closed");
}

struct Connection {
    state: AppState,
    user: Option<CurrentUser>,
    session_id: Option<Id>,
    out: mpsc::Sender<Message>,
    rooms: HashMap<Room, JoinHandle<()>>,
}

impl Connection {
    async fn send(&self, frame: &ServerFrame) {
        if let Ok(json) = serde_json::to_string(frame) {
            let _ = self.out.send(Message::Text(json.into())).await;
        }
    }

    async fn error(&self, message: impl Into<String>) {
        self.send(&ServerFrame::Error {
            message: message.into(),
        })
        .await;
    }

    async fn handle_text(&mut self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.error(format!("invalid frame: {e}")).await;
                return;
            }
        };

        match frame {
            ClientFrame::Join { room } => self.join(room).await,
            ClientFrame::Leave { room } => {
                if let Some(task) = self.rooms.remove(&room) {
                    task.abort();
                }
                self.send(&ServerFrame::Left { room }).await;
            }
            ClientFrame::Ping => self.send(&ServerFrame::Pong).await,
            ClientFrame::Message {
                queue_id,
                ticket_id,
                body,
            } => self.send_message(queue_id, ticket_id, &body).await,
        }
    }

    async fn join(&mut self, room: Room) {
        if let Err(message) = authorize_join(self.user.as_ref(), room) {
            self.error(message).await;
            return;
        }
        if self.rooms.contains_key(&room) {
            self.send(&ServerFrame::Joined { room }).await;
            return;
        }
        if self.rooms.len() >= MAX_ROOMS_PER_SOCKET {
            self.error("too many rooms joined").await;
            return;
        }

        let receiver = self.state.hub().subscribe(room).await;
        let task = spawn_forwarder(room, receiver, self.out.clone());
        self.rooms.insert(room, task);
        self.send(&ServerFrame::Joined { room }).await;
    }

    async fn send_message(&self, queue_id: QueueId, ticket_id: Option<TicketId>, body: &str) {
        let Some((user_id, merchant_id)) = self
            .user
            .as_ref()
            .filter(|u| u.role.is_tenant())
            .and_then(|u| u.merchant_id.map(|m| (u.id, m)))
        else {
            self.error("only merchant users can send messages").await;
            return;
        };

        let service = QueueService::new(self.state.pool(), self.state.hub());
        if let Err(e) = service
            .send_message(merchant_id, user_id, queue_id, ticket_id, body)
            .await
        {
            warn!(error = %e, %queue_id, "WebSocket message rejected");
            self.error(e.to_string()).await;
        }
    }

    /// Touch the session and ping the peer. Returns `false` once the
    /// session behind an authenticated socket is gone.
    async fn heartbeat(&self) -> bool {
        if let Some(id) = &self.session_id {
            let expiry = OffsetDateTime::now_utc()
                + time::Duration::hours(self.state.config().session_hours);
            match self.state.sessions().touch(id, expiry).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Session ended, closing WebSocket");
                    self.error("session expired").await;
                    return false;
                }
                Err(e) => warn!(error = %e, "Failed to touch session"),
            }
        }
        self.out.send(Message::Ping(Bytes::new())).await.is_ok()
    }

    fn leave_all(&mut self) {
        for (_, task) in self.rooms.drain() {
            task.abort();
        }
    }
}

/// Forward a room's events into the socket's outbound channel.
fn spawn_forwarder(
    room: Room,
    mut receiver: broadcast::Receiver<QueueEvent>,
    out: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if out.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(room = %room, skipped, "Relay receiver lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use queuehub_core::{Email, MerchantId, TicketSnapshot, TicketStatus, UserId, UserRole};

    use super::*;
    use crate::realtime::RoomHub;

    fn user(role: UserRole, merchant: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("owner@example.com").unwrap(),
            name: "Owner".to_string(),
            role,
            merchant_id: merchant.map(MerchantId::new),
        }
    }

    #[test]
    fn test_parse_client_frames() {
        let join: ClientFrame = serde_json::from_str(r#"{"type":"join","room":"queue:7"}"#).unwrap();
        assert_eq!(
            join,
            ClientFrame::Join {
                room: Room::Queue(QueueId::new(7))
            }
        );

        let message: ClientFrame =
            serde_json::from_str(r#"{"type":"message","queue_id":7,"body":"Back in 5"}"#).unwrap();
        assert_eq!(
            message,
            ClientFrame::Message {
                queue_id: QueueId::new(7),
                ticket_id: None,
                body: "Back in 5".to_string(),
            }
        );

        let ping: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientFrame::Ping);
    }

    #[test]
    fn test_rejects_bad_frames() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"join","room":"branch:1"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_server_frame_wire_format() {
        let joined = serde_json::to_value(ServerFrame::Joined {
            room: Room::Merchant(MerchantId::new(3)),
        })
        .unwrap();
        assert_eq!(joined["type"], "joined");
        assert_eq!(joined["room"], "merchant:3");

        let pong = serde_json::to_value(ServerFrame::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({"type": "pong"}));
    }

    #[test]
    fn test_queue_rooms_are_open_to_anyone() {
        assert!(authorize_join(None, Room::Queue(QueueId::new(1))).is_ok());
        assert!(authorize_join(None, Room::Ticket(uuid::Uuid::new_v4())).is_ok());
    }

    #[test]
    fn test_merchant_room_authorization() {
        let room = Room::Merchant(MerchantId::new(3));
        assert!(authorize_join(None, room).is_err());
        assert!(authorize_join(Some(&user(UserRole::Staff, Some(3))), room).is_ok());
        assert!(authorize_join(Some(&user(UserRole::Merchant, Some(4))), room).is_err());
        assert!(authorize_join(Some(&user(UserRole::Admin, None)), room).is_ok());
    }

    #[tokio::test]
    async fn test_forwarder_relays_events() {
        let hub = RoomHub::default();
        let room = Room::Queue(QueueId::new(7));
        let (tx, mut rx) = mpsc::channel(8);
        let task = spawn_forwarder(room, hub.subscribe(room).await, tx);

        let event = QueueEvent::TicketCalled {
            queue_id: QueueId::new(7),
            ticket: TicketSnapshot {
                id: TicketId::new(1),
                number: 42,
                status: TicketStatus::Called,
                customer_name: "Sam".to_string(),
                joined_at: Utc::now(),
            },
        };
        assert_eq!(hub.publish(room, event).await, 1);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "ticket_called");
        assert_eq!(value["ticket"]["number"], 42);
        task.abort();
    }
}
