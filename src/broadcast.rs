//! WebSocket side of the [`Notifier`] seam.
//!
//! Room announcements fan out over one broadcast channel per room. Direct
//! messages and ballots go into a bounded queue owned by each open socket, so
//! a slow or vanished connection is reported back as [`DeliveryError`] instead
//! of being dropped silently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::notify::{DeliveryError, Notifier};
use crate::protocol::ServerMessage;
use crate::types::{PlayerId, RoomId};

/// Queue length of each socket's direct messages
pub const PLAYER_QUEUE: usize = 64;

/// Buffered announcements per room
pub const ROOM_CAPACITY: usize = 1000;

pub type ConnectionId = u64;

/// Receiving end of one socket's direct messages
pub struct PlayerConnection {
    pub id: ConnectionId,
    pub rx: mpsc::Receiver<ServerMessage>,
}

struct Outbox {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
}

pub struct Gateway {
    room_capacity: usize,
    player_queue: usize,
    rooms: RwLock<HashMap<RoomId, broadcast::Sender<ServerMessage>>>,
    players: RwLock<HashMap<PlayerId, Vec<Outbox>>>,
    next_id: AtomicU64,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(ROOM_CAPACITY, PLAYER_QUEUE)
    }
}

impl Gateway {
    pub fn new(room_capacity: usize, player_queue: usize) -> Self {
        Self {
            room_capacity,
            player_queue,
            rooms: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Listen to a room's announcements
    pub async fn subscribe_room(&self, room_id: &RoomId) -> broadcast::Receiver<ServerMessage> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(self.room_capacity).0)
            .subscribe()
    }

    /// Register a socket for a player; it stays reachable until `disconnect`
    pub async fn connect(&self, player_id: &PlayerId) -> PlayerConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.player_queue);
        self.players
            .write()
            .await
            .entry(player_id.clone())
            .or_default()
            .push(Outbox { id, tx });
        PlayerConnection { id, rx }
    }

    pub async fn disconnect(&self, player_id: &PlayerId, id: ConnectionId) {
        let mut players = self.players.write().await;
        if let Some(outboxes) = players.get_mut(player_id) {
            outboxes.retain(|outbox| outbox.id != id);
            if outboxes.is_empty() {
                players.remove(player_id);
            }
        }
    }

    pub async fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.players.read().await.contains_key(player_id)
    }

    /// Queue a message on every socket of the player; succeeds if any accepted it
    async fn send_to_player(
        &self,
        player_id: &PlayerId,
        msg: ServerMessage,
    ) -> Result<(), DeliveryError> {
        let players = self.players.read().await;
        let Some(outboxes) = players.get(player_id) else {
            return Err(DeliveryError::Unreachable(player_id.clone()));
        };

        let mut delivered = false;
        for outbox in outboxes {
            match outbox.tx.try_send(msg.clone()) {
                Ok(()) => delivered = true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Outgoing queue full for {} (socket {})", player_id, outbox.id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Socket {} of {} already closed", outbox.id, player_id);
                }
            }
        }
        if delivered {
            Ok(())
        } else {
            Err(DeliveryError::Unreachable(player_id.clone()))
        }
    }
}

#[async_trait]
impl Notifier for Gateway {
    async fn announce(&self, room_id: &RoomId, text: &str) -> Result<(), DeliveryError> {
        let msg = ServerMessage::Announcement {
            room_id: room_id.clone(),
            text: text.to_string(),
        };
        {
            let rooms = self.rooms.read().await;
            let Some(tx) = rooms.get(room_id) else {
                return Err(DeliveryError::NoListeners(room_id.clone()));
            };
            if tx.send(msg).is_ok() {
                return Ok(());
            }
        }

        // Nobody is subscribed any more: forget the room's channel
        let mut rooms = self.rooms.write().await;
        if rooms.get(room_id).is_some_and(|tx| tx.receiver_count() == 0) {
            rooms.remove(room_id);
        }
        Err(DeliveryError::NoListeners(room_id.clone()))
    }

    async fn direct_message(&self, player_id: &PlayerId, text: &str) -> Result<(), DeliveryError> {
        self.send_to_player(
            player_id,
            ServerMessage::Direct {
                text: text.to_string(),
            },
        )
        .await
    }

    async fn present_vote_options(
        &self,
        room_id: &RoomId,
        voter: &PlayerId,
        eligible: &[PlayerId],
    ) -> Result<(), DeliveryError> {
        self.send_to_player(
            voter,
            ServerMessage::Ballot {
                room_id: room_id.clone(),
                eligible: eligible.to_vec(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(text: &str) -> ServerMessage {
        ServerMessage::Direct {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_direct_message_needs_connection() {
        let gateway = Gateway::default();
        let alice = "alice".to_string();

        assert_eq!(
            gateway.direct_message(&alice, "hi").await,
            Err(DeliveryError::Unreachable(alice.clone()))
        );

        let mut first = gateway.connect(&alice).await;
        let mut second = gateway.connect(&alice).await;
        gateway.direct_message(&alice, "hi").await.unwrap();
        assert_eq!(first.rx.recv().await, Some(direct("hi")));
        assert_eq!(second.rx.recv().await, Some(direct("hi")));

        // Still connected through the second socket
        gateway.disconnect(&alice, first.id).await;
        assert!(gateway.is_connected(&alice).await);
        gateway.disconnect(&alice, second.id).await;
        assert!(!gateway.is_connected(&alice).await);
    }

    #[tokio::test]
    async fn test_announce_is_room_scoped() {
        let gateway = Gateway::default();
        let room = "room-1".to_string();
        assert_eq!(
            gateway.announce(&room, "hello").await,
            Err(DeliveryError::NoListeners(room.clone()))
        );

        let mut rx = gateway.subscribe_room(&room).await;
        let mut other = gateway.subscribe_room(&"room-2".to_string()).await;
        gateway.announce(&room, "hello").await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Ok(ServerMessage::Announcement { text, .. }) if text == "hello"
        ));
        assert!(other.try_recv().is_err());

        drop(rx);
        assert_eq!(
            gateway.announce(&room, "anyone?").await,
            Err(DeliveryError::NoListeners(room.clone()))
        );
    }

    #[tokio::test]
    async fn test_direct_message_survives_busy_rooms() {
        let gateway = Gateway::new(4, 4);
        let alice = "alice".to_string();
        let mut conn = gateway.connect(&alice).await;
        let _busy = gateway.subscribe_room(&"room-2".to_string()).await;

        gateway.direct_message(&alice, "you are the imposter").await.unwrap();
        for i in 0..8 {
            gateway
                .announce(&"room-2".to_string(), &format!("chatter {i}"))
                .await
                .unwrap();
        }

        assert_eq!(conn.rx.recv().await, Some(direct("you are the imposter")));
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let gateway = Gateway::new(4, 2);
        let alice = "alice".to_string();
        let mut conn = gateway.connect(&alice).await;

        gateway.direct_message(&alice, "one").await.unwrap();
        gateway.direct_message(&alice, "two").await.unwrap();
        assert_eq!(
            gateway.direct_message(&alice, "three").await,
            Err(DeliveryError::Unreachable(alice.clone()))
        );

        assert_eq!(conn.rx.recv().await, Some(direct("one")));
        gateway.direct_message(&alice, "three").await.unwrap();

        // A socket whose task has gone away no longer accepts messages
        drop(conn);
        assert_eq!(
            gateway.direct_message(&alice, "four").await,
            Err(DeliveryError::Unreachable(alice.clone()))
        );
    }
}
