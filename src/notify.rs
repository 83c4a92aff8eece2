//! Outward notification seam.
//!
//! The game core never renders anything itself. It hands plain text (and the
//! ballot's eligible player list) to a [`Notifier`], which the platform adapter
//! implements.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::{PlayerId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("player {0} is unreachable")]
    Unreachable(PlayerId),

    #[error("room {0} has no listeners")]
    NoListeners(RoomId),
}

/// Trait the platform adapter implements
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message visible to the whole room
    async fn announce(&self, room_id: &RoomId, text: &str) -> Result<(), DeliveryError>;

    /// Privately message one player
    async fn direct_message(&self, player_id: &PlayerId, text: &str) -> Result<(), DeliveryError>;

    /// Hand one voter the ballot for the room's vote
    async fn present_vote_options(
        &self,
        room_id: &RoomId,
        voter: &PlayerId,
        eligible: &[PlayerId],
    ) -> Result<(), DeliveryError>;
}

/// Minimum spacing gate for consecutive outward messages
#[derive(Debug, Clone)]
pub struct Pacer {
    last_sent: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_sent: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until at least `min_interval` has passed since the previous call
    pub async fn wait(&self) {
        let mut last_sent = self.last_sent.lock().await;
        if let Some(last) = *last_sent {
            let ready_at = last + self.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_sent = Some(Instant::now());
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
