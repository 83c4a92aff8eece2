mod game;
mod lobby;
mod registry;
mod status;
mod turns;
mod voting;

pub use game::{score_votes, GameState, KickPoll, PendingTurn, TimerHandle};
pub use registry::{GameHandle, GameRegistry};
pub use status::render_rules;
pub use turns::PhaseOutcome;
pub use voting::{render_progress, render_tally};

use crate::error::{GameError, GameResult};
use crate::notify::{Notifier, Pacer};
use crate::settings::ConfigStore;
use crate::types::*;
use crate::words::WordSource;
use std::sync::Arc;
use std::time::Duration;

/// Delays that shape the pace of a game
#[derive(Debug, Clone)]
pub struct Timing {
    /// Pause between role DMs and the first turn
    pub role_reveal_delay: Duration,
    /// Minimum spacing between description phase messages
    pub notify_min_interval: Duration,
    /// Lobbies not started within this window are discarded
    pub lobby_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            role_reveal_delay: Duration::from_secs(2),
            notify_min_interval: Duration::from_secs(1),
            lobby_timeout: Duration::from_secs(3600),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub registry: GameRegistry,
    pub config: Arc<dyn ConfigStore>,
    pub words: Arc<dyn WordSource>,
    pub notifier: Arc<dyn Notifier>,
    pub timing: Timing,
}

impl AppState {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        words: Arc<dyn WordSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry: GameRegistry::new(),
            config,
            words,
            notifier,
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    async fn game(&self, room_id: &RoomId) -> GameResult<GameHandle> {
        self.registry
            .get_game(room_id)
            .await
            .ok_or(GameError::NotFound)
    }

    /// Room announcement; delivery failures are logged and swallowed
    async fn announce(&self, room_id: &RoomId, text: &str) {
        if let Err(e) = self.notifier.announce(room_id, text).await {
            tracing::warn!("Announcement to room {} failed: {}", room_id, e);
        }
    }

    async fn announce_paced(&self, pacer: &Pacer, room_id: &RoomId, text: &str) {
        pacer.wait().await;
        self.announce(room_id, text).await;
    }

    /// End the game if `remaining` dropped below the room's minimum.
    /// Returns true when the game was ended.
    async fn end_if_short_handed(
        &self,
        room_id: &RoomId,
        game: &GameHandle,
        remaining: usize,
        min_players: u32,
    ) -> bool {
        if remaining >= min_players as usize {
            return false;
        }
        tracing::info!(
            "Room {} down to {} players (min {}), ending game",
            room_id,
            remaining,
            min_players
        );
        self.announce(room_id, "Not enough players remaining. Game ending.")
            .await;
        self.registry.end_game_instance(room_id, game).await;
        true
    }
}
