//! Room -> game mapping.
//!
//! All map mutations happen under one mutex. Per-game state sits behind its
//! own lock so rooms never contend with each other once a handle is fetched.
//! Lock order is registry first, then game.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::game::GameState;
use crate::error::{GameError, GameResult};
use crate::types::RoomId;

/// Shared handle to one room's game
pub type GameHandle = Arc<Mutex<GameState>>;

#[derive(Default)]
pub struct GameRegistry {
    games: Mutex<HashMap<RoomId, GameHandle>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a game for the room; exactly one concurrent caller wins
    pub async fn create_game(&self, room_id: &RoomId) -> GameResult<GameHandle> {
        let mut games = self.games.lock().await;
        if games.contains_key(room_id) {
            return Err(GameError::AlreadyActive);
        }
        let game = Arc::new(Mutex::new(GameState::new(room_id.clone())));
        games.insert(room_id.clone(), game.clone());
        tracing::info!("Created game in room {}", room_id);
        Ok(game)
    }

    pub async fn get_game(&self, room_id: &RoomId) -> Option<GameHandle> {
        self.games.lock().await.get(room_id).cloned()
    }

    pub async fn can_create_game(&self, room_id: &RoomId) -> bool {
        !self.games.lock().await.contains_key(room_id)
    }

    pub async fn active_rooms(&self) -> Vec<RoomId> {
        self.games.lock().await.keys().cloned().collect()
    }

    /// Cancel timers and discard the room's game. Idempotent.
    ///
    /// The game is shut down after the map lock is released.
    pub async fn end_game(&self, room_id: &RoomId) -> bool {
        let removed = self.games.lock().await.remove(room_id);
        match removed {
            Some(game) => {
                game.lock().await.shut_down();
                tracing::info!("Ended game in room {}", room_id);
                true
            }
            None => false,
        }
    }

    /// Like [`end_game`](Self::end_game), but only if `game` still occupies
    /// the room. Keeps a late finisher from ending a newer game.
    pub async fn end_game_instance(&self, room_id: &RoomId, game: &GameHandle) -> bool {
        {
            let mut games = self.games.lock().await;
            let is_current = games
                .get(room_id)
                .is_some_and(|current| Arc::ptr_eq(current, game));
            if !is_current {
                return false;
            }
            games.remove(room_id);
        }
        game.lock().await.shut_down();
        tracing::info!("Ended game in room {}", room_id);
        true
    }

    /// Discard every game. The map lock is released before touching any
    /// game, so a busy room can't stall the others.
    pub async fn end_all(&self) -> Vec<RoomId> {
        let drained: Vec<(RoomId, GameHandle)> = {
            let mut games = self.games.lock().await;
            games.drain().collect()
        };
        let mut rooms = Vec::with_capacity(drained.len());
        for (room_id, game) in drained {
            game.lock().await.shut_down();
            tracing::info!("Force-ended game in room {}", room_id);
            rooms.push(room_id);
        }
        rooms
    }
}
