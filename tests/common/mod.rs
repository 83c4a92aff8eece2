#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use word_imposter::auth::AdminAuth;
use word_imposter::broadcast::{Gateway, PlayerConnection};
use word_imposter::error::{GameError, GameResult};
use word_imposter::protocol::ServerMessage;
use word_imposter::settings::ConfigStore;
use word_imposter::state::AppState;
use word_imposter::types::{GameSettings, PlayerId, RoomId, SettingsUpdate};
use word_imposter::words::{WordError, WordSource};
use word_imposter::ws::{ServerContext, Session};

pub const ADMIN_TOKEN: &str = "let-me-in";

/// In-memory settings shared by every room
pub struct MemoryConfig(pub Mutex<GameSettings>);

#[async_trait]
impl ConfigStore for MemoryConfig {
    async fn get_settings(&self, _room_id: &RoomId) -> GameSettings {
        self.0.lock().await.clone()
    }

    async fn update_settings(
        &self,
        _room_id: &RoomId,
        update: &SettingsUpdate,
    ) -> GameResult<GameSettings> {
        let mut settings = self.0.lock().await;
        *settings = update.apply(&settings).map_err(GameError::Validation)?;
        Ok(settings.clone())
    }
}

pub struct FixedWord(pub &'static str);

#[async_trait]
impl WordSource for FixedWord {
    async fn random_word(&self) -> Result<String, WordError> {
        Ok(self.0.to_string())
    }

    async fn add_word(&self, word: &str, _submitter: &PlayerId) -> Result<String, WordError> {
        Ok(word.to_lowercase())
    }
}

/// Something the gateway delivered to the harness
#[derive(Debug, Clone)]
pub enum Delivered {
    Room(ServerMessage),
    Player(PlayerId, ServerMessage),
}

/// A server wired to the real gateway, recording the room and connected players
pub struct Harness {
    pub ctx: ServerContext,
    pub gateway: Arc<Gateway>,
    pub rooms: Vec<broadcast::Receiver<ServerMessage>>,
    pub players: Vec<(PlayerId, PlayerConnection)>,
    pub room: RoomId,
}

impl Harness {
    pub fn state(&self) -> &Arc<AppState> {
        &self.ctx.state
    }

    pub fn session(&self, player: &str) -> Session {
        Session {
            room_id: self.room.clone(),
            player_id: player.to_string(),
            is_admin: false,
        }
    }

    pub fn admin_session(&self, player: &str) -> Session {
        Session {
            is_admin: true,
            ..self.session(player)
        }
    }

    pub async fn connect(&mut self, players: &[&str]) {
        for p in players {
            let player_id = p.to_string();
            let connection = self.gateway.connect(&player_id).await;
            self.players.push((player_id, connection));
        }
    }

    /// Also record announcements made in another room
    pub async fn listen(&mut self, room: &str) {
        let rx = self.gateway.subscribe_room(&room.to_string()).await;
        self.rooms.push(rx);
    }

    /// Everything delivered so far
    pub fn drain(&mut self) -> Vec<Delivered> {
        let mut out = Vec::new();
        for rx in &mut self.rooms {
            while let Ok(msg) = rx.try_recv() {
                out.push(Delivered::Room(msg));
            }
        }
        for (player_id, connection) in &mut self.players {
            while let Ok(msg) = connection.rx.try_recv() {
                out.push(Delivered::Player(player_id.clone(), msg));
            }
        }
        out
    }
}

pub fn announcements(delivered: &[Delivered]) -> Vec<String> {
    delivered
        .iter()
        .filter_map(|d| match d {
            Delivered::Room(ServerMessage::Announcement { text, .. }) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn for_player<'a>(delivered: &'a [Delivered], player: &str) -> Vec<&'a ServerMessage> {
    delivered
        .iter()
        .filter_map(|d| match d {
            Delivered::Player(player_id, msg) if player_id == player => Some(msg),
            _ => None,
        })
        .collect()
}

pub async fn harness_with(
    config: Arc<dyn ConfigStore>,
    words: Arc<dyn WordSource>,
) -> Harness {
    let room: RoomId = "room-1".to_string();
    let gateway = Arc::new(Gateway::default());
    let rx = gateway.subscribe_room(&room).await;
    let state = Arc::new(AppState::new(config, words, gateway.clone()));
    let ctx = ServerContext::new(
        state,
        gateway.clone(),
        AdminAuth::new(Some(ADMIN_TOKEN.to_string())),
    );
    Harness {
        ctx,
        gateway,
        rooms: vec![rx],
        players: Vec::new(),
        room,
    }
}

pub async fn harness(settings: GameSettings) -> Harness {
    harness_with(
        Arc::new(MemoryConfig(Mutex::new(settings))),
        Arc::new(FixedWord("lighthouse")),
    )
    .await
}

/// Poll until the scheduler is waiting on someone
pub async fn wait_for_turn(state: &AppState, room_id: &RoomId) -> PlayerId {
    loop {
        if let Some(player_id) = state.current_turn(room_id).await {
            return player_id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the room's game is gone
pub async fn wait_for_game_end(state: &AppState, room_id: &RoomId) {
    while state.registry.get_game(room_id).await.is_some() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
