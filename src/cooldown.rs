//! Per-command cooldowns for the gateway.
//!
//! Some commands are limited per room (anyone in the room triggers the
//! cooldown for everyone), others per player.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Status,
    Recall,
    StartVote,
    VoteKick,
    RequestWord,
    Rules,
    Settings,
}

impl Command {
    pub fn window(self) -> Duration {
        match self {
            Command::Play => Duration::from_secs(30),
            Command::Status
            | Command::Recall
            | Command::StartVote
            | Command::Rules
            | Command::Settings => Duration::from_secs(5),
            Command::VoteKick => Duration::from_secs(30),
            Command::RequestWord => Duration::from_secs(300),
        }
    }

    fn per_room(self) -> bool {
        !matches!(self, Command::VoteKick | Command::RequestWord)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cooldowns {
    /// (command, room or player) -> last accepted use
    last_used: Arc<RwLock<HashMap<(Command, String), Instant>>>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the use, or return how long the caller still has to wait
    pub async fn check(&self, command: Command, room_id: &str, player_id: &str) -> Result<(), Duration> {
        let scope = if command.per_room() { room_id } else { player_id };
        let key = (command, scope.to_string());
        let now = Instant::now();
        let mut last_used = self.last_used.write().await;

        if let Some(last) = last_used.get(&key) {
            let ready_at = *last + command.window();
            if now < ready_at {
                return Err(ready_at - now);
            }
        }
        last_used.insert(key, now);
        Ok(())
    }

    /// Drop expired entries (call periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut last_used = self.last_used.write().await;
        last_used.retain(|(command, _), last| now.duration_since(*last) < command.window());
    }
}
