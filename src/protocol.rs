use crate::error::GameError;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a lobby in the connection's room
    Play,
    Join,
    Leave,
    Start,
    /// Plain room chat; answers a pending description request
    Chat {
        text: String,
    },
    StartVote,
    Vote {
        target: PlayerId,
    },
    Status,
    Recall,
    VoteKick {
        target: PlayerId,
    },
    RequestWord {
        word: String,
    },
    /// How to play, with the room's current settings
    Rules,
    // Admin-only messages
    ForceQuit,
    UpdateSettings {
        #[serde(default)]
        min_players: Option<u32>,
        #[serde(default)]
        max_players: Option<u32>,
        #[serde(default)]
        rounds: Option<u32>,
        #[serde(default)]
        description_timeout: Option<u64>,
        #[serde(default)]
        vote_timeout: Option<u64>,
        #[serde(default)]
        max_missed_rounds: Option<u32>,
        #[serde(default)]
        multiple_imposters: Option<bool>,
        /// Percentage of players who become imposters (25 = 25%)
        #[serde(default)]
        imposter_percent: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        room_id: RoomId,
        player_id: PlayerId,
        admin: bool,
        server_now: String,
    },
    /// Plain confirmation for the acting player
    Ack {
        msg: String,
    },
    Started {
        summary: StartSummary,
    },
    VotingProgress {
        progress: VotingProgress,
    },
    Status {
        status: GameStatus,
    },
    Recall {
        descriptions: Vec<PlayerDescriptions>,
    },
    KickProgress {
        progress: KickProgress,
    },
    Settings {
        settings: GameSettings,
    },
    Rules {
        text: String,
    },
    /// Room-wide game text
    Announcement {
        room_id: RoomId,
        text: String,
    },
    /// Private text for one player
    Direct {
        text: String,
    },
    Ballot {
        room_id: RoomId,
        eligible: Vec<PlayerId>,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn ack(msg: impl Into<String>) -> Self {
        ServerMessage::Ack { msg: msg.into() }
    }

    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(e: GameError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}
