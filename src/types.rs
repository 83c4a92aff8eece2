use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types
pub type RoomId = String;
pub type PlayerId = String;
pub type GameId = String;

/// Per-room game settings, owned by the config store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameSettings {
    pub min_players: u32,
    pub max_players: u32,
    pub rounds: u32,
    pub description_timeout: u64,
    pub vote_timeout: u64,
    pub max_missed_rounds: u32,
    pub multiple_imposters: bool,
    /// Share of players who become imposters in larger games (0.25 = 25%)
    pub imposter_ratio: f64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_players: 10,
            rounds: 3,
            description_timeout: 60,
            vote_timeout: 120,
            max_missed_rounds: 2,
            multiple_imposters: false,
            imposter_ratio: 0.25,
        }
    }
}

/// Minimum for both the description and the vote timeout
pub const MIN_TIMEOUT_SECS: u64 = 10;

/// Multiple imposters only kick in from this roster size
pub const MULTI_IMPOSTER_MIN_PLAYERS: usize = 6;

impl GameSettings {
    /// Per-turn timeout for a round, stretched for larger games
    pub fn effective_description_timeout(&self, player_count: usize) -> Duration {
        let extra = (player_count as u64).saturating_sub(5) * 10;
        Duration::from_secs(self.description_timeout + extra)
    }

    pub fn vote_timeout(&self) -> Duration {
        Duration::from_secs(self.vote_timeout)
    }

    /// Number of imposters to assign for a roster of `player_count`
    pub fn imposter_count(&self, player_count: usize) -> usize {
        if self.multiple_imposters && player_count >= MULTI_IMPOSTER_MIN_PLAYERS {
            ((player_count as f64 * self.imposter_ratio).floor() as usize).clamp(1, player_count)
        } else {
            1
        }
    }

    /// Check every range constraint on a full settings value
    pub fn validate(&self) -> Result<(), String> {
        if self.min_players < 1 {
            return Err("Minimum players must be at least 1".to_string());
        }
        if self.min_players > self.max_players {
            return Err("Minimum players cannot be greater than maximum players".to_string());
        }
        if self.rounds < 1 {
            return Err("Rounds must be at least 1".to_string());
        }
        if self.description_timeout < MIN_TIMEOUT_SECS {
            return Err(format!(
                "Description timeout must be at least {} seconds",
                MIN_TIMEOUT_SECS
            ));
        }
        if self.vote_timeout < MIN_TIMEOUT_SECS {
            return Err(format!(
                "Vote timeout must be at least {} seconds",
                MIN_TIMEOUT_SECS
            ));
        }
        if self.max_missed_rounds < 1 {
            return Err("Max missed rounds must be at least 1".to_string());
        }
        if !(self.imposter_ratio > 0.0 && self.imposter_ratio <= 1.0) {
            return Err("Imposter ratio must be above 0% and at most 100%".to_string());
        }
        Ok(())
    }
}

/// Partial settings update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsUpdate {
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub rounds: Option<u32>,
    pub description_timeout: Option<u64>,
    pub vote_timeout: Option<u64>,
    pub max_missed_rounds: Option<u32>,
    pub multiple_imposters: Option<bool>,
    pub imposter_ratio: Option<f64>,
}

impl SettingsUpdate {
    /// Apply onto a copy of `current`, validating the result
    pub fn apply(&self, current: &GameSettings) -> Result<GameSettings, String> {
        match (self.min_players, self.max_players) {
            (Some(min), Some(max)) if min > max => {
                return Err("Minimum players cannot be greater than maximum players".to_string())
            }
            (Some(min), None) if min > current.max_players => {
                return Err(
                    "Minimum players cannot be greater than current maximum players".to_string(),
                )
            }
            (None, Some(max)) if max < current.min_players => {
                return Err("Maximum players cannot be less than current minimum players".to_string())
            }
            _ => {}
        }

        let mut next = current.clone();
        if let Some(v) = self.min_players {
            next.min_players = v;
        }
        if let Some(v) = self.max_players {
            next.max_players = v;
        }
        if let Some(v) = self.rounds {
            next.rounds = v;
        }
        if let Some(v) = self.description_timeout {
            next.description_timeout = v;
        }
        if let Some(v) = self.vote_timeout {
            next.vote_timeout = v;
        }
        if let Some(v) = self.max_missed_rounds {
            next.max_missed_rounds = v;
        }
        if let Some(v) = self.multiple_imposters {
            next.multiple_imposters = v;
        }
        if let Some(v) = self.imposter_ratio {
            next.imposter_ratio = v;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Description phase progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    NotStarted,
    Running { round: u32, of: u32 },
    Complete,
}

/// Voting phase progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingPhase {
    Closed,
    Open,
    Tallied,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Nobody voted; no winner is determined
    NoVotes,
    /// A single imposter received the strict maximum
    Caught { player_id: PlayerId },
    /// Tie for the maximum, or the top pick was not an imposter
    ImpostersWin { top: Vec<PlayerId> },
}

/// Everything revealed when voting closes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TallyResult {
    pub outcome: VoteOutcome,
    /// (target, votes) sorted by votes descending
    pub vote_counts: Vec<(PlayerId, u32)>,
    pub imposters: Vec<PlayerId>,
    pub secret_word: Option<String>,
    pub duration_minutes: i64,
    pub player_count: usize,
    pub description_count: usize,
}

/// Snapshot of the voting progress view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VotingProgress {
    pub votes_cast: usize,
    pub total_players: usize,
    pub players: Vec<(PlayerId, bool)>,
}

impl VotingProgress {
    /// Ten-cell bar, filled proportionally to votes cast
    pub fn progress_bar(&self) -> String {
        let filled = if self.total_players > 0 {
            (self.votes_cast * 10 / self.total_players).min(10)
        } else {
            0
        };
        format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatusInfo {
    pub player_id: PlayerId,
    pub missed_rounds: u32,
    pub voted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStatus {
    pub game_id: GameId,
    pub started: bool,
    pub description_phase_started: bool,
    pub round_number: u32,
    pub rounds: u32,
    pub max_players: u32,
    pub players: Vec<PlayerStatusInfo>,
    /// Minutes since start, once started
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerDescriptions {
    pub player_id: PlayerId,
    pub descriptions: Vec<String>,
}

/// Result of a successful start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartSummary {
    pub player_count: usize,
    pub imposter_count: usize,
    /// Players whose role message could not be delivered
    pub failed_deliveries: Vec<PlayerId>,
}

/// Result of a leave, kick or inactivity removal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub remaining: usize,
    pub game_ended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KickProgress {
    Recorded { remaining_votes: usize },
    Kicked { game_ended: bool },
}

/// Render a player reference for chat text
pub fn mention(player_id: &str) -> String {
    format!("<@{}>", player_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timeout_grows_past_five_players() {
        let settings = GameSettings {
            description_timeout: 60,
            ..Default::default()
        };
        assert_eq!(
            settings.effective_description_timeout(8),
            Duration::from_secs(90)
        );
        assert_eq!(
            settings.effective_description_timeout(5),
            Duration::from_secs(60)
        );
        assert_eq!(
            settings.effective_description_timeout(3),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_imposter_count() {
        let single = GameSettings::default();
        assert_eq!(single.imposter_count(9), 1);

        let multi = GameSettings {
            multiple_imposters: true,
            imposter_ratio: 0.25,
            ..Default::default()
        };
        assert_eq!(multi.imposter_count(5), 1);
        assert_eq!(multi.imposter_count(6), 1);
        assert_eq!(multi.imposter_count(8), 2);
        assert_eq!(multi.imposter_count(10), 2);

        let all = GameSettings {
            multiple_imposters: true,
            imposter_ratio: 1.0,
            ..Default::default()
        };
        assert_eq!(all.imposter_count(6), 6);
    }

    #[test]
    fn test_update_rejects_min_above_current_max() {
        let current = GameSettings {
            min_players: 2,
            max_players: 3,
            ..Default::default()
        };
        let update = SettingsUpdate {
            min_players: Some(5),
            ..Default::default()
        };
        let err = update.apply(&current).unwrap_err();
        assert!(err.contains("current maximum"));
    }

    #[test]
    fn test_update_checks_pair_together() {
        let current = GameSettings::default();
        let update = SettingsUpdate {
            min_players: Some(6),
            max_players: Some(4),
            ..Default::default()
        };
        assert!(update.apply(&current).is_err());

        let update = SettingsUpdate {
            min_players: Some(12),
            max_players: Some(20),
            ..Default::default()
        };
        let next = update.apply(&current).unwrap();
        assert_eq!(next.min_players, 12);
        assert_eq!(next.max_players, 20);
    }

    #[test]
    fn test_update_enforces_timeout_floor() {
        let current = GameSettings::default();
        let update = SettingsUpdate {
            vote_timeout: Some(5),
            ..Default::default()
        };
        assert!(update.apply(&current).unwrap_err().contains("Vote timeout"));

        let update = SettingsUpdate {
            description_timeout: Some(9),
            ..Default::default()
        };
        assert!(update
            .apply(&current)
            .unwrap_err()
            .contains("Description timeout"));
    }

    #[test]
    fn test_progress_bar() {
        let progress = VotingProgress {
            votes_cast: 1,
            total_players: 4,
            players: Vec::new(),
        };
        assert_eq!(progress.progress_bar(), "██░░░░░░░░");

        let empty = VotingProgress {
            votes_cast: 0,
            total_players: 0,
            players: Vec::new(),
        };
        assert_eq!(empty.progress_bar(), "░░░░░░░░░░");
    }
}
