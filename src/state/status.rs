use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;

impl AppState {
    /// How to play, filled in with the room's settings
    pub async fn rules(&self, room_id: &RoomId) -> String {
        render_rules(&self.config.get_settings(room_id).await)
    }

    pub async fn get_status(&self, room_id: &RoomId) -> GameResult<GameStatus> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;
        let g = game.lock().await;

        let players = g
            .joined_players
            .iter()
            .map(|p| PlayerStatusInfo {
                player_id: p.clone(),
                missed_rounds: g.missed_rounds.get(p).copied().unwrap_or(0),
                voted: g.voted_players.contains(p),
            })
            .collect();

        Ok(GameStatus {
            game_id: g.id.clone(),
            started: g.started,
            description_phase_started: g.description_phase_started,
            round_number: g.round_number,
            rounds: settings.rounds,
            max_players: settings.max_players,
            players,
            duration_minutes: g.duration_minutes(),
        })
    }

    /// Every active player's descriptions so far, in roster order
    pub async fn recall_descriptions(&self, room_id: &RoomId) -> GameResult<Vec<PlayerDescriptions>> {
        let game = self.game(room_id).await?;
        let g = game.lock().await;
        if !g.description_phase_started {
            return Err(GameError::WrongPhase(
                "The description phase hasn't started yet",
            ));
        }

        let recalled: Vec<PlayerDescriptions> = g
            .joined_players
            .iter()
            .filter(|p| !g.left_players.contains(*p) && !g.kicked_players.contains(*p))
            .filter_map(|p| {
                g.descriptions
                    .get(p)
                    .filter(|d| !d.is_empty())
                    .map(|d| PlayerDescriptions {
                        player_id: p.clone(),
                        descriptions: d.clone(),
                    })
            })
            .collect();

        if recalled.is_empty() {
            return Err(GameError::NoDescriptions);
        }
        Ok(recalled)
    }

    /// Whose description the scheduler is currently waiting on
    pub async fn current_turn(&self, room_id: &RoomId) -> Option<PlayerId> {
        let game = self.registry.get_game(room_id).await?;
        let g = game.lock().await;
        g.pending_turn.as_ref().map(|turn| turn.player_id.clone())
    }

    pub async fn voting_progress(&self, room_id: &RoomId) -> GameResult<VotingProgress> {
        let game = self.game(room_id).await?;
        let g = game.lock().await;
        if g.voting_phase != VotingPhase::Open {
            return Err(GameError::WrongPhase("Voting is not open"));
        }
        Ok(g.voting_progress())
    }
}

pub fn render_rules(settings: &GameSettings) -> String {
    let imposters = if settings.multiple_imposters {
        "Multiple imposters"
    } else {
        "One imposter"
    };
    format!(
        "How to Play Word Imposter\n\
         Word Imposter is a social deduction game where players try to identify who doesn't know the secret word!\n\
         \n\
         Game Setup\n\
         - {min}-{max} players can join\n\
         - {imposters} will be chosen\n\
         - Everyone except the imposter(s) is sent the secret word\n\
         - The game lasts {rounds} rounds\n\
         \n\
         Description Phase\n\
         - Each player has {describe} seconds to describe the word\n\
         - If you're not the imposter, describe the word without saying it\n\
         - If you are the imposter, try to blend in!\n\
         - Missing {missed} rounds will remove you from the game\n\
         - Use recall to see all descriptions\n\
         \n\
         Voting Phase\n\
         - After descriptions, use start_vote to open voting\n\
         - Players have {vote} seconds to vote\n\
         - Vote for who you think is the imposter\n\
         \n\
         Winning\n\
         - Regular players win if they vote out an imposter\n\
         - Imposters win if they avoid being caught or a regular player is voted out\n\
         \n\
         Helpful Commands\n\
         - status: check game progress\n\
         - vote_kick: start a vote to remove an inactive player\n\
         - request_word: suggest a new word for the game",
        min = settings.min_players,
        max = settings.max_players,
        rounds = settings.rounds,
        describe = settings.description_timeout,
        missed = settings.max_missed_rounds,
        vote = settings.vote_timeout,
    )
}
