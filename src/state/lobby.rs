use super::{AppState, GameHandle, TimerHandle};
use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::Utc;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;

impl AppState {
    /// Open a lobby in the room
    pub async fn create_game(self: &Arc<Self>, room_id: &RoomId) -> GameResult<GameId> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.registry.create_game(room_id).await?;
        let (timer, cancelled) = TimerHandle::new();
        let game_id = {
            let mut g = game.lock().await;
            g.lobby_timer = Some(timer);
            g.id.clone()
        };

        self.spawn_lobby_expiry(room_id.clone(), game, cancelled);
        self.announce(
            room_id,
            &format!(
                "Word Imposter! Players joined: 0/{}. Join the game and try to identify the imposter who doesn't know the secret word!",
                settings.max_players
            ),
        )
        .await;
        Ok(game_id)
    }

    /// Discard the lobby if nobody starts it in time.
    ///
    /// The task ends early once the game starts or is shut down.
    fn spawn_lobby_expiry(
        self: &Arc<Self>,
        room_id: RoomId,
        game: GameHandle,
        cancelled: oneshot::Receiver<()>,
    ) {
        let state = Arc::clone(self);
        let timeout = self.timing.lobby_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {}
                _ = cancelled => {
                    tracing::debug!("Lobby timer cancelled in room {}", room_id);
                    return;
                }
            }
            let expired = {
                let g = game.lock().await;
                !g.started && !g.ended
            };
            if expired && state.registry.end_game_instance(&room_id, &game).await {
                tracing::info!("Lobby in room {} expired", room_id);
                state
                    .announce(&room_id, "The lobby timed out. Use /play to start a new game.")
                    .await;
            }
        });
    }

    /// Add a player to the lobby, returning the new player count
    pub async fn join_game(&self, room_id: &RoomId, player_id: &PlayerId) -> GameResult<usize> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;

        let count = {
            let mut g = game.lock().await;
            if g.started {
                return Err(GameError::AlreadyStarted);
            }
            if g.is_active(player_id) {
                return Err(GameError::AlreadyJoined);
            }
            if g.player_count() >= settings.max_players as usize {
                return Err(GameError::GameFull(settings.max_players));
            }
            g.left_players.remove(player_id);
            g.joined_players.push(player_id.clone());
            g.player_count()
        };

        tracing::info!("Player {} joined room {} ({})", player_id, room_id, count);
        let mut text = format!("Players joined: {}/{}", count, settings.max_players);
        if count == settings.min_players as usize {
            text.push_str(". Enough players to start!");
        }
        self.announce(room_id, &text).await;
        Ok(count)
    }

    /// Voluntarily leave the room's game
    pub async fn leave_game(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> GameResult<RemovalOutcome> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;

        let (remaining, started, voting_complete) = {
            let mut g = game.lock().await;
            if g.left_players.contains(player_id) {
                return Err(GameError::AlreadyLeft);
            }
            if !g.is_active(player_id) {
                return Err(GameError::NotInGame);
            }
            g.remove_player(player_id);
            g.left_players.insert(player_id.clone());
            (
                g.player_count(),
                g.started,
                g.voting_phase == VotingPhase::Open && g.all_voted(),
            )
        };

        tracing::info!("Player {} left room {}", player_id, room_id);
        self.announce(room_id, &format!("{} has left the game.", mention(player_id)))
            .await;
        Ok(self
            .after_removal(room_id, &game, remaining, started, voting_complete, &settings)
            .await)
    }

    /// Shared tail of leave/kick: enforce the player floor, then finish a
    /// vote the removal just completed
    async fn after_removal(
        &self,
        room_id: &RoomId,
        game: &GameHandle,
        remaining: usize,
        started: bool,
        voting_complete: bool,
        settings: &GameSettings,
    ) -> RemovalOutcome {
        if started
            && self
                .end_if_short_handed(room_id, game, remaining, settings.min_players)
                .await
        {
            return RemovalOutcome {
                remaining,
                game_ended: true,
            };
        }
        if voting_complete {
            let tallied = self.tally_votes(room_id, game).await.is_some();
            return RemovalOutcome {
                remaining,
                game_ended: tallied,
            };
        }
        RemovalOutcome {
            remaining,
            game_ended: false,
        }
    }

    /// Assign roles and the secret word, and DM every player their role.
    ///
    /// Per-player delivery failures are collected, never fatal.
    pub async fn assign_roles(&self, room_id: &RoomId) -> GameResult<StartSummary> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;
        let min_players = settings.min_players as usize;

        {
            let g = game.lock().await;
            if g.started {
                return Err(GameError::AlreadyStarted);
            }
            if g.player_count() < min_players {
                return Err(GameError::NotEnoughPlayers(settings.min_players));
            }
        }

        let word = self
            .words
            .random_word()
            .await
            .map_err(|e| GameError::WordSource(e.to_string()))?;

        let (roster, imposters) = {
            let mut g = game.lock().await;
            // Re-check: another start may have won while the word was fetched
            if g.started {
                return Err(GameError::AlreadyStarted);
            }
            if g.player_count() < min_players {
                return Err(GameError::NotEnoughPlayers(settings.min_players));
            }

            let count = settings.imposter_count(g.player_count());
            let imposters: HashSet<PlayerId> = g
                .joined_players
                .choose_multiple(&mut rand::rng(), count)
                .cloned()
                .collect();

            g.started = true;
            if let Some(timer) = g.lobby_timer.take() {
                timer.cancel();
            }
            g.start_time = Some(Utc::now());
            g.imposters = imposters.clone();
            g.secret_word = Some(word.clone());
            (g.joined_players.clone(), imposters)
        };

        tracing::info!(
            "Game in room {} started with {} players, {} imposters",
            room_id,
            roster.len(),
            imposters.len()
        );
        tracing::debug!("Secret word for room {}: {}", room_id, word);

        let deliveries = roster.iter().map(|player_id| {
            let text = if imposters.contains(player_id) {
                "You are an imposter! Try to blend in!".to_string()
            } else {
                format!("The word is: {}", word)
            };
            async move {
                self.notifier
                    .direct_message(player_id, &text)
                    .await
                    .map_err(|e| {
                        tracing::warn!("Failed to send role to {}: {}", player_id, e);
                        player_id.clone()
                    })
            }
        });
        let failed_deliveries: Vec<PlayerId> = futures::future::join_all(deliveries)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        self.announce(room_id, "Game has started! Description phase beginning...")
            .await;

        Ok(StartSummary {
            player_count: roster.len(),
            imposter_count: imposters.len(),
            failed_deliveries,
        })
    }

    /// Start the game and run the description phase in the background
    pub async fn start_game(self: &Arc<Self>, room_id: &RoomId) -> GameResult<StartSummary> {
        let summary = self.assign_roles(room_id).await?;

        let state = Arc::clone(self);
        let room_id = room_id.clone();
        let delay = self.timing.role_reveal_delay;
        tokio::spawn(async move {
            // Give players a moment to read their roles
            tokio::time::sleep(delay).await;
            match state.run_description_phase(&room_id).await {
                Ok(outcome) => {
                    tracing::debug!("Description phase in room {} ended: {:?}", room_id, outcome)
                }
                Err(e) => tracing::info!("Description phase in room {} stopped: {}", room_id, e),
            }
        });

        Ok(summary)
    }

    /// Vote to kick `target`. The first vote opens a poll whose threshold is
    /// fixed at `max(2, players / 2)`.
    pub async fn vote_kick(
        &self,
        room_id: &RoomId,
        voter: &PlayerId,
        target: &PlayerId,
    ) -> GameResult<KickProgress> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;

        let (remaining, voting_complete) = {
            let mut g = game.lock().await;
            if !g.started {
                return Err(GameError::NotFound);
            }
            if g.kicked_players.contains(target) {
                return Err(GameError::AlreadyKicked);
            }
            if !g.is_active(target) {
                return Err(GameError::InvalidTarget);
            }
            if !g.is_active(voter) {
                return Err(GameError::NotInGame);
            }

            let required_votes = (g.player_count() / 2).max(2);
            let poll = g
                .kick_polls
                .entry(target.clone())
                .or_insert_with(|| super::KickPoll {
                    required_votes,
                    voters: HashSet::new(),
                });
            if !poll.voters.insert(voter.clone()) {
                return Err(GameError::AlreadyVoted);
            }

            let remaining_votes = poll.required_votes.saturating_sub(poll.voters.len());
            if remaining_votes > 0 {
                return Ok(KickProgress::Recorded { remaining_votes });
            }

            g.remove_player(target);
            g.kicked_players.insert(target.clone());
            (
                g.player_count(),
                g.voting_phase == VotingPhase::Open && g.all_voted(),
            )
        };

        tracing::info!("Player {} kicked from room {}", target, room_id);
        self.announce(
            room_id,
            &format!("{} has been kicked from the game.", mention(target)),
        )
        .await;
        let outcome = self
            .after_removal(room_id, &game, remaining, true, voting_complete, &settings)
            .await;
        Ok(KickProgress::Kicked {
            game_ended: outcome.game_ended,
        })
    }

    /// End every active game
    pub async fn force_quit_all(&self) -> usize {
        let rooms = self.registry.end_all().await;
        for room_id in &rooms {
            self.announce(room_id, "This game has been forcefully stopped.")
                .await;
        }
        tracing::warn!("Force quit {} games", rooms.len());
        rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::state::tests::{room, test_state};
    use crate::error::GameError;
    use crate::types::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_join_rules() {
        let (state, _notifier) = test_state(GameSettings {
            min_players: 2,
            max_players: 2,
            ..Default::default()
        })
        .await;
        let room = room();
        state.create_game(&room).await.unwrap();

        assert_eq!(state.join_game(&room, &"a".to_string()).await, Ok(1));
        assert_eq!(
            state.join_game(&room, &"a".to_string()).await,
            Err(GameError::AlreadyJoined)
        );
        assert_eq!(state.join_game(&room, &"b".to_string()).await, Ok(2));
        assert_eq!(
            state.join_game(&room, &"c".to_string()).await,
            Err(GameError::GameFull(2))
        );
        assert_eq!(
            state.join_game(&"nowhere".to_string(), &"a".to_string()).await,
            Err(GameError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_cannot_join_after_start() {
        let (state, _notifier) = test_state(GameSettings::default()).await;
        let room = room();
        state.create_game(&room).await.unwrap();
        state.join_game(&room, &"a".to_string()).await.unwrap();
        state.assign_roles(&room).await.unwrap();

        assert_eq!(
            state.join_game(&room, &"b".to_string()).await,
            Err(GameError::AlreadyStarted)
        );
    }

    #[tokio::test]
    async fn test_leave_in_lobby_keeps_game_and_allows_rejoin() {
        let (state, _notifier) = test_state(GameSettings {
            min_players: 2,
            ..Default::default()
        })
        .await;
        let room = room();
        let alice = "alice".to_string();
        state.create_game(&room).await.unwrap();
        state.join_game(&room, &alice).await.unwrap();

        let outcome = state.leave_game(&room, &alice).await.unwrap();
        assert_eq!(outcome.remaining, 0);
        assert!(!outcome.game_ended);
        assert_eq!(
            state.leave_game(&room, &alice).await,
            Err(GameError::AlreadyLeft)
        );

        state.join_game(&room, &alice).await.unwrap();
        let game = state.registry.get_game(&room).await.unwrap();
        assert!(!game.lock().await.left_players.contains(&alice));
    }

    #[tokio::test]
    async fn test_leave_after_start_below_minimum_ends_game() {
        let (state, notifier) = test_state(GameSettings {
            min_players: 2,
            ..Default::default()
        })
        .await;
        let room = room();
        state.create_game(&room).await.unwrap();
        for p in ["a", "b"] {
            state.join_game(&room, &p.to_string()).await.unwrap();
        }
        state.assign_roles(&room).await.unwrap();

        let outcome = state.leave_game(&room, &"a".to_string()).await.unwrap();
        assert!(outcome.game_ended);
        assert!(state.registry.get_game(&room).await.is_none());
        assert!(notifier
            .announcements()
            .await
            .iter()
            .any(|text| text.contains("Not enough players remaining")));
    }

    #[tokio::test]
    async fn test_start_requires_minimum_and_only_once() {
        let (state, notifier) = test_state(GameSettings {
            min_players: 2,
            ..Default::default()
        })
        .await;
        let room = room();
        state.create_game(&room).await.unwrap();
        state.join_game(&room, &"a".to_string()).await.unwrap();
        assert_eq!(
            state.assign_roles(&room).await,
            Err(GameError::NotEnoughPlayers(2))
        );

        state.join_game(&room, &"b".to_string()).await.unwrap();
        let summary = state.assign_roles(&room).await.unwrap();
        assert_eq!(summary.player_count, 2);
        assert_eq!(summary.imposter_count, 1);
        assert!(summary.failed_deliveries.is_empty());
        assert_eq!(
            state.assign_roles(&room).await,
            Err(GameError::AlreadyStarted)
        );

        let dms = notifier.direct_messages().await;
        assert_eq!(dms.len(), 2);
        assert_eq!(
            dms.iter()
                .filter(|(_, text)| text.contains("imposter"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_start_collects_failed_deliveries() {
        let (state, notifier) = test_state(GameSettings::default()).await;
        let room = room();
        state.create_game(&room).await.unwrap();
        for p in ["a", "b", "c"] {
            state.join_game(&room, &p.to_string()).await.unwrap();
        }
        notifier.make_unreachable("b").await;

        let summary = state.assign_roles(&room).await.unwrap();
        assert_eq!(summary.failed_deliveries, vec!["b".to_string()]);
        assert_eq!(notifier.direct_messages().await.len(), 2);

        let game = state.registry.get_game(&room).await.unwrap();
        assert!(game.lock().await.started);
    }

    #[tokio::test]
    async fn test_vote_kick_threshold_and_duplicates() {
        let (state, notifier) = test_state(GameSettings::default()).await;
        let room = room();
        state.create_game(&room).await.unwrap();
        for p in ["a", "b", "c", "d", "e"] {
            state.join_game(&room, &p.to_string()).await.unwrap();
        }
        let (a, b, c, e) = (
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "e".to_string(),
        );

        assert_eq!(
            state.vote_kick(&room, &a, &e).await,
            Err(GameError::NotFound),
            "kicking needs a started game"
        );
        state.assign_roles(&room).await.unwrap();

        assert_eq!(
            state.vote_kick(&room, &a, &e).await,
            Ok(KickProgress::Recorded { remaining_votes: 1 })
        );
        assert_eq!(
            state.vote_kick(&room, &a, &e).await,
            Err(GameError::AlreadyVoted)
        );
        assert_eq!(
            state.vote_kick(&room, &b, &e).await,
            Ok(KickProgress::Kicked { game_ended: false })
        );
        assert_eq!(
            state.vote_kick(&room, &c, &e).await,
            Err(GameError::AlreadyKicked)
        );
        assert_eq!(
            state.vote_kick(&room, &e, &a).await,
            Err(GameError::NotInGame)
        );

        let game = state.registry.get_game(&room).await.unwrap();
        let g = game.lock().await;
        assert!(g.kicked_players.contains(&e));
        assert!(!g.is_active(&e));
        drop(g);
        assert!(notifier
            .announcements()
            .await
            .iter()
            .any(|text| text.contains("<@e> has been kicked")));
    }

    #[tokio::test]
    async fn test_force_quit_all() {
        let (state, _notifier) = test_state(GameSettings::default()).await;
        for r in ["r1", "r2"] {
            state.create_game(&r.to_string()).await.unwrap();
        }
        assert_eq!(state.force_quit_all().await, 2);
        assert!(state.registry.can_create_game(&"r1".to_string()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_expires() {
        let (state, notifier) = test_state(GameSettings::default()).await;
        let room = room();
        state.create_game(&room).await.unwrap();

        tokio::time::sleep(state.timing.lobby_timeout + std::time::Duration::from_secs(1)).await;
        assert!(state.registry.get_game(&room).await.is_none());
        assert!(notifier
            .announcements()
            .await
            .iter()
            .any(|text| text.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_timer_released_when_game_ends_early() {
        let (state, notifier) = test_state(GameSettings::default()).await;
        let room = room();
        state.create_game(&room).await.unwrap();
        let game = state.registry.get_game(&room).await.unwrap();

        state.registry.end_game(&room).await;
        // Let the expiry task observe the cancellation
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(&game), 1);

        // A new lobby in the same room is not cut short by the old timer
        state.create_game(&room).await.unwrap();
        tokio::time::sleep(state.timing.lobby_timeout / 2).await;
        assert!(state.registry.get_game(&room).await.is_some());
        assert!(!notifier
            .announcements()
            .await
            .iter()
            .any(|text| text.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_cancels_lobby_timer() {
        let (state, _notifier) = test_state(GameSettings {
            min_players: 1,
            ..Default::default()
        })
        .await;
        let room = room();
        state.create_game(&room).await.unwrap();
        state.join_game(&room, &"a".to_string()).await.unwrap();
        state.assign_roles(&room).await.unwrap();

        let game = state.registry.get_game(&room).await.unwrap();
        assert!(game.lock().await.lobby_timer.is_none());
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(&game), 2, "registry and this test only");
    }
}
