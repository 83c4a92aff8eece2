//! Description phase scheduler.
//!
//! Each turn registers a [`PendingTurn`] on the game and then waits on its
//! receiver without holding the game lock. The wait ends in one of three
//! ways: the player's submission arrives, the timeout elapses, or the sender
//! is dropped because the player was removed or the game was shut down.

use super::{AppState, GameHandle, PendingTurn};
use crate::error::{GameError, GameResult};
use crate::notify::Pacer;
use crate::types::*;
use rand::seq::SliceRandom;
use std::time::Duration;
use tokio::sync::oneshot;

/// How a description phase run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every round ran; voting may begin
    Completed,
    /// The game was ended underneath the scheduler
    Cancelled,
}

enum Turn {
    Done,
    Cancelled,
}

impl AppState {
    /// Run every description round for the room's game
    pub async fn run_description_phase(&self, room_id: &RoomId) -> GameResult<PhaseOutcome> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;

        {
            let mut g = game.lock().await;
            if !g.started || g.turn_phase != TurnPhase::NotStarted {
                return Err(GameError::WrongPhase(
                    "The description phase can't start right now",
                ));
            }
            g.description_phase_started = true;
        }

        let pacer = Pacer::new(self.timing.notify_min_interval);

        for round in 1..=settings.rounds {
            let order = {
                let mut g = game.lock().await;
                if g.ended {
                    return Ok(PhaseOutcome::Cancelled);
                }
                g.round_number = round;
                g.turn_phase = TurnPhase::Running {
                    round,
                    of: settings.rounds,
                };
                let mut order = g.joined_players.clone();
                order.shuffle(&mut rand::rng());
                order
            };
            let timeout = settings.effective_description_timeout(order.len());
            tracing::debug!(
                "Room {} round {}/{} with {} players, {:?} per turn",
                room_id,
                round,
                settings.rounds,
                order.len(),
                timeout
            );

            self.announce_paced(
                &pacer,
                room_id,
                &format!("Round {}/{}", round, settings.rounds),
            )
            .await;

            for player_id in &order {
                let turn = self
                    .take_turn(room_id, &game, &pacer, player_id, timeout, &settings)
                    .await;
                if let Turn::Cancelled = turn {
                    return Ok(PhaseOutcome::Cancelled);
                }
            }
        }

        let remaining = {
            let mut g = game.lock().await;
            if g.ended {
                return Ok(PhaseOutcome::Cancelled);
            }
            g.turn_phase = TurnPhase::Complete;
            g.player_count()
        };

        if self
            .end_if_short_handed(room_id, &game, remaining, settings.min_players)
            .await
        {
            return Err(GameError::InsufficientPlayers);
        }

        self.announce_paced(
            &pacer,
            room_id,
            "Description phase complete! Use /vote to start voting!",
        )
        .await;
        tracing::info!("Description phase complete in room {}", room_id);
        Ok(PhaseOutcome::Completed)
    }

    async fn take_turn(
        &self,
        room_id: &RoomId,
        game: &GameHandle,
        pacer: &Pacer,
        player_id: &PlayerId,
        timeout: Duration,
        settings: &GameSettings,
    ) -> Turn {
        let reply = {
            let mut g = game.lock().await;
            if g.ended {
                return Turn::Cancelled;
            }
            // Removed since the round began
            if !g.is_active(player_id) {
                return Turn::Done;
            }
            let (tx, rx) = oneshot::channel();
            g.pending_turn = Some(PendingTurn {
                player_id: player_id.clone(),
                reply: tx,
            });
            rx
        };

        self.announce_paced(
            pacer,
            room_id,
            &format!("{}'s turn to describe!", mention(player_id)),
        )
        .await;

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(text)) => {
                let mut g = game.lock().await;
                if g.ended {
                    return Turn::Cancelled;
                }
                if g.is_active(player_id) {
                    g.descriptions
                        .entry(player_id.clone())
                        .or_default()
                        .push(text);
                }
                Turn::Done
            }
            // Sender dropped: the player was removed or the game shut down
            Ok(Err(_)) => {
                if game.lock().await.ended {
                    Turn::Cancelled
                } else {
                    Turn::Done
                }
            }
            Err(_) => self.miss_turn(room_id, game, pacer, player_id, settings).await,
        }
    }

    async fn miss_turn(
        &self,
        room_id: &RoomId,
        game: &GameHandle,
        pacer: &Pacer,
        player_id: &PlayerId,
        settings: &GameSettings,
    ) -> Turn {
        let (missed, removed) = {
            let mut g = game.lock().await;
            if g.ended {
                return Turn::Cancelled;
            }
            if g
                .pending_turn
                .as_ref()
                .is_some_and(|turn| &turn.player_id == player_id)
            {
                g.pending_turn = None;
            }
            if !g.is_active(player_id) {
                return Turn::Done;
            }

            let missed = {
                let count = g.missed_rounds.entry(player_id.clone()).or_insert(0);
                *count += 1;
                *count
            };
            let removed = missed >= settings.max_missed_rounds;
            if removed {
                g.remove_player(player_id);
            }
            (missed, removed)
        };

        self.announce_paced(
            pacer,
            room_id,
            &format!(
                "{} took too long! ({}/{} missed)",
                mention(player_id),
                missed,
                settings.max_missed_rounds
            ),
        )
        .await;

        if removed {
            tracing::info!("Removed {} from room {} for inactivity", player_id, room_id);
            self.announce_paced(
                pacer,
                room_id,
                &format!("{} has been removed for inactivity!", mention(player_id)),
            )
            .await;
        }
        Turn::Done
    }

    /// Resolve the pending description request, if it belongs to `player_id`
    pub async fn submit_description(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        text: &str,
    ) -> GameResult<()> {
        let game = self.game(room_id).await?;
        let mut g = game.lock().await;
        match g.pending_turn.take() {
            Some(turn) if &turn.player_id == player_id => turn
                .reply
                .send(text.to_string())
                .map_err(|_| GameError::NotYourTurn),
            other => {
                g.pending_turn = other;
                Err(GameError::NotYourTurn)
            }
        }
    }
}
