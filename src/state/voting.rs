//! Voting coordinator.
//!
//! Voting closes exactly once. Either the last ballot or the vote timer gets
//! there first; `votes_tallied` turns the loser into a no-op.

use super::{score_votes, AppState, GameHandle, TimerHandle};
use crate::error::{GameError, GameResult};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Open voting once the description phase is complete.
    ///
    /// Snapshots the eligible voters, arms the auto-tally timer and hands each
    /// voter a ballot. Ballot delivery failures are logged and skipped.
    pub async fn open_voting(self: &Arc<Self>, room_id: &RoomId) -> GameResult<VotingProgress> {
        let settings = self.config.get_settings(room_id).await;
        let game = self.game(room_id).await?;

        let (progress, eligible, cancelled) = {
            let mut g = game.lock().await;
            if !g.started || g.turn_phase != TurnPhase::Complete {
                return Err(GameError::WrongPhase(
                    "Voting opens once the description phase is complete",
                ));
            }
            if g.voting_phase != VotingPhase::Closed {
                return Err(GameError::WrongPhase("Voting has already started"));
            }
            g.voting_phase = VotingPhase::Open;
            g.eligible_voters = g.joined_players.clone();

            let (timer, cancelled) = TimerHandle::new();
            g.vote_timer = Some(timer);
            (g.voting_progress(), g.eligible_voters.clone(), cancelled)
        };

        let state = Arc::clone(self);
        let timer_room = room_id.clone();
        let timer_game = Arc::clone(&game);
        let vote_timeout = settings.vote_timeout();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(vote_timeout) => {
                    tracing::info!("Vote timer fired in room {}", timer_room);
                    state.tally_votes(&timer_room, &timer_game).await;
                }
                _ = cancelled => {
                    tracing::debug!("Vote timer cancelled in room {}", timer_room);
                }
            }
        });

        tracing::info!(
            "Voting opened in room {} for {} players ({}s)",
            room_id,
            eligible.len(),
            settings.vote_timeout
        );
        self.announce(
            room_id,
            &format!(
                "Voting has started! You have {} seconds to vote.\n{}",
                settings.vote_timeout,
                render_progress(&progress)
            ),
        )
        .await;

        let ballots = eligible.iter().map(|voter| {
            let options: Vec<PlayerId> = eligible.iter().filter(|p| *p != voter).cloned().collect();
            async move {
                if let Err(e) = self
                    .notifier
                    .present_vote_options(room_id, voter, &options)
                    .await
                {
                    tracing::warn!("Failed to deliver ballot to {}: {}", voter, e);
                }
            }
        });
        futures::future::join_all(ballots).await;

        Ok(progress)
    }

    /// Record one vote. The final expected vote tallies immediately.
    pub async fn cast_vote(
        &self,
        room_id: &RoomId,
        voter: &PlayerId,
        target: &PlayerId,
    ) -> GameResult<VotingProgress> {
        let game = self.game(room_id).await?;

        let (progress, complete) = {
            let mut g = game.lock().await;
            if g.voting_phase != VotingPhase::Open {
                return Err(GameError::WrongPhase("Voting is not open"));
            }
            if !g.eligible_voters.contains(voter) || !g.is_active(voter) {
                return Err(GameError::NotInGame);
            }
            if g.voted_players.contains(voter) {
                return Err(GameError::AlreadyVoted);
            }
            if voter == target || !g.is_active(target) {
                return Err(GameError::InvalidTarget);
            }

            g.votes.insert(voter.clone(), target.clone());
            g.voted_players.insert(voter.clone());
            (g.voting_progress(), g.all_voted())
        };

        tracing::debug!("{} voted in room {}", voter, room_id);
        self.announce(room_id, &render_progress(&progress)).await;

        if complete {
            self.tally_votes(room_id, &game).await;
        }
        Ok(progress)
    }

    /// Close voting and announce the result.
    ///
    /// Returns `None` if this game was already tallied or ended; the caller
    /// lost the race and nothing is announced twice.
    pub async fn tally_votes(&self, room_id: &RoomId, game: &GameHandle) -> Option<TallyResult> {
        let result = {
            let mut g = game.lock().await;
            if g.votes_tallied || g.ended {
                return None;
            }
            g.votes_tallied = true;
            g.voting_phase = VotingPhase::Tallied;
            if let Some(timer) = g.vote_timer.take() {
                timer.cancel();
            }

            let (outcome, vote_counts) = score_votes(&g.votes, &g.imposters);
            let mut imposters: Vec<PlayerId> = g.imposters.iter().cloned().collect();
            imposters.sort();
            TallyResult {
                outcome,
                vote_counts,
                imposters,
                secret_word: g.secret_word.clone(),
                duration_minutes: g.duration_minutes().unwrap_or(0),
                player_count: g.player_count(),
                description_count: g.description_count(),
            }
        };

        tracing::info!("Tallied votes in room {}: {:?}", room_id, result.outcome);
        self.announce(room_id, &render_tally(&result)).await;
        self.registry.end_game_instance(room_id, game).await;
        Some(result)
    }
}

/// Voting status view: counter, bar and per-player check marks
pub fn render_progress(progress: &VotingProgress) -> String {
    let mut lines = vec![
        format!(
            "Votes cast: {}/{}",
            progress.votes_cast, progress.total_players
        ),
        progress.progress_bar(),
    ];
    for (player_id, voted) in &progress.players {
        let mark = if *voted { "✅" } else { "⏳" };
        lines.push(format!("{} {}", mark, mention(player_id)));
    }
    lines.join("\n")
}

pub fn render_tally(result: &TallyResult) -> String {
    let mut lines = vec!["Voting Results:".to_string()];
    for (target, count) in &result.vote_counts {
        let noun = if *count == 1 { "vote" } else { "votes" };
        lines.push(format!("{}: {} {}", mention(target), count, noun));
    }

    lines.push(match &result.outcome {
        VoteOutcome::NoVotes => "No votes were cast. The game ends with no winner.".to_string(),
        VoteOutcome::Caught { player_id } => {
            format!("{} was an imposter! Players win!", mention(player_id))
        }
        VoteOutcome::ImpostersWin { .. } => "The imposters win!".to_string(),
    });

    let imposters: Vec<String> = result.imposters.iter().map(|p| mention(p)).collect();
    let label = if imposters.len() == 1 { "imposter was" } else { "imposters were" };
    lines.push(format!("The {}: {}", label, imposters.join(", ")));
    if let Some(word) = &result.secret_word {
        lines.push(format!("The word was: {}", word));
    }
    lines.push(format!(
        "Game lasted {} minutes with {} players and {} descriptions.",
        result.duration_minutes, result.player_count, result.description_count
    ));
    lines.join("\n")
}
