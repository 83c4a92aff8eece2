//! The authoritative record of one room's game.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::oneshot;

use crate::types::*;

/// A description request waiting on one specific player
#[derive(Debug)]
pub struct PendingTurn {
    pub player_id: PlayerId,
    pub reply: oneshot::Sender<String>,
}

/// Cancellation handle for a background timer task (lobby expiry, vote
/// auto-tally). Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: oneshot::Sender<()>,
}

impl TimerHandle {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (cancel, rx) = oneshot::channel();
        (Self { cancel }, rx)
    }

    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

/// An open vote-kick poll against one target
#[derive(Debug, Clone)]
pub struct KickPoll {
    pub required_votes: usize,
    pub voters: HashSet<PlayerId>,
}

#[derive(Debug)]
pub struct GameState {
    pub id: GameId,
    pub room_id: RoomId,
    /// Active roster in join order
    pub joined_players: Vec<PlayerId>,
    pub started: bool,
    pub description_phase_started: bool,
    pub turn_phase: TurnPhase,
    pub voting_phase: VotingPhase,
    pub imposters: HashSet<PlayerId>,
    pub secret_word: Option<String>,
    pub descriptions: HashMap<PlayerId, Vec<String>>,
    pub missed_rounds: HashMap<PlayerId, u32>,
    pub votes: HashMap<PlayerId, PlayerId>,
    pub voted_players: HashSet<PlayerId>,
    /// Roster snapshot taken when voting opened
    pub eligible_voters: Vec<PlayerId>,
    pub round_number: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub kicked_players: HashSet<PlayerId>,
    pub left_players: HashSet<PlayerId>,
    pub kick_polls: HashMap<PlayerId, KickPoll>,
    pub votes_tallied: bool,
    pub lobby_timer: Option<TimerHandle>,
    pub vote_timer: Option<TimerHandle>,
    pub pending_turn: Option<PendingTurn>,
    /// Set once the registry has discarded this game
    pub ended: bool,
}

impl GameState {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            room_id,
            joined_players: Vec::new(),
            started: false,
            description_phase_started: false,
            turn_phase: TurnPhase::NotStarted,
            voting_phase: VotingPhase::Closed,
            imposters: HashSet::new(),
            secret_word: None,
            descriptions: HashMap::new(),
            missed_rounds: HashMap::new(),
            votes: HashMap::new(),
            voted_players: HashSet::new(),
            eligible_voters: Vec::new(),
            round_number: 0,
            start_time: None,
            kicked_players: HashSet::new(),
            left_players: HashSet::new(),
            kick_polls: HashMap::new(),
            votes_tallied: false,
            lobby_timer: None,
            vote_timer: None,
            pending_turn: None,
            ended: false,
        }
    }

    pub fn is_active(&self, player_id: &str) -> bool {
        self.joined_players.iter().any(|p| p == player_id)
    }

    pub fn player_count(&self) -> usize {
        self.joined_players.len()
    }

    /// Strip every trace of a player from the game.
    ///
    /// Idempotent. Disposition (left/kicked) is recorded by the caller.
    pub fn remove_player(&mut self, player_id: &str) {
        self.joined_players.retain(|p| p != player_id);
        self.imposters.remove(player_id);
        self.descriptions.remove(player_id);
        self.missed_rounds.remove(player_id);
        self.voted_players.remove(player_id);
        self.votes.remove(player_id);
        self.eligible_voters.retain(|p| p != player_id);

        // Votes cast for the player go too, so those voters may vote again
        let orphaned: Vec<PlayerId> = self
            .votes
            .iter()
            .filter(|(_, target)| target.as_str() == player_id)
            .map(|(voter, _)| voter.clone())
            .collect();
        for voter in orphaned {
            self.votes.remove(&voter);
            self.voted_players.remove(&voter);
        }

        self.kick_polls.remove(player_id);
        for poll in self.kick_polls.values_mut() {
            poll.voters.remove(player_id);
        }

        // Wakes the scheduler if it was waiting on this player
        if self
            .pending_turn
            .as_ref()
            .is_some_and(|turn| turn.player_id == player_id)
        {
            self.pending_turn = None;
        }
    }

    /// Whether every active player has a recorded vote
    pub fn all_voted(&self) -> bool {
        !self.joined_players.is_empty() && self.voted_players.len() >= self.joined_players.len()
    }

    pub fn voting_progress(&self) -> VotingProgress {
        VotingProgress {
            votes_cast: self.votes.len(),
            total_players: self.joined_players.len(),
            players: self
                .joined_players
                .iter()
                .map(|p| (p.clone(), self.voted_players.contains(p)))
                .collect(),
        }
    }

    pub fn description_count(&self) -> usize {
        self.descriptions.values().map(Vec::len).sum()
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        self.start_time
            .map(|start| (Utc::now() - start).num_minutes())
    }

    /// Tear down timers and waiters; the game is discarded afterwards
    pub fn shut_down(&mut self) {
        self.ended = true;
        for timer in [self.lobby_timer.take(), self.vote_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.cancel();
        }
        self.pending_turn = None;
    }
}

/// Score recorded votes.
///
/// `None` when no votes were cast. A unique strict maximum that is an
/// imposter is a catch; every other distribution is an imposter win.
pub fn score_votes(
    votes: &HashMap<PlayerId, PlayerId>,
    imposters: &HashSet<PlayerId>,
) -> (VoteOutcome, Vec<(PlayerId, u32)>) {
    if votes.is_empty() {
        return (VoteOutcome::NoVotes, Vec::new());
    }

    let mut counts: HashMap<&PlayerId, u32> = HashMap::new();
    for target in votes.values() {
        *counts.entry(target).or_insert(0) += 1;
    }

    let mut vote_counts: Vec<(PlayerId, u32)> = counts
        .into_iter()
        .map(|(target, n)| (target.clone(), n))
        .collect();
    vote_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let max = vote_counts[0].1;
    let top: Vec<PlayerId> = vote_counts
        .iter()
        .filter(|(_, n)| *n == max)
        .map(|(p, _)| p.clone())
        .collect();

    let outcome = match top.as_slice() {
        [only] if imposters.contains(only) => VoteOutcome::Caught {
            player_id: only.clone(),
        },
        _ => VoteOutcome::ImpostersWin { top },
    };
    (outcome, vote_counts)
}
