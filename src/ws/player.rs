//! Player message handlers
//!
//! Every command acts on the session's own room and player id. Game errors
//! become an `error` reply for the acting player only.

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::words::WordError;
use std::sync::Arc;

use super::Session;

pub async fn handle_play(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.create_game(&session.room_id).await {
        Ok(game_id) => {
            tracing::info!("{} opened game {} in {}", session.player_id, game_id, session.room_id);
            Some(ServerMessage::ack("Game created! Use join to take part."))
        }
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_join(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.join_game(&session.room_id, &session.player_id).await {
        Ok(count) => Some(ServerMessage::ack(format!(
            "You joined the game ({} players)",
            count
        ))),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_leave(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.leave_game(&session.room_id, &session.player_id).await {
        Ok(_) => Some(ServerMessage::ack("You have left the game.")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_start(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.start_game(&session.room_id).await {
        Ok(summary) => Some(ServerMessage::Started { summary }),
        Err(e) => Some(e.into()),
    }
}

/// Chat only matters while the scheduler waits on this player
pub async fn handle_chat(
    state: &Arc<AppState>,
    session: &Session,
    text: String,
) -> Option<ServerMessage> {
    if text.trim().is_empty() {
        return None;
    }
    match state
        .submit_description(&session.room_id, &session.player_id, &text)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("Description recorded")),
        Err(GameError::NotYourTurn | GameError::NotFound) => None,
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_start_vote(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.open_voting(&session.room_id).await {
        Ok(progress) => Some(ServerMessage::VotingProgress { progress }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    session: &Session,
    target: String,
) -> Option<ServerMessage> {
    match state
        .cast_vote(&session.room_id, &session.player_id, &target)
        .await
    {
        Ok(progress) => Some(ServerMessage::VotingProgress { progress }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_status(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.get_status(&session.room_id).await {
        Ok(status) => Some(ServerMessage::Status { status }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_recall(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.recall_descriptions(&session.room_id).await {
        Ok(descriptions) => Some(ServerMessage::Recall { descriptions }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_vote_kick(
    state: &Arc<AppState>,
    session: &Session,
    target: String,
) -> Option<ServerMessage> {
    match state
        .vote_kick(&session.room_id, &session.player_id, &target)
        .await
    {
        Ok(progress) => Some(ServerMessage::KickProgress { progress }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_request_word(
    state: &Arc<AppState>,
    session: &Session,
    word: String,
) -> Option<ServerMessage> {
    match state.words.add_word(&word, &session.player_id).await {
        Ok(word) => Some(ServerMessage::ack(format!(
            "Added '{}' to the word list",
            word
        ))),
        Err(WordError::Io(e)) => {
            tracing::error!("Word list write failed: {}", e);
            Some(ServerMessage::error(
                "WORD_LIST_UNAVAILABLE",
                "The word list is unavailable right now",
            ))
        }
        Err(e) => Some(ServerMessage::error("WORD_REJECTED", e.to_string())),
    }
}

pub async fn handle_rules(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    let text = state.rules(&session.room_id).await;
    Some(ServerMessage::Rules { text })
}
