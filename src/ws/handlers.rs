//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Admin authorization and command cooldowns are checked here, then the
//! message is dispatched to the player or admin handler modules.

use crate::cooldown::Command;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::SettingsUpdate;

use super::{admin, player, ServerContext, Session};

/// Macro to check admin authorization and return early if unauthorized
macro_rules! check_admin {
    ($session:expr, $action:expr) => {
        if !$session.is_admin {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only admins can {}", $action),
            });
        }
    };
}

/// Macro to enforce a command cooldown and return early while it runs
macro_rules! check_cooldown {
    ($ctx:expr, $session:expr, $command:expr) => {
        if let Err(wait) = $ctx
            .cooldowns
            .check($command, &$session.room_id, &$session.player_id)
            .await
        {
            return Some(ServerMessage::Error {
                code: "COOLDOWN".to_string(),
                msg: format!(
                    "Please wait {}s before using this command again",
                    wait.as_secs().max(1)
                ),
            });
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    ctx: &ServerContext,
) -> Option<ServerMessage> {
    let state = &ctx.state;
    match msg {
        ClientMessage::Play => {
            check_cooldown!(ctx, session, Command::Play);
            player::handle_play(state, session).await
        }

        ClientMessage::Join => player::handle_join(state, session).await,

        ClientMessage::Leave => player::handle_leave(state, session).await,

        ClientMessage::Start => player::handle_start(state, session).await,

        ClientMessage::Chat { text } => player::handle_chat(state, session, text).await,

        ClientMessage::StartVote => {
            check_cooldown!(ctx, session, Command::StartVote);
            player::handle_start_vote(state, session).await
        }

        ClientMessage::Vote { target } => player::handle_vote(state, session, target).await,

        ClientMessage::Status => {
            check_cooldown!(ctx, session, Command::Status);
            player::handle_status(state, session).await
        }

        ClientMessage::Recall => {
            check_cooldown!(ctx, session, Command::Recall);
            player::handle_recall(state, session).await
        }

        ClientMessage::VoteKick { target } => {
            check_cooldown!(ctx, session, Command::VoteKick);
            player::handle_vote_kick(state, session, target).await
        }

        ClientMessage::RequestWord { word } => {
            check_cooldown!(ctx, session, Command::RequestWord);
            player::handle_request_word(state, session, word).await
        }

        ClientMessage::Rules => {
            check_cooldown!(ctx, session, Command::Rules);
            player::handle_rules(state, session).await
        }

        // Admin-only commands (authorization checked before dispatch)
        ClientMessage::ForceQuit => {
            check_admin!(session, "force quit games");
            admin::handle_force_quit(state, session).await
        }

        ClientMessage::UpdateSettings {
            min_players,
            max_players,
            rounds,
            description_timeout,
            vote_timeout,
            max_missed_rounds,
            multiple_imposters,
            imposter_percent,
        } => {
            check_admin!(session, "change settings");
            check_cooldown!(ctx, session, Command::Settings);
            let update = SettingsUpdate {
                min_players,
                max_players,
                rounds,
                description_timeout,
                vote_timeout,
                max_missed_rounds,
                multiple_imposters,
                imposter_ratio: None,
            };
            admin::handle_update_settings(state, session, update, imposter_percent).await
        }
    }
}
