//! Admin-only command handlers
//!
//! Authorization is checked in the main dispatch layer before calling these.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::SettingsUpdate;
use std::sync::Arc;

use super::Session;

pub async fn handle_force_quit(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    tracing::warn!("Admin {} forcing all games to quit", session.player_id);
    let ended = state.force_quit_all().await;
    Some(ServerMessage::ack(format!("Force quit {} active games", ended)))
}

/// `imposter_percent` arrives as a percentage and is stored as a fraction
pub async fn handle_update_settings(
    state: &Arc<AppState>,
    session: &Session,
    mut update: SettingsUpdate,
    imposter_percent: Option<f64>,
) -> Option<ServerMessage> {
    update.imposter_ratio = imposter_percent.map(|p| p / 100.0);
    tracing::info!(
        "Admin {} updating settings for {}: {:?}",
        session.player_id,
        session.room_id,
        update
    );
    match state.config.update_settings(&session.room_id, &update).await {
        Ok(settings) => Some(ServerMessage::Settings { settings }),
        Err(e) => Some(e.into()),
    }
}
