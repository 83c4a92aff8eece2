pub mod admin;
pub mod handlers;
pub mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::AdminAuth;
use crate::broadcast::Gateway;
use crate::cooldown::Cooldowns;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, RoomId};

/// Everything a socket task needs
pub struct ServerContext {
    pub state: Arc<AppState>,
    pub gateway: Arc<Gateway>,
    pub cooldowns: Cooldowns,
    pub auth: AdminAuth,
}

impl ServerContext {
    pub fn new(state: Arc<AppState>, gateway: Arc<Gateway>, auth: AdminAuth) -> Self {
        Self {
            state,
            gateway,
            cooldowns: Cooldowns::new(),
            auth,
        }
    }
}

/// Identity of one connection
#[derive(Debug, Clone)]
pub struct Session {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: String,
    pub player: String,
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(ctx): State<Arc<ServerContext>>,
) -> impl IntoResponse {
    let is_admin = ctx.auth.validate(params.token.as_deref());
    if params.token.is_some() && !is_admin {
        tracing::warn!(
            "Invalid admin token from {} in room {}",
            params.player,
            params.room
        );
    }
    tracing::info!(
        "WebSocket connection request: room={}, player={}, admin={}",
        params.room,
        params.player,
        is_admin
    );

    let session = Session {
        room_id: params.room,
        player_id: params.player,
        is_admin,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, session, ctx))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, session: Session, ctx: Arc<ServerContext>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before registering so no message addressed to us is missed
    let mut announcements = ctx.gateway.subscribe_room(&session.room_id).await;
    let mut connection = ctx.gateway.connect(&session.player_id).await;

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        room_id: session.room_id.clone(),
        player_id: session.player_id.clone(),
        admin: session.is_admin,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        ctx.gateway
            .disconnect(&session.player_id, connection.id)
            .await;
        return;
    }

    loop {
        tokio::select! {
            announcement = announcements.recv() => {
                match announcement {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("{} lagged, skipped {} announcements", session.player_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            direct = connection.rx.recv() => {
                match direct {
                    Some(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", session.player_id, text);

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &session, &ctx).await,
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                ))
                            }
                        };
                        if let Some(reply) = reply {
                            if !send_json(&mut sender, &reply).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by {}", session.player_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    ctx.gateway
        .disconnect(&session.player_id, connection.id)
        .await;
    tracing::info!(
        "WebSocket connection closed for {} in room {}",
        session.player_id,
        session.room_id
    );
}
