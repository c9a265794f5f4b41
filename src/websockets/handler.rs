use async_trait::async_trait;
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::messages::{LifecyclePayload, MessageType, WebSocketMessage};
use super::socket::{Connection, MessageHandler, SocketWrapper};
use crate::lifecycle::LifecycleSignal;
use crate::room::{EpochMillis, GameRoom};
use crate::session::{TokenConfig, UserIdentity};
use crate::shared::{AppError, AppState};

/// Feeds `LIFECYCLE` messages from the client into its room session
pub struct LifecycleMessageHandler {
    lifecycle: LifecycleSignal,
}

impl LifecycleMessageHandler {
    pub fn new(lifecycle: LifecycleSignal) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl MessageHandler for LifecycleMessageHandler {
    async fn handle_message(&self, user_id: &str, message: String) {
        let ws_message = match serde_json::from_str::<WebSocketMessage>(&message) {
            Ok(ws_message) => ws_message,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to parse WebSocket message");
                return;
            }
        };

        match ws_message.message_type {
            MessageType::Lifecycle => {
                match serde_json::from_value::<LifecyclePayload>(ws_message.payload) {
                    Ok(payload) => {
                        debug!(user_id = %user_id, state = %payload.state, "Lifecycle update");
                        self.lifecycle.set(payload.state);
                    }
                    Err(e) => warn!(user_id = %user_id, error = %e, "Invalid lifecycle payload"),
                }
            }
            other => debug!(message_type = ?other, "Unhandled message type"),
        }
    }
}

/// Invite sockets accept no client messages
pub struct IgnoreMessageHandler;

#[async_trait]
impl MessageHandler for IgnoreMessageHandler {
    async fn handle_message(&self, user_id: &str, message: String) {
        debug!(user_id = %user_id, message = %message, "Ignoring client message");
    }
}

/// Token travels in the Sec-WebSocket-Protocol header since browsers cannot set Authorization
fn authenticate(headers: &HeaderMap, token_config: &TokenConfig) -> Result<UserIdentity, AppError> {
    let token = headers
        .get("sec-websocket-protocol")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing or invalid Sec-WebSocket-Protocol header");
            AppError::Unauthorized("Missing authentication token".to_string())
        })?;
    token_config.validate_token(token.trim())
}

fn room_message(room_id: &str, snapshot: Option<&GameRoom>) -> WebSocketMessage {
    match snapshot {
        Some(room) => WebSocketMessage::room_snapshot(room),
        None => WebSocketMessage::room_deleted(room_id),
    }
}

fn push(sender: &mpsc::UnboundedSender<String>, message: WebSocketMessage) {
    match message.to_json() {
        Ok(json) => {
            // Receiver gone means the socket is closing
            let _ = sender.send(json);
        }
        Err(e) => warn!(error = %e, "Failed to serialize outbound message"),
    }
}

/// Pushes each room snapshot to the socket and asks it to close after `ROOM_DELETED`
fn forward_snapshots(
    room_id: String,
    sender: mpsc::UnboundedSender<String>,
    closing: watch::Sender<bool>,
) -> impl Fn(Option<GameRoom>) + Send + 'static {
    move |snapshot| {
        let deleted = snapshot.is_none();
        push(&sender, room_message(&room_id, snapshot.as_ref()));
        if deleted {
            closing.send_replace(true);
        }
    }
}

fn error_json(message: &str) -> String {
    WebSocketMessage::error(message).to_json().unwrap_or_default()
}

/// GET /ws/rooms/:room_id with JWT token in Sec-WebSocket-Protocol header
pub async fn room_websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    info!(room_id = %room_id, "Room WebSocket requested");

    let user = authenticate(&headers, &app_state.token_config)?;

    if app_state.coordinator.get_room(&room_id).await.is_none() {
        warn!(room_id = %room_id, "Room not found, rejecting WebSocket connection");
        return Err(AppError::NotFound("Room not found".to_string()));
    }

    info!(room_id = %room_id, user_id = %user.id, "Room verified, establishing WebSocket connection");
    Ok(ws.on_upgrade(move |socket| handle_room_connection(socket, room_id, user, app_state)))
}

async fn handle_room_connection(
    socket: axum::extract::ws::WebSocket,
    room_id: String,
    user: UserIdentity,
    app_state: AppState,
) {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    let (closing_sender, closing) = watch::channel(false);
    let lifecycle = LifecycleSignal::new();

    let session = app_state
        .coordinator
        .open_room_session(
            &room_id,
            &user.id,
            &lifecycle,
            forward_snapshots(room_id.clone(), outbound_sender.clone(), closing_sender),
        )
        .await;

    let Some(session) = session else {
        let mut socket = socket;
        let _ = socket.send_message(error_json("Could not open room")).await;
        let _ = SocketWrapper::close(&mut socket).await;
        return;
    };

    let connection = Connection::new(
        user.id.clone(),
        Box::new(socket),
        outbound_receiver,
        Arc::new(LifecycleMessageHandler::new(lifecycle)),
    )
    .with_shutdown(closing);

    match connection.run().await {
        Ok(()) => info!(room_id = %room_id, user_id = %user.id, "Room WebSocket closed cleanly"),
        Err(e) => warn!(room_id = %room_id, user_id = %user.id, error = ?e, "Room WebSocket error"),
    }

    session.close();
}

/// GET /ws/invites with JWT token in Sec-WebSocket-Protocol header
pub async fn invites_websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    let user = authenticate(&headers, &app_state.token_config)?;
    info!(user_id = %user.id, "Invite WebSocket requested");
    Ok(ws.on_upgrade(move |socket| handle_invites_connection(socket, user, app_state)))
}

async fn handle_invites_connection(
    socket: axum::extract::ws::WebSocket,
    user: UserIdentity,
    app_state: AppState,
) {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let filter = app_state.coordinator.invite_filter();
    let sender = outbound_sender.clone();
    let subscription = app_state
        .coordinator
        .subscribe_to_user_invites(&user.id, move |invites| {
            let invites = filter.actionable(invites, EpochMillis::now());
            push(&sender, WebSocketMessage::invites(&invites));
        })
        .await;

    let Some(subscription) = subscription else {
        let mut socket = socket;
        let _ = socket.send_message(error_json("Could not load invites")).await;
        let _ = SocketWrapper::close(&mut socket).await;
        return;
    };

    let connection = Connection::new(
        user.id.clone(),
        Box::new(socket),
        outbound_receiver,
        Arc::new(IgnoreMessageHandler),
    );

    if let Err(e) = connection.run().await {
        warn!(user_id = %user.id, error = ?e, "Invite WebSocket error");
    }

    subscription.unsubscribe();
    info!(user_id = %user.id, "Invite WebSocket closed");
}
