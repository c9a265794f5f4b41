use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::invite::UserInvite;
use crate::lifecycle::LifecycleState;
use crate::room::GameRoom;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Client -> Server
    Lifecycle,

    // Server -> Client
    RoomSnapshot,
    RoomDeleted,
    Invites,
    Error,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub meta: Option<WebSocketMessageMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecyclePayload {
    pub state: LifecycleState,
}

impl WebSocketMessage {
    fn server(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    pub fn room_snapshot(room: &GameRoom) -> Self {
        Self::server(
            MessageType::RoomSnapshot,
            serde_json::to_value(room).unwrap_or_default(),
        )
    }

    pub fn room_deleted(room_id: &str) -> Self {
        Self::server(MessageType::RoomDeleted, json!({ "roomId": room_id }))
    }

    pub fn invites(invites: &[UserInvite]) -> Self {
        Self::server(MessageType::Invites, json!({ "invites": invites }))
    }

    pub fn error(message: &str) -> Self {
        Self::server(MessageType::Error, json!({ "message": message }))
    }

    pub fn lifecycle(state: LifecycleState) -> Self {
        Self {
            message_type: MessageType::Lifecycle,
            payload: json!({ "state": state }),
            meta: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
