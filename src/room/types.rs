use serde::{Deserialize, Serialize};

use crate::game::TimeoutReason;

/// Request payload for creating a room
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateRequest {
    #[serde(default)]
    pub max_players: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedResponse {
    pub room_id: String,
}

/// Report that the player on turn stalled or walked away
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutRequest {
    pub offending_player_id: String,
    pub reason: TimeoutReason,
}

/// Body returned by action endpoints that succeed
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub ok: bool,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
