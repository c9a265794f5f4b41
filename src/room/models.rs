use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{AsRefStr, Display, EnumString};

use super::timestamp::EpochMillis;
use crate::game::WheelPet;

/// Collection holding one document per active game
pub const ROOMS_COLLECTION: &str = "gameRooms";

/// Room lifecycle; transitions only move forward
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub joined_at: Option<EpochMillis>,
    #[serde(default)]
    pub ready: bool,
}

/// Room-side record of an invite, keyed by the invited user's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteEntry {
    pub from_user_id: String,
    pub from_user_name: String,
    #[serde(default)]
    pub from_user_avatar: Option<String>,
    pub status: InviteStatus,
    #[serde(default)]
    pub timestamp: Option<EpochMillis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRecord {
    pub round: u32,
    pub player_id: String,
    pub pet_name: String,
    pub pet_value: f64,
    #[serde(default)]
    pub pet_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub player_id: String,
    pub score: f64,
}

/// Mutable in-progress state of a game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    #[serde(default)]
    pub player_order: Vec<String>,
    #[serde(default)]
    pub current_turn_index: usize,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub total_rounds: u32,
    #[serde(default)]
    pub scores: HashMap<String, f64>,
    #[serde(default)]
    pub is_spinning: bool,
    #[serde(default)]
    pub turn_start_time: Option<EpochMillis>,
    #[serde(default)]
    pub spin_history: Vec<SpinRecord>,
    #[serde(default)]
    pub winner: Option<Winner>,
    #[serde(default)]
    pub is_draw: bool,
    #[serde(default)]
    pub timeout_reason: Option<String>,
    #[serde(default)]
    pub timed_out_player_id: Option<String>,
    #[serde(default)]
    pub win_awarded: bool,
}

impl GameData {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            total_rounds,
            ..Self::default()
        }
    }

    /// The player whose turn it is, if the order is set
    pub fn current_player(&self) -> Option<&str> {
        self.player_order
            .get(self.current_turn_index)
            .map(String::as_str)
    }

    pub fn score_of(&self, user_id: &str) -> f64 {
        self.scores.get(user_id).copied().unwrap_or(0.0)
    }
}

/// Normalized snapshot of a game room document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRoom {
    #[serde(default)]
    pub id: String,
    pub host_id: String,
    pub status: RoomStatus,
    pub max_players: u32,
    pub current_players: u32,
    #[serde(default)]
    pub players: HashMap<String, PlayerEntry>,
    #[serde(default)]
    pub invites: HashMap<String, InviteEntry>,
    #[serde(default)]
    pub wheel_pets: Vec<WheelPet>,
    #[serde(default)]
    pub game_data: GameData,
    #[serde(default)]
    pub created_at: Option<EpochMillis>,
}

impl GameRoom {
    pub fn has_player(&self, user_id: &str) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    pub fn current_player(&self) -> Option<&str> {
        self.game_data.current_player()
    }

    pub fn is_players_turn(&self, user_id: &str) -> bool {
        self.status == RoomStatus::Playing && self.current_player() == Some(user_id)
    }

    /// Display name for a player, falling back to the raw id
    pub fn player_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.players
            .get(user_id)
            .map(|player| player.display_name.as_str())
            .unwrap_or(user_id)
    }

    /// Host first, then everyone else by join time, ties broken by user id
    pub fn join_order(&self) -> Vec<String> {
        let mut guests: Vec<(&String, &PlayerEntry)> = self
            .players
            .iter()
            .filter(|(user_id, _)| **user_id != self.host_id)
            .collect();
        guests.sort_by(|(a_id, a), (b_id, b)| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a_id.cmp(b_id))
        });

        let mut order = Vec::with_capacity(self.players.len());
        if self.players.contains_key(&self.host_id) {
            order.push(self.host_id.clone());
        }
        order.extend(guests.into_iter().map(|(user_id, _)| user_id.clone()));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn player(name: &str, joined_at: i64) -> PlayerEntry {
        PlayerEntry {
            display_name: name.to_string(),
            avatar: None,
            joined_at: Some(EpochMillis(joined_at)),
            ready: false,
        }
    }

    #[test]
    fn test_room_decodes_camel_case_document() {
        let room: GameRoom = serde_json::from_value(json!({
            "hostId": "host",
            "status": "waiting",
            "maxPlayers": 2,
            "currentPlayers": 1,
            "players": {
                "host": {
                    "displayName": "Hana",
                    "joinedAt": {"seconds": 10, "nanoseconds": 0},
                    "ready": false
                }
            },
            "wheelPets": [{"name": "Frost Dragon", "image": "frost.png", "value": 500}],
            "gameData": {"totalRounds": 3, "scores": {}}
        }))
        .unwrap();

        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.players["host"].joined_at, Some(EpochMillis(10_000)));
        assert_eq!(room.wheel_pets[0].value, 500.0);
        assert_eq!(room.game_data.total_rounds, 3);
        assert!(room.game_data.current_player().is_none());
    }

    #[test]
    fn test_join_order_puts_host_first() {
        let mut players = HashMap::new();
        players.insert("zed".to_string(), player("Zed", 300));
        players.insert("amy".to_string(), player("Amy", 200));
        players.insert("host".to_string(), player("Host", 500));
        players.insert("bob".to_string(), player("Bob", 200));

        let room = GameRoom {
            id: "r1".to_string(),
            host_id: "host".to_string(),
            status: RoomStatus::Waiting,
            max_players: 4,
            current_players: 4,
            players,
            invites: HashMap::new(),
            wheel_pets: vec![],
            game_data: GameData::new(3),
            created_at: None,
        };

        assert_eq!(room.join_order(), vec!["host", "amy", "bob", "zed"]);
        assert_eq!(room.player_name("amy"), "Amy");
        assert_eq!(room.player_name("ghost"), "ghost");
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(RoomStatus::Playing.to_string(), "playing");
        assert_eq!(InviteStatus::from_str("declined").unwrap(), InviteStatus::Declined);
        assert_eq!(json!(InviteStatus::Pending), json!("pending"));
    }
}
