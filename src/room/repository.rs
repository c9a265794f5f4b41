use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::{
    GameData, GameRoom, InviteEntry, InviteStatus, PlayerEntry, RoomStatus, SpinRecord, Winner,
    ROOMS_COLLECTION,
};
use super::timestamp::EpochMillis;
use crate::game::WheelPet;
use crate::session::UserIdentity;
use crate::shared::{AppError, SubscriptionHandle};
use crate::store::{Document, DocumentStore, DocumentSubscription, FieldPath, FieldUpdates};

fn to_value<T: Serialize>(value: &T) -> Value {
    // Model types serialize to plain JSON objects, arrays and scalars
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn game_field(name: &str) -> FieldPath {
    FieldPath::new(["gameData", name])
}

/// Decodes a stored room document, normalizing every timestamp on the way in
pub fn decode_room(room_id: &str, document: Document) -> Result<GameRoom, AppError> {
    let mut room: GameRoom = serde_json::from_value(Value::Object(document)).map_err(|e| {
        AppError::DatabaseError(format!("Malformed room document {}: {}", room_id, e))
    })?;
    room.id = room_id.to_string();
    Ok(room)
}

/// Typed partial update of a room document.
///
/// Every setter addresses one field path, so two clients writing different fields
/// never clobber each other; writers of the same field race with last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    fields: FieldUpdates,
}

impl RoomUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: RoomStatus) -> Self {
        self.fields = self.fields.set("status", json!(status));
        self
    }

    /// Adds the player entry and bumps `currentPlayers` atomically
    pub fn add_player(mut self, user: &UserIdentity) -> Self {
        let entry = PlayerEntry {
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            joined_at: None,
            ready: false,
        };
        let path = FieldPath::new(["players", user.id.as_str()]);
        self.fields = self
            .fields
            .set(path.clone(), to_value(&entry))
            .server_timestamp(path.child("joinedAt"))
            .increment("currentPlayers", 1);
        self
    }

    pub fn remove_player(mut self, user_id: &str) -> Self {
        self.fields = self
            .fields
            .delete(FieldPath::new(["players", user_id]))
            .increment("currentPlayers", -1);
        self
    }

    /// Writes a fresh room-side invite entry stamped with the commit time
    pub fn invite(mut self, to_user_id: &str, entry: &InviteEntry) -> Self {
        let path = FieldPath::new(["invites", to_user_id]);
        self.fields = self
            .fields
            .set(path.clone(), to_value(entry))
            .server_timestamp(path.child("timestamp"));
        self
    }

    pub fn invite_status(mut self, to_user_id: &str, status: InviteStatus) -> Self {
        self.fields = self.fields.set(
            FieldPath::new(["invites", to_user_id, "status"]),
            json!(status),
        );
        self
    }

    pub fn player_order(mut self, order: &[String]) -> Self {
        self.fields = self.fields.set(game_field("playerOrder"), json!(order));
        self
    }

    pub fn current_turn_index(mut self, index: usize) -> Self {
        self.fields = self.fields.set(game_field("currentTurnIndex"), json!(index));
        self
    }

    pub fn current_round(mut self, round: u32) -> Self {
        self.fields = self.fields.set(game_field("currentRound"), json!(round));
        self
    }

    /// Replaces the whole score map
    pub fn scores(mut self, scores: &HashMap<String, f64>) -> Self {
        self.fields = self.fields.set(game_field("scores"), json!(scores));
        self
    }

    /// Sets a single player's score, leaving the others untouched
    pub fn score(mut self, user_id: &str, score: f64) -> Self {
        self.fields = self
            .fields
            .set(game_field("scores").child(user_id), json!(score));
        self
    }

    pub fn is_spinning(mut self, spinning: bool) -> Self {
        self.fields = self.fields.set(game_field("isSpinning"), json!(spinning));
        self
    }

    pub fn turn_start_time(mut self, at: EpochMillis) -> Self {
        self.fields = self.fields.set(game_field("turnStartTime"), json!(at));
        self
    }

    pub fn spin_history(mut self, history: &[SpinRecord]) -> Self {
        self.fields = self
            .fields
            .set(game_field("spinHistory"), to_value(&history));
        self
    }

    pub fn winner(mut self, winner: Option<&Winner>) -> Self {
        self.fields = self.fields.set(game_field("winner"), to_value(&winner));
        self
    }

    pub fn is_draw(mut self, draw: bool) -> Self {
        self.fields = self.fields.set(game_field("isDraw"), json!(draw));
        self
    }

    pub fn timeout_reason(mut self, reason: Option<&str>) -> Self {
        self.fields = self.fields.set(game_field("timeoutReason"), json!(reason));
        self
    }

    pub fn timed_out_player_id(mut self, user_id: Option<&str>) -> Self {
        self.fields = self
            .fields
            .set(game_field("timedOutPlayerId"), json!(user_id));
        self
    }

    pub fn win_awarded(mut self, awarded: bool) -> Self {
        self.fields = self.fields.set(game_field("winAwarded"), json!(awarded));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &FieldUpdates {
        &self.fields
    }

    pub fn into_fields(self) -> FieldUpdates {
        self.fields
    }
}

#[cfg(test)]
impl RoomUpdate {
    /// Applies the update to a room snapshot the way the store would
    pub(crate) fn apply_to(&self, room: &GameRoom) -> GameRoom {
        let mut document = match to_value(room) {
            Value::Object(document) => document,
            other => panic!("room serialized to {}", other),
        };
        crate::store::apply_updates(&mut document, &self.fields);
        decode_room(&room.id, document).expect("update produced a malformed room")
    }
}

/// Pull-style live view of one room
pub struct RoomWatch {
    room_id: String,
    subscription: DocumentSubscription,
}

impl RoomWatch {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Next snapshot: `Some(Some(room))` on change, `Some(None)` once deleted,
    /// `None` when the subscription has ended
    pub async fn next(&mut self) -> Option<Option<GameRoom>> {
        loop {
            let snapshot = self.subscription.next().await?;
            match snapshot {
                None => return Some(None),
                Some(document) => match decode_room(&self.room_id, document) {
                    Ok(room) => return Some(Some(room)),
                    Err(e) => {
                        warn!(room_id = %self.room_id, error = %e, "Skipping undecodable room snapshot");
                    }
                },
            }
        }
    }
}

/// Translates room intents into document store operations
#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<dyn DocumentStore>,
}

impl RoomRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[instrument(skip(self, host, wheel_pets), fields(host_id = %host.id))]
    pub async fn create_room(
        &self,
        host: &UserIdentity,
        wheel_pets: Vec<WheelPet>,
        max_players: u32,
        total_rounds: u32,
    ) -> Result<String, AppError> {
        let room_id = Uuid::new_v4().to_string();
        let host_entry = PlayerEntry {
            display_name: host.display_name.clone(),
            avatar: host.avatar.clone(),
            joined_at: None,
            ready: false,
        };
        let host_path = FieldPath::new(["players", host.id.as_str()]);

        let fields = FieldUpdates::new()
            .set("hostId", json!(host.id))
            .set("status", json!(RoomStatus::Waiting))
            .set("maxPlayers", json!(max_players))
            .set("currentPlayers", json!(1))
            .set("players", json!({}))
            .set(host_path.clone(), to_value(&host_entry))
            .server_timestamp(host_path.child("joinedAt"))
            .set("invites", json!({}))
            .set("wheelPets", to_value(&wheel_pets))
            .set("gameData", to_value(&GameData::new(total_rounds)))
            .server_timestamp("createdAt");

        self.store
            .create_document(ROOMS_COLLECTION, Some(&room_id), fields)
            .await?;

        info!(
            room_id = %room_id,
            max_players,
            total_rounds,
            wheel_size = wheel_pets.len(),
            "Room created"
        );
        Ok(room_id)
    }

    #[instrument(skip(self))]
    pub async fn get_room(&self, room_id: &str) -> Result<Option<GameRoom>, AppError> {
        let document = self.store.get_document(ROOMS_COLLECTION, room_id).await?;
        match document {
            Some(document) => {
                let room = decode_room(room_id, document)?;
                debug!(room_id = %room_id, status = %room.status, "Room loaded");
                Ok(Some(room))
            }
            None => {
                debug!(room_id = %room_id, "Room not found");
                Ok(None)
            }
        }
    }

    /// Merges the update into the room; not compare-and-swap
    #[instrument(skip(self, update), fields(field_count = update.fields().len()))]
    pub async fn update_room(&self, room_id: &str, update: RoomUpdate) -> Result<(), AppError> {
        if update.is_empty() {
            return Ok(());
        }
        self.store
            .update_document(ROOMS_COLLECTION, room_id, update.into_fields())
            .await?;
        debug!(room_id = %room_id, "Room updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        self.store.delete_document(ROOMS_COLLECTION, room_id).await?;
        info!(room_id = %room_id, "Room deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn watch_room(&self, room_id: &str) -> Result<RoomWatch, AppError> {
        let subscription = self.store.subscribe(ROOMS_COLLECTION, room_id).await?;
        Ok(RoomWatch {
            room_id: room_id.to_string(),
            subscription,
        })
    }

    /// Invokes `on_change` with every snapshot, `None` once the room is deleted
    pub async fn subscribe_to_room<F>(
        &self,
        room_id: &str,
        on_change: F,
    ) -> Result<SubscriptionHandle, AppError>
    where
        F: Fn(Option<GameRoom>) + Send + 'static,
    {
        let mut watch = self.watch_room(room_id).await?;
        let task = tokio::spawn(async move {
            while let Some(snapshot) = watch.next().await {
                on_change(snapshot);
            }
            debug!(room_id = %watch.room_id(), "Room subscription ended");
        });
        Ok(SubscriptionHandle::new(task))
    }
}
