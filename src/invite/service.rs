use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{UserInvite, INVITES_COLLECTION};
use crate::room::{GameRoom, InviteEntry, InviteStatus, RoomRepository, RoomStatus, RoomUpdate};
use crate::session::UserIdentity;
use crate::shared::{AppError, SubscriptionHandle};
use crate::store::{
    upsert_document, Direction, Document, DocumentStore, FieldUpdates, QuerySubscription, Query,
    StoreError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SendInviteResult {
    Sent,
    RoomNotFound,
}

/// Result of attempting to accept an invite
#[derive(Debug, Clone)]
pub enum AcceptInviteResult {
    /// Player is in the room, returns the room as re-read after joining
    Accepted(GameRoom),
    RoomNotFound,
    /// The game already started or finished
    NotWaiting,
    RoomFull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclineInviteResult {
    Declined,
    RoomNotFound,
}

/// Result of attempting to leave a room
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveRoomResult {
    Left,
    /// The leaving player was the last one, so the room is gone
    RoomDeleted,
    PlayerNotInRoom,
    RoomNotFound,
}

fn decode_invites(snapshot: Vec<(String, Document)>) -> Vec<UserInvite> {
    snapshot
        .into_iter()
        .filter_map(|(id, document)| {
            match serde_json::from_value::<UserInvite>(Value::Object(document)) {
                Ok(mut invite) => {
                    invite.id = id;
                    Some(invite)
                }
                Err(e) => {
                    warn!(invite_id = %id, error = %e, "Skipping undecodable invite");
                    None
                }
            }
        })
        .collect()
}

/// Pull-style live list of a user's pending invites, newest first
pub struct InviteWatch {
    subscription: QuerySubscription,
}

impl InviteWatch {
    pub async fn next(&mut self) -> Option<Vec<UserInvite>> {
        self.subscription.next().await.map(decode_invites)
    }
}

/// Room-side invites plus their per-user mirrors, and room membership changes
pub struct InviteService {
    rooms: Arc<RoomRepository>,
}

impl InviteService {
    pub fn new(rooms: Arc<RoomRepository>) -> Self {
        Self { rooms }
    }

    fn store(&self) -> &dyn DocumentStore {
        self.rooms.store().as_ref()
    }

    // Mirrors are never created on accept/decline; a missing one is left alone
    async fn update_mirror_status(
        &self,
        room_id: &str,
        user_id: &str,
        status: InviteStatus,
    ) -> Result<(), AppError> {
        let mirror_id = UserInvite::mirror_id(room_id, user_id);
        let result = self
            .store()
            .update_document(
                INVITES_COLLECTION,
                &mirror_id,
                FieldUpdates::new().set("status", json!(status)),
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                debug!(invite_id = %mirror_id, "No invite mirror to update");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the room-side entry, then the invitee's mirror.
    /// A failed mirror write is reported but the room-side entry is not rolled back.
    #[instrument(skip(self, from), fields(from_user_id = %from.id))]
    pub async fn send_invite(
        &self,
        room_id: &str,
        from: &UserIdentity,
        to_user_id: &str,
    ) -> Result<SendInviteResult, AppError> {
        if self.rooms.get_room(room_id).await?.is_none() {
            return Ok(SendInviteResult::RoomNotFound);
        }

        let entry = InviteEntry {
            from_user_id: from.id.clone(),
            from_user_name: from.display_name.clone(),
            from_user_avatar: from.avatar.clone(),
            status: InviteStatus::Pending,
            timestamp: None,
        };
        self.rooms
            .update_room(room_id, RoomUpdate::new().invite(to_user_id, &entry))
            .await?;

        let mirror = FieldUpdates::new()
            .set("roomId", json!(room_id))
            .set("toUserId", json!(to_user_id))
            .set("fromUserId", json!(from.id))
            .set("fromUserName", json!(from.display_name))
            .set("fromUserAvatar", json!(from.avatar))
            .set("status", json!(InviteStatus::Pending))
            .server_timestamp("timestamp");
        let mirror_id = UserInvite::mirror_id(room_id, to_user_id);

        if let Err(e) = upsert_document(self.store(), INVITES_COLLECTION, &mirror_id, mirror).await {
            warn!(
                room_id = %room_id,
                to_user_id = %to_user_id,
                error = %e,
                "Invite written to room but not to the invitee's list"
            );
            return Err(e.into());
        }

        info!(room_id = %room_id, to_user_id = %to_user_id, "Invite sent");
        Ok(SendInviteResult::Sent)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn accept_invite(
        &self,
        room_id: &str,
        user: &UserIdentity,
    ) -> Result<AcceptInviteResult, AppError> {
        let Some(room) = self.rooms.get_room(room_id).await? else {
            return Ok(AcceptInviteResult::RoomNotFound);
        };
        if room.status != RoomStatus::Waiting {
            return Ok(AcceptInviteResult::NotWaiting);
        }
        if room.has_player(&user.id) {
            debug!(room_id = %room_id, "Player already in room");
            return Ok(AcceptInviteResult::Accepted(room));
        }
        if room.is_full() {
            return Ok(AcceptInviteResult::RoomFull);
        }

        let mut update = RoomUpdate::new().add_player(user);
        if room.invites.contains_key(&user.id) {
            update = update.invite_status(&user.id, InviteStatus::Accepted);
        }
        self.rooms.update_room(room_id, update).await?;
        self.update_mirror_status(room_id, &user.id, InviteStatus::Accepted)
            .await?;

        let Some(room) = self.rooms.get_room(room_id).await? else {
            return Ok(AcceptInviteResult::RoomNotFound);
        };
        info!(room_id = %room_id, current_players = room.current_players, "Invite accepted");
        Ok(AcceptInviteResult::Accepted(room))
    }

    #[instrument(skip(self))]
    pub async fn decline_invite(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<DeclineInviteResult, AppError> {
        let Some(room) = self.rooms.get_room(room_id).await? else {
            return Ok(DeclineInviteResult::RoomNotFound);
        };

        if room.invites.contains_key(user_id) {
            self.rooms
                .update_room(
                    room_id,
                    RoomUpdate::new().invite_status(user_id, InviteStatus::Declined),
                )
                .await?;
        }
        self.update_mirror_status(room_id, user_id, InviteStatus::Declined)
            .await?;

        info!(room_id = %room_id, "Invite declined");
        Ok(DeclineInviteResult::Declined)
    }

    #[instrument(skip(self))]
    pub async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<LeaveRoomResult, AppError> {
        let Some(room) = self.rooms.get_room(room_id).await? else {
            return Ok(LeaveRoomResult::RoomNotFound);
        };
        if !room.has_player(user_id) {
            return Ok(LeaveRoomResult::PlayerNotInRoom);
        }

        // Nobody would be left, so the room goes instead of the player
        if room.players.len() <= 1 {
            self.rooms.delete_room(room_id).await?;
            info!(room_id = %room_id, "Last player left, room deleted");
            return Ok(LeaveRoomResult::RoomDeleted);
        }

        self.rooms
            .update_room(room_id, RoomUpdate::new().remove_player(user_id))
            .await?;
        info!(room_id = %room_id, remaining = room.players.len() - 1, "Player left room");
        Ok(LeaveRoomResult::Left)
    }

    /// Live query for `user_id`'s pending invites, newest first
    #[instrument(skip(self))]
    pub async fn watch_user_invites(&self, user_id: &str) -> Result<InviteWatch, AppError> {
        let query = Query::new()
            .where_eq("toUserId", json!(user_id))
            .where_eq("status", json!(InviteStatus::Pending))
            .order_by("timestamp", Direction::Descending);
        let subscription = self.store().query(INVITES_COLLECTION, query).await?;
        Ok(InviteWatch { subscription })
    }

    /// Invokes `on_change` with the full pending list on every change
    pub async fn subscribe_to_user_invites<F>(
        &self,
        user_id: &str,
        on_change: F,
    ) -> Result<SubscriptionHandle, AppError>
    where
        F: Fn(Vec<UserInvite>) + Send + 'static,
    {
        let mut watch = self.watch_user_invites(user_id).await?;
        let user_id = user_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(invites) = watch.next().await {
                on_change(invites);
            }
            debug!(user_id = %user_id, "Invite subscription ended");
        });
        Ok(SubscriptionHandle::new(task))
    }
}
