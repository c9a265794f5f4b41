use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::GameConfig;
use crate::game::{
    logic, sample_wheel, spawn_abandonment_watchdog, spawn_turn_watchdog, GameService, PetSource,
    RoomSnapshots, TimeoutReason, WheelPet,
};
use crate::invite::{
    AcceptInviteResult, DeclineInviteResult, InviteFilter, InviteService, InviteWatch,
    LeaveRoomResult, SendInviteResult, UserInvite,
};
use crate::lifecycle::LifecycleSignal;
use crate::profile::ProfileStore;
use crate::room::{EpochMillis, GameRoom, RoomRepository, RoomUpdate};
use crate::session::UserIdentity;
use crate::shared::{AppError, SubscriptionHandle};
use crate::store::DocumentStore;

/// Turns a collaborator result into the caller-facing sentinel.
/// Rule rejections are routine; anything else means the store let us down.
fn absorb<T>(operation: &str, room_id: &str, result: Result<T, AppError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(AppError::Rejected(reason)) => {
            info!(operation, room_id = %room_id, reason = %reason, "Action rejected");
            None
        }
        Err(AppError::NotFound(what)) => {
            info!(operation, room_id = %room_id, missing = %what, "Action rejected, not found");
            None
        }
        Err(e) => {
            warn!(operation, room_id = %room_id, error = %e, "Action failed");
            None
        }
    }
}

fn refused(operation: &str, room_id: &str, outcome: &dyn std::fmt::Debug) -> bool {
    info!(operation, room_id = %room_id, outcome = ?outcome, "Action rejected");
    false
}

/// One client's live attachment to a room: the snapshot stream plus the
/// watchdogs and win-award reaction bound to it. Closing or dropping it stops them all.
pub struct RoomSession {
    room_id: String,
    snapshots: RoomSnapshots,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSession {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Most recent snapshot; `None` before the first delivery or after deletion
    pub fn latest(&self) -> Option<GameRoom> {
        self.snapshots.borrow().clone()
    }

    pub fn snapshots(&self) -> RoomSnapshots {
        self.snapshots.clone()
    }

    pub fn close(self) {
        debug!(room_id = %self.room_id, "Closing room session");
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Entry point for every room operation.
///
/// Collaborators are injected at construction. Every public operation absorbs
/// failures into `false` / `None` after logging them.
pub struct GameRoomCoordinator {
    rooms: Arc<RoomRepository>,
    invites: InviteService,
    games: Arc<GameService>,
    pets: Arc<dyn PetSource>,
    config: GameConfig,
}

impl GameRoomCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        profiles: Arc<dyn ProfileStore>,
        pets: Arc<dyn PetSource>,
        config: GameConfig,
    ) -> Self {
        let rooms = Arc::new(RoomRepository::new(store));
        let games = Arc::new(GameService::new(
            rooms.clone(),
            profiles,
            config.win_reward_points,
            config.turn_timeout,
        ));
        Self {
            invites: InviteService::new(rooms.clone()),
            rooms,
            games,
            pets,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn invite_filter(&self) -> InviteFilter {
        InviteFilter::new(self.config.invite_expiry)
    }

    // Rooms

    #[instrument(skip(self, host, wheel_pets), fields(host_id = %host.id))]
    pub async fn create_room(
        &self,
        host: &UserIdentity,
        wheel_pets: Vec<WheelPet>,
        max_players: u32,
    ) -> Option<String> {
        let result = self
            .rooms
            .create_room(host, wheel_pets, max_players, self.config.total_rounds)
            .await;
        absorb("create_room", "-", result)
    }

    /// Creates a room whose wheel is sampled from the pet source
    pub async fn create_room_from_catalog(
        &self,
        host: &UserIdentity,
        max_players: Option<u32>,
    ) -> Option<String> {
        let wheel = sample_wheel(&self.pets.wheel_candidates(), self.config.wheel_size);
        if wheel.is_empty() {
            warn!(host_id = %host.id, "No pets available for a new wheel");
            return None;
        }
        let max_players = max_players
            .unwrap_or(self.config.max_players)
            .max(logic::MIN_PLAYERS);
        self.create_room(host, wheel, max_players).await
    }

    pub async fn get_room(&self, room_id: &str) -> Option<GameRoom> {
        absorb("get_room", room_id, self.rooms.get_room(room_id).await).flatten()
    }

    pub async fn update_room(&self, room_id: &str, update: RoomUpdate) -> bool {
        absorb("update_room", room_id, self.rooms.update_room(room_id, update).await).is_some()
    }

    pub async fn delete_room(&self, room_id: &str) -> bool {
        absorb("delete_room", room_id, self.rooms.delete_room(room_id).await).is_some()
    }

    pub async fn subscribe_to_room<F>(&self, room_id: &str, on_change: F) -> Option<SubscriptionHandle>
    where
        F: Fn(Option<GameRoom>) + Send + 'static,
    {
        let result = self.rooms.subscribe_to_room(room_id, on_change).await;
        absorb("subscribe_to_room", room_id, result)
    }

    // Invites

    pub async fn send_invite(&self, room_id: &str, from: &UserIdentity, to_user_id: &str) -> bool {
        let result = self.invites.send_invite(room_id, from, to_user_id).await;
        match absorb("send_invite", room_id, result) {
            Some(SendInviteResult::Sent) => true,
            Some(other) => refused("send_invite", room_id, &other),
            None => false,
        }
    }

    pub async fn accept_invite(&self, room_id: &str, user: &UserIdentity) -> bool {
        let result = self.invites.accept_invite(room_id, user).await;
        match absorb("accept_invite", room_id, result) {
            Some(AcceptInviteResult::Accepted(_)) => true,
            Some(other) => refused("accept_invite", room_id, &other),
            None => false,
        }
    }

    pub async fn decline_invite(&self, room_id: &str, user_id: &str) -> bool {
        let result = self.invites.decline_invite(room_id, user_id).await;
        match absorb("decline_invite", room_id, result) {
            Some(DeclineInviteResult::Declined) => true,
            Some(other) => refused("decline_invite", room_id, &other),
            None => false,
        }
    }

    pub async fn leave_room(&self, room_id: &str, user_id: &str) -> bool {
        let result = self.invites.leave_room(room_id, user_id).await;
        match absorb("leave_room", room_id, result) {
            Some(LeaveRoomResult::Left) | Some(LeaveRoomResult::RoomDeleted) => true,
            Some(other) => refused("leave_room", room_id, &other),
            None => false,
        }
    }

    /// Delivers the full pending list on every change, unfiltered by age
    pub async fn subscribe_to_user_invites<F>(
        &self,
        user_id: &str,
        on_change: F,
    ) -> Option<SubscriptionHandle>
    where
        F: Fn(Vec<UserInvite>) + Send + 'static,
    {
        let result = self.invites.subscribe_to_user_invites(user_id, on_change).await;
        absorb("subscribe_to_user_invites", "-", result)
    }

    pub async fn watch_user_invites(&self, user_id: &str) -> Option<InviteWatch> {
        let result = self.invites.watch_user_invites(user_id).await;
        absorb("watch_user_invites", "-", result)
    }

    /// Current actionable invites for `user_id`
    pub async fn actionable_invites(&self, user_id: &str) -> Option<Vec<UserInvite>> {
        let mut watch = self.watch_user_invites(user_id).await?;
        let invites = watch.next().await?;
        Some(self.invite_filter().actionable(invites, EpochMillis::now()))
    }

    // Game

    pub async fn start_game(&self, room_id: &str, host_id: &str) -> bool {
        let result = self.games.start_game(room_id, host_id).await;
        absorb("start_game", room_id, result).is_some()
    }

    pub async fn begin_spin(&self, room_id: &str, user_id: &str) -> Option<WheelPet> {
        let result = self.games.begin_spin(room_id, user_id).await;
        absorb("begin_spin", room_id, result)
    }

    pub async fn record_spin(&self, room_id: &str, user_id: &str, spin: &WheelPet) -> bool {
        let result = self.games.record_spin(room_id, user_id, spin).await;
        absorb("record_spin", room_id, result).is_some()
    }

    /// Ends a playing game early. `reporter_id` must be in the room; a turn
    /// timeout must really have run out and a departure is only self-reported.
    pub async fn end_game_due_to_timeout(
        &self,
        room_id: &str,
        reporter_id: &str,
        offending_player_id: &str,
        reason: TimeoutReason,
    ) -> bool {
        let result = self
            .games
            .end_game_due_to_timeout(
                room_id,
                reporter_id,
                offending_player_id,
                reason,
                EpochMillis::now(),
            )
            .await;
        absorb("end_game_due_to_timeout", room_id, result).is_some()
    }

    pub async fn award_game_win(&self, room_id: &str, user_id: &str) -> bool {
        let result = self.games.award_game_win(room_id, user_id).await;
        absorb("award_game_win", room_id, result).is_some()
    }

    // Sessions

    /// Opens `local_user`'s live view of a room and starts its watchdogs.
    /// `on_change` sees every snapshot, `None` once the room is deleted.
    #[instrument(skip(self, lifecycle, on_change))]
    pub async fn open_room_session<F>(
        &self,
        room_id: &str,
        local_user_id: &str,
        lifecycle: &LifecycleSignal,
        on_change: F,
    ) -> Option<RoomSession>
    where
        F: Fn(Option<GameRoom>) + Send + 'static,
    {
        let existing = absorb("open_room_session", room_id, self.rooms.get_room(room_id).await)?;
        if existing.is_none() {
            info!(room_id = %room_id, "Room not found, no session opened");
            return None;
        }
        let mut room_watch = absorb(
            "open_room_session",
            room_id,
            self.rooms.watch_room(room_id).await,
        )?;
        let (sender, snapshots) = watch::channel(None);

        let games = self.games.clone();
        let local = local_user_id.to_string();
        let feed = tokio::spawn(async move {
            while let Some(snapshot) = room_watch.next().await {
                sender.send_replace(snapshot.clone());
                let award_due = snapshot
                    .as_ref()
                    .filter(|room| logic::award_pending(room, &local))
                    .map(|room| room.id.clone());
                on_change(snapshot);

                if let Some(room_id) = award_due {
                    let result = games.award_game_win(&room_id, &local).await;
                    absorb("award_game_win", &room_id, result);
                }
            }
        });

        let turn_watchdog = spawn_turn_watchdog(
            self.games.clone(),
            room_id.to_string(),
            local_user_id.to_string(),
            snapshots.clone(),
            self.config.watchdog_interval,
        );
        let abandonment_watchdog = spawn_abandonment_watchdog(
            self.games.clone(),
            room_id.to_string(),
            local_user_id.to_string(),
            snapshots.clone(),
            lifecycle.subscribe(),
        );

        info!(room_id = %room_id, user_id = %local_user_id, "Room session opened");
        Some(RoomSession {
            room_id: room_id.to_string(),
            snapshots,
            tasks: vec![feed, turn_watchdog, abandonment_watchdog],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PetCatalog;
    use crate::profile::DocumentProfileStore;
    use crate::room::RoomStatus;
    use crate::shared::test_utils::identity;
    use crate::store::InMemoryDocumentStore;

    fn coordinator() -> GameRoomCoordinator {
        let store = Arc::new(InMemoryDocumentStore::new());
        GameRoomCoordinator::new(
            store.clone(),
            Arc::new(DocumentProfileStore::new(store)),
            Arc::new(PetCatalog::builtin()),
            GameConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_room_from_catalog_samples_wheel() {
        let coordinator = coordinator();
        let room_id = coordinator
            .create_room_from_catalog(&identity("host", "Hana"), None)
            .await
            .unwrap();

        let room = coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.wheel_pets.len(), 10);
        assert_eq!(room.max_players, 2);
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn test_failures_become_sentinels() {
        let coordinator = coordinator();
        assert!(coordinator.get_room("missing").await.is_none());
        assert!(!coordinator.start_game("missing", "host").await);
        assert!(!coordinator.accept_invite("missing", &identity("bob", "Bob")).await);
        assert!(!coordinator.update_room("missing", RoomUpdate::new().status(RoomStatus::Playing)).await);
        assert!(coordinator.begin_spin("missing", "host").await.is_none());
    }

    #[tokio::test]
    async fn test_session_tracks_latest_snapshot() {
        let coordinator = coordinator();
        let room_id = coordinator
            .create_room_from_catalog(&identity("host", "Hana"), None)
            .await
            .unwrap();

        let lifecycle = LifecycleSignal::new();
        let session = coordinator
            .open_room_session(&room_id, "host", &lifecycle, |_| {})
            .await
            .unwrap();

        assert!(coordinator.accept_invite(&room_id, &identity("bob", "Bob")).await);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        assert_eq!(session.latest().unwrap().current_players, 2);
        session.close();
    }
}
