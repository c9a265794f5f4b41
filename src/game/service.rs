use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::logic::{self, GameOutcome, TimeoutReason};
use super::wheel::{spin_wheel, WheelPet};
use crate::profile::ProfileStore;
use crate::room::{EpochMillis, GameRoom, RoomRepository};
use crate::shared::AppError;

#[derive(Debug, Clone)]
pub struct SpinResult {
    pub next_player: Option<String>,
    pub outcome: Option<GameOutcome>,
}

/// Runs game transitions as read, plan, merge against the room document.
/// Nothing here arbitrates between concurrent writers.
pub struct GameService {
    rooms: Arc<RoomRepository>,
    profiles: Arc<dyn ProfileStore>,
    win_reward_points: u64,
    turn_timeout: Duration,
}

impl GameService {
    pub fn new(
        rooms: Arc<RoomRepository>,
        profiles: Arc<dyn ProfileStore>,
        win_reward_points: u64,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            rooms,
            profiles,
            win_reward_points,
            turn_timeout,
        }
    }

    pub fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }

    async fn load(&self, room_id: &str) -> Result<GameRoom, AppError> {
        self.rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room not found: {}", room_id)))
    }

    /// Host moves the room from waiting to playing
    #[instrument(skip(self))]
    pub async fn start_game(&self, room_id: &str, host_id: &str) -> Result<(), AppError> {
        let room = self.load(room_id).await?;
        let update = logic::plan_start(&room, host_id, EpochMillis::now())?;
        self.rooms.update_room(room_id, update).await?;

        info!(
            room_id = %room_id,
            player_count = room.current_players,
            total_rounds = room.game_data.total_rounds,
            "Game started"
        );
        Ok(())
    }

    /// Flags the wheel as spinning and picks where it lands
    #[instrument(skip(self))]
    pub async fn begin_spin(&self, room_id: &str, user_id: &str) -> Result<WheelPet, AppError> {
        let room = self.load(room_id).await?;
        let update = logic::plan_begin_spin(&room, user_id)?;
        let landed = spin_wheel(&room.wheel_pets).ok_or(AppError::Internal)?;

        self.rooms.update_room(room_id, update).await?;
        info!(room_id = %room_id, user_id = %user_id, pet = %landed.name, "Wheel spinning");
        Ok(landed)
    }

    #[instrument(skip(self, spin), fields(pet = %spin.name, value = spin.value))]
    pub async fn record_spin(
        &self,
        room_id: &str,
        user_id: &str,
        spin: &WheelPet,
    ) -> Result<SpinResult, AppError> {
        let room = self.load(room_id).await?;
        let plan = logic::plan_record_spin(&room, user_id, spin, EpochMillis::now())?;
        self.rooms.update_room(room_id, plan.update).await?;

        match &plan.outcome {
            Some(GameOutcome::Winner(winner)) => {
                info!(room_id = %room_id, winner = %winner.player_id, score = winner.score, "Game finished");
            }
            Some(GameOutcome::Draw) => info!(room_id = %room_id, "Game finished in a draw"),
            None => info!(
                room_id = %room_id,
                round = plan.record.round,
                next_player = ?plan.next_player,
                "Spin recorded"
            ),
        }

        Ok(SpinResult {
            next_player: plan.next_player,
            outcome: plan.outcome,
        })
    }

    /// `reporter_id` is the player whose client noticed the timeout or departure
    #[instrument(skip(self, now))]
    pub async fn end_game_due_to_timeout(
        &self,
        room_id: &str,
        reporter_id: &str,
        offending_player_id: &str,
        reason: TimeoutReason,
        now: EpochMillis,
    ) -> Result<(), AppError> {
        let room = self.load(room_id).await?;
        let update = logic::plan_timeout(
            &room,
            reporter_id,
            offending_player_id,
            reason,
            now,
            self.turn_timeout,
        )?;
        self.rooms.update_room(room_id, update).await?;

        warn!(room_id = %room_id, offending_player_id = %offending_player_id, reason = %reason, "Game ended early");
        Ok(())
    }

    /// Pays out the winner once; the room's `winAwarded` flag is claimed before the profile write
    #[instrument(skip(self))]
    pub async fn award_game_win(&self, room_id: &str, user_id: &str) -> Result<(), AppError> {
        let room = self.load(room_id).await?;
        let update = logic::plan_award(&room, user_id)?;
        self.rooms.update_room(room_id, update).await?;

        self.profiles
            .award_points(user_id, self.win_reward_points)
            .await?;
        self.profiles.increment_win_count(user_id).await?;

        info!(room_id = %room_id, user_id = %user_id, points = self.win_reward_points, "Win awarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameError;
    use crate::profile::{DocumentProfileStore, USERS_COLLECTION};
    use crate::room::{RoomStatus, RoomUpdate};
    use crate::shared::test_utils::{identity, wheel};
    use crate::store::{DocumentStore, InMemoryDocumentStore};
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryDocumentStore>,
        rooms: Arc<RoomRepository>,
        games: GameService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::new());
        let rooms = Arc::new(RoomRepository::new(store.clone()));
        let profiles = Arc::new(DocumentProfileStore::new(store.clone()));
        let games = GameService::new(rooms.clone(), profiles, 100, Duration::from_secs(60));
        Fixture { store, rooms, games }
    }

    async fn two_player_room(fixture: &Fixture, total_rounds: u32) -> String {
        let room_id = fixture
            .rooms
            .create_room(&identity("host", "Hana"), wheel(&WHEEL), 2, total_rounds)
            .await
            .unwrap();
        fixture
            .rooms
            .update_room(&room_id, RoomUpdate::new().add_player(&identity("guest", "Gus")))
            .await
            .unwrap();
        room_id
    }

    const WHEEL: [f64; 2] = [500.0, 100.0];

    fn wheel_pet(index: usize) -> WheelPet {
        wheel(&WHEEL)[index].clone()
    }

    #[tokio::test]
    async fn test_missing_room_is_not_found() {
        let result = fixture().games.start_game("nope", "host").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_game_error() {
        let fixture = fixture();
        let room_id = two_player_room(&fixture, 1).await;

        let result = fixture.games.start_game(&room_id, "guest").await;
        assert!(matches!(result, Err(AppError::Rejected(GameError::NotHost))));
    }

    #[tokio::test]
    async fn test_begin_spin_lands_on_room_wheel() {
        let fixture = fixture();
        let room_id = two_player_room(&fixture, 1).await;
        fixture.games.start_game(&room_id, "host").await.unwrap();

        let landed = fixture.games.begin_spin(&room_id, "host").await.unwrap();
        let room = fixture.rooms.get_room(&room_id).await.unwrap().unwrap();
        assert!(room.wheel_pets.contains(&landed));
        assert!(room.game_data.is_spinning);
    }

    #[tokio::test]
    async fn test_single_round_game_awards_winner_once() {
        let fixture = fixture();
        let room_id = two_player_room(&fixture, 1).await;
        fixture.games.start_game(&room_id, "host").await.unwrap();

        fixture.games.record_spin(&room_id, "host", &wheel_pet(0)).await.unwrap();
        let result = fixture.games.record_spin(&room_id, "guest", &wheel_pet(1)).await.unwrap();
        assert!(matches!(result.outcome, Some(GameOutcome::Winner(_))));

        let room = fixture.rooms.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Finished);

        fixture.games.award_game_win(&room_id, "host").await.unwrap();
        let again = fixture.games.award_game_win(&room_id, "host").await;
        assert!(matches!(again, Err(AppError::Rejected(GameError::WinAlreadyAwarded))));

        let profile = fixture
            .store
            .get_document(USERS_COLLECTION, "host")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile["rewardPoints"], json!(100));
        assert_eq!(profile["gameWins"], json!(1));
    }

    #[tokio::test]
    async fn test_off_wheel_spin_is_rejected() {
        let fixture = fixture();
        let room_id = two_player_room(&fixture, 1).await;
        fixture.games.start_game(&room_id, "host").await.unwrap();

        let forged = WheelPet {
            name: "NotOnWheel".to_string(),
            image: "forged.png".to_string(),
            value: 1e12,
        };
        let result = fixture.games.record_spin(&room_id, "host", &forged).await;
        assert!(matches!(result, Err(AppError::Rejected(GameError::InvalidSpin(_)))));

        let room = fixture.rooms.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(room.game_data.score_of("host"), 0.0);
        assert!(room.game_data.spin_history.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_checks_the_turn_clock() {
        let fixture = fixture();
        let room_id = two_player_room(&fixture, 1).await;
        fixture.games.start_game(&room_id, "host").await.unwrap();
        let started = fixture
            .rooms
            .get_room(&room_id)
            .await
            .unwrap()
            .unwrap()
            .game_data
            .turn_start_time
            .unwrap();

        let early = fixture
            .games
            .end_game_due_to_timeout(&room_id, "guest", "host", TimeoutReason::TurnTimeout, started)
            .await;
        assert!(matches!(early, Err(AppError::Rejected(GameError::TurnNotExpired(_)))));

        let late = EpochMillis(started.as_millis() + 60_001);
        let stranger = fixture
            .games
            .end_game_due_to_timeout(&room_id, "mallory", "host", TimeoutReason::TurnTimeout, late)
            .await;
        assert!(matches!(stranger, Err(AppError::Rejected(GameError::NotInRoom(_)))));

        fixture
            .games
            .end_game_due_to_timeout(&room_id, "guest", "host", TimeoutReason::TurnTimeout, late)
            .await
            .unwrap();
        let room = fixture.rooms.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.game_data.timed_out_player_id.as_deref(), Some("host"));
    }
}
