use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::logic::{self, TimeoutReason};
use super::service::GameService;
use crate::lifecycle::LifecycleState;
use crate::room::{EpochMillis, GameRoom, RoomStatus};
use crate::shared::AppError;

/// Latest snapshot of the watched room; `None` before the first delivery or after deletion
pub type RoomSnapshots = watch::Receiver<Option<GameRoom>>;

fn log_outcome(room_id: &str, player_id: &str, reason: TimeoutReason, result: Result<(), AppError>) {
    match result {
        Ok(()) => info!(room_id = %room_id, player_id = %player_id, reason = %reason, "Watchdog ended the game"),
        // Another client usually got there first
        Err(AppError::Rejected(e)) => {
            debug!(room_id = %room_id, player_id = %player_id, error = %e, "Watchdog transition refused")
        }
        Err(e) => warn!(room_id = %room_id, player_id = %player_id, error = %e, "Watchdog transition failed"),
    }
}

/// Ends the game if the current turn has run out, reported by `watcher_id`.
/// Returns whether a timeout was issued.
pub async fn check_turn_timeout(
    games: &GameService,
    room: &GameRoom,
    watcher_id: &str,
    now: EpochMillis,
) -> bool {
    let turn_timeout = games.turn_timeout();
    let Some(offender) = logic::expired_turn(room, now, turn_timeout) else {
        return false;
    };

    warn!(
        room_id = %room.id,
        offender = %offender,
        timeout_ms = turn_timeout.as_millis() as u64,
        "Turn timed out"
    );
    let result = games
        .end_game_due_to_timeout(&room.id, watcher_id, &offender, TimeoutReason::TurnTimeout, now)
        .await;
    log_outcome(&room.id, &offender, TimeoutReason::TurnTimeout, result);
    true
}

/// Periodically re-derives the elapsed turn time from the latest snapshot.
/// Every client watching the room runs one, so several may race to end the same game.
pub fn spawn_turn_watchdog(
    games: Arc<GameService>,
    room_id: String,
    local_user_id: String,
    snapshots: RoomSnapshots,
    check_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run_turn_watchdog(
        games,
        room_id,
        local_user_id,
        snapshots,
        check_interval,
    ))
}

#[instrument(skip(games, snapshots))]
async fn run_turn_watchdog(
    games: Arc<GameService>,
    room_id: String,
    local_user_id: String,
    snapshots: RoomSnapshots,
    check_interval: Duration,
) {
    debug!(
        turn_timeout_ms = games.turn_timeout().as_millis() as u64,
        check_interval_ms = check_interval.as_millis() as u64,
        "Starting turn watchdog"
    );

    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seen_room = false;

    loop {
        ticker.tick().await;

        let room = snapshots.borrow().clone();
        let Some(room) = room else {
            if seen_room {
                debug!("Room deleted, turn watchdog retiring");
                break;
            }
            continue;
        };
        seen_room = true;
        if room.status == RoomStatus::Finished {
            debug!("Room finished, turn watchdog retiring");
            break;
        }

        check_turn_timeout(&games, &room, &local_user_id, EpochMillis::now()).await;
    }
}

/// Ends the game on the local player's behalf when their client goes to the
/// background mid-turn. A killed process never gets here; the turn watchdog covers that.
pub fn spawn_abandonment_watchdog(
    games: Arc<GameService>,
    room_id: String,
    local_user_id: String,
    snapshots: RoomSnapshots,
    lifecycle: watch::Receiver<LifecycleState>,
) -> JoinHandle<()> {
    tokio::spawn(run_abandonment_watchdog(
        games,
        room_id,
        local_user_id,
        snapshots,
        lifecycle,
    ))
}

#[instrument(skip(games, snapshots, lifecycle))]
async fn run_abandonment_watchdog(
    games: Arc<GameService>,
    room_id: String,
    local_user_id: String,
    snapshots: RoomSnapshots,
    mut lifecycle: watch::Receiver<LifecycleState>,
) {
    while lifecycle.changed().await.is_ok() {
        let state = *lifecycle.borrow_and_update();
        if !state.is_away() {
            continue;
        }

        let room = snapshots.borrow().clone();
        let Some(room) = room else {
            continue;
        };
        if !room.is_players_turn(&local_user_id) {
            debug!(state = %state, "Client went away off-turn, nothing to do");
            continue;
        }

        info!(state = %state, "Client went away on its own turn");
        let result = games
            .end_game_due_to_timeout(
                &room_id,
                &local_user_id,
                &local_user_id,
                TimeoutReason::Left,
                EpochMillis::now(),
            )
            .await;
        log_outcome(&room_id, &local_user_id, TimeoutReason::Left, result);
    }
}
