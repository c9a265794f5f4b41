// Transition rules for a room's gameData. Everything here is pure: each plan reads a
// snapshot and returns the partial update to merge, or the reason the move is refused.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use super::wheel::WheelPet;
use crate::room::{EpochMillis, GameRoom, RoomStatus, RoomUpdate, SpinRecord, Winner};

/// Smallest room that can start a game
pub const MIN_PLAYERS: u32 = 2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Room is {actual}, expected {expected}")]
    WrongStatus {
        expected: RoomStatus,
        actual: RoomStatus,
    },
    #[error("Only the host can start the game")]
    NotHost,
    #[error("Need at least {required} players, room has {current}")]
    NotEnoughPlayers { current: u32, required: u32 },
    #[error("It is not {0}'s turn")]
    NotPlayersTurn(String),
    #[error("A spin is already in progress")]
    AlreadySpinning,
    #[error("Invalid spin: {0}")]
    InvalidSpin(String),
    #[error("No players in turn order")]
    NoPlayers,
    #[error("{0} did not win this game")]
    NotWinner(String),
    #[error("Win already awarded")]
    WinAlreadyAwarded,
    #[error("{0} is not a player in this room")]
    NotInRoom(String),
    #[error("{0}'s turn has not run out")]
    TurnNotExpired(String),
    #[error("Only {0} can report leaving the game")]
    NotOffender(String),
}

/// Why a game ended before its last round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TimeoutReason {
    #[serde(rename = "timeout")]
    #[strum(serialize = "timeout")]
    TurnTimeout,
    #[serde(rename = "left")]
    #[strum(serialize = "left")]
    Left,
}

impl TimeoutReason {
    /// Human-readable reason stored on the room
    pub fn describe(self, player_name: &str) -> String {
        match self {
            TimeoutReason::TurnTimeout => format!("{} ran out of time", player_name),
            TimeoutReason::Left => format!("{} left the game", player_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameOutcome {
    Winner(Winner),
    Draw,
}

/// Result of resolving one spin
#[derive(Debug, Clone)]
pub struct SpinPlan {
    pub update: RoomUpdate,
    pub record: SpinRecord,
    pub next_player: Option<String>,
    pub outcome: Option<GameOutcome>,
}

fn require_status(room: &GameRoom, expected: RoomStatus) -> Result<(), GameError> {
    if room.status != expected {
        return Err(GameError::WrongStatus {
            expected,
            actual: room.status,
        });
    }
    Ok(())
}

fn require_turn(room: &GameRoom, user_id: &str) -> Result<(), GameError> {
    require_status(room, RoomStatus::Playing)?;
    match room.current_player() {
        None => Err(GameError::NoPlayers),
        Some(current) if current == user_id => Ok(()),
        Some(_) => Err(GameError::NotPlayersTurn(user_id.to_string())),
    }
}

/// Highest score in turn order wins; equal top scores are a draw
pub fn determine_outcome(
    player_order: &[String],
    scores: &HashMap<String, f64>,
) -> Option<GameOutcome> {
    let mut best: Option<(&String, f64)> = None;
    let mut tied = false;

    for player_id in player_order {
        let score = scores.get(player_id).copied().unwrap_or(0.0);
        match best {
            Some((_, top)) if score < top => {}
            Some((_, top)) if score == top => tied = true,
            _ => {
                best = Some((player_id, score));
                tied = false;
            }
        }
    }

    let (player_id, score) = best?;
    if tied {
        return Some(GameOutcome::Draw);
    }
    Some(GameOutcome::Winner(Winner {
        player_id: player_id.clone(),
        score,
    }))
}

/// waiting -> playing
pub fn plan_start(room: &GameRoom, caller_id: &str, now: EpochMillis) -> Result<RoomUpdate, GameError> {
    require_status(room, RoomStatus::Waiting)?;
    if !room.is_host(caller_id) {
        return Err(GameError::NotHost);
    }
    if room.current_players < MIN_PLAYERS {
        return Err(GameError::NotEnoughPlayers {
            current: room.current_players,
            required: MIN_PLAYERS,
        });
    }

    let player_order = room.join_order();
    if player_order.is_empty() {
        return Err(GameError::NoPlayers);
    }
    let scores: HashMap<String, f64> = player_order
        .iter()
        .map(|player_id| (player_id.clone(), 0.0))
        .collect();

    Ok(RoomUpdate::new()
        .status(RoomStatus::Playing)
        .player_order(&player_order)
        .current_turn_index(0)
        .current_round(1)
        .scores(&scores)
        .spin_history(&[])
        .is_spinning(false)
        .turn_start_time(now)
        .winner(None)
        .is_draw(false)
        .timeout_reason(None)
        .timed_out_player_id(None)
        .win_awarded(false))
}

/// Marks the wheel as spinning for the current player
pub fn plan_begin_spin(room: &GameRoom, user_id: &str) -> Result<RoomUpdate, GameError> {
    require_turn(room, user_id)?;
    if room.game_data.is_spinning {
        return Err(GameError::AlreadySpinning);
    }
    if room.wheel_pets.is_empty() {
        return Err(GameError::InvalidSpin("wheel has no pets".to_string()));
    }
    Ok(RoomUpdate::new().is_spinning(true))
}

/// Scores a landed spin, advances the turn and ends the game after the last round
pub fn plan_record_spin(
    room: &GameRoom,
    user_id: &str,
    spin: &WheelPet,
    now: EpochMillis,
) -> Result<SpinPlan, GameError> {
    require_turn(room, user_id)?;
    if !spin.value.is_finite() || spin.value < 0.0 {
        return Err(GameError::InvalidSpin(format!(
            "pet value {} is not a non-negative number",
            spin.value
        )));
    }
    let on_wheel = room
        .wheel_pets
        .iter()
        .any(|pet| pet.name == spin.name && pet.value == spin.value);
    if !on_wheel {
        return Err(GameError::InvalidSpin(format!(
            "{} ({}) is not on this room's wheel",
            spin.name, spin.value
        )));
    }

    let game = &room.game_data;
    let player_count = game.player_order.len();

    let record = SpinRecord {
        round: game.current_round,
        player_id: user_id.to_string(),
        pet_name: spin.name.clone(),
        pet_value: spin.value,
        pet_image: spin.image.clone(),
    };
    let mut history = game.spin_history.clone();
    history.push(record.clone());

    let new_score = game.score_of(user_id) + spin.value;
    let next_index = (game.current_turn_index + 1) % player_count;
    let next_round = if next_index == 0 {
        game.current_round + 1
    } else {
        game.current_round
    };

    let mut update = RoomUpdate::new()
        .score(user_id, new_score)
        .spin_history(&history)
        .current_turn_index(next_index)
        .current_round(next_round)
        .is_spinning(false)
        .turn_start_time(now);

    if next_round <= game.total_rounds {
        return Ok(SpinPlan {
            update,
            record,
            next_player: game.player_order.get(next_index).cloned(),
            outcome: None,
        });
    }

    let mut final_scores = game.scores.clone();
    final_scores.insert(user_id.to_string(), new_score);
    let outcome = determine_outcome(&game.player_order, &final_scores);

    update = update.status(RoomStatus::Finished);
    update = match &outcome {
        Some(GameOutcome::Winner(winner)) => update.winner(Some(winner)).is_draw(false),
        Some(GameOutcome::Draw) | None => update.winner(None).is_draw(true),
    };

    Ok(SpinPlan {
        update,
        record,
        next_player: None,
        outcome,
    })
}

/// playing -> finished without a winner.
///
/// `reporter_id` must be in the room. A turn timeout only holds once
/// `expired_turn` names the offender; leaving can only be reported by the
/// player who left.
pub fn plan_timeout(
    room: &GameRoom,
    reporter_id: &str,
    offending_player_id: &str,
    reason: TimeoutReason,
    now: EpochMillis,
    turn_timeout: Duration,
) -> Result<RoomUpdate, GameError> {
    if !room.players.contains_key(reporter_id) {
        return Err(GameError::NotInRoom(reporter_id.to_string()));
    }
    require_turn(room, offending_player_id)?;
    match reason {
        TimeoutReason::TurnTimeout => {
            if expired_turn(room, now, turn_timeout).as_deref() != Some(offending_player_id) {
                return Err(GameError::TurnNotExpired(offending_player_id.to_string()));
            }
        }
        TimeoutReason::Left => {
            if reporter_id != offending_player_id {
                return Err(GameError::NotOffender(offending_player_id.to_string()));
            }
        }
    }

    let description = reason.describe(room.player_name(offending_player_id));

    Ok(RoomUpdate::new()
        .status(RoomStatus::Finished)
        .timeout_reason(Some(&description))
        .timed_out_player_id(Some(offending_player_id))
        .is_spinning(false)
        .winner(None))
}

/// Claims the win reward for a finished game, at most once per room
pub fn plan_award(room: &GameRoom, user_id: &str) -> Result<RoomUpdate, GameError> {
    require_status(room, RoomStatus::Finished)?;
    match &room.game_data.winner {
        Some(winner) if winner.player_id == user_id => {}
        _ => return Err(GameError::NotWinner(user_id.to_string())),
    }
    if room.game_data.win_awarded {
        return Err(GameError::WinAlreadyAwarded);
    }
    Ok(RoomUpdate::new().win_awarded(true))
}

/// The player whose turn has run past `turn_timeout`, if any.
///
/// Paused while a spin is in flight. A client that dies between `begin_spin`
/// and `record_spin` leaves `isSpinning` set, and nothing here will ever end
/// that game, so the room stays `playing`.
pub fn expired_turn(room: &GameRoom, now: EpochMillis, turn_timeout: Duration) -> Option<String> {
    if room.status != RoomStatus::Playing || room.game_data.is_spinning {
        return None;
    }
    let started = room.game_data.turn_start_time?;
    if !now.has_elapsed(started, turn_timeout) {
        return None;
    }
    room.current_player().map(str::to_string)
}

/// True when a finished room names `user_id` as an unpaid winner
pub fn award_pending(room: &GameRoom, user_id: &str) -> bool {
    plan_award(room, user_id).is_ok()
}
