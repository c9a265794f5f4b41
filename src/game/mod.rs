// Public API
pub use logic::{
    determine_outcome, expired_turn, plan_award, plan_begin_spin, plan_record_spin, plan_start,
    plan_timeout, GameError, GameOutcome, SpinPlan, TimeoutReason, MIN_PLAYERS,
};
pub use service::{GameService, SpinResult};
pub use watchdog::{check_turn_timeout, spawn_abandonment_watchdog, spawn_turn_watchdog, RoomSnapshots};
pub use wheel::{sample_wheel, spin_wheel, PetCatalog, PetSource, WheelPet};

// Internal modules
pub mod logic;
mod service;
mod watchdog;
mod wheel;
