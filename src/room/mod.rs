// Public API - what other modules can use
pub use handlers::{begin_spin, create_room, get_room, record_spin, report_timeout, start_game};
pub use models::{
    GameData, GameRoom, InviteEntry, InviteStatus, PlayerEntry, RoomStatus, SpinRecord, Winner,
    ROOMS_COLLECTION,
};
pub use repository::{decode_room, RoomRepository, RoomUpdate, RoomWatch};
pub use timestamp::EpochMillis;
pub use types::{ActionResponse, RoomCreateRequest, RoomCreatedResponse, TimeoutRequest};

pub(crate) use handlers::action;

// Internal modules
mod handlers;
mod models;
mod repository;
mod timestamp;
mod types;
