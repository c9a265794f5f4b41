// Library crate for the pet wheel game server
// This file exposes the public API for integration tests

pub mod config;
pub mod coordinator;
pub mod game;
pub mod invite;
pub mod lifecycle;
pub mod profile;
pub mod room;
pub mod routes;
pub mod session;
pub mod shared;
pub mod store;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::{AppConfig, GameConfig};
pub use coordinator::{GameRoomCoordinator, RoomSession};
pub use game::{GameError, PetCatalog, PetSource, TimeoutReason, WheelPet};
pub use lifecycle::{LifecycleSignal, LifecycleState};
pub use profile::{DocumentProfileStore, ProfileStore};
pub use room::{GameRoom, RoomRepository, RoomStatus, RoomUpdate};
pub use routes::app_router;
pub use session::{TokenConfig, UserIdentity};
pub use shared::{AppError, AppState, SubscriptionHandle};
pub use store::{DocumentStore, InMemoryDocumentStore};
pub use websockets::{MessageHandler, MessageType, WebSocketMessage};
