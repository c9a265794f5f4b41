// Public API
pub use handler::{
    invites_websocket_handler, room_websocket_handler, IgnoreMessageHandler,
    LifecycleMessageHandler,
};
pub use messages::{LifecyclePayload, MessageType, WebSocketMessage, WebSocketMessageMeta};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
