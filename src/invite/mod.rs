// Public API - what other modules can use
pub use handlers::{accept_invite, decline_invite, leave_room, list_invites, send_invite};
pub use models::{InviteFilter, UserInvite, INVITES_COLLECTION};
pub use service::{
    AcceptInviteResult, DeclineInviteResult, InviteService, InviteWatch, LeaveRoomResult,
    SendInviteResult,
};

// Internal modules
mod handlers;
mod models;
mod service;
mod types;
