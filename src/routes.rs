use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::shared::AppState;
use crate::{invite, room, session, websockets};

/// Every HTTP and WebSocket route the server exposes.
/// Room and invite actions sit behind the bearer-token middleware; sockets authenticate themselves.
pub fn app_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/rooms", post(room::create_room))
        .route("/rooms/:room_id", get(room::get_room))
        .route("/rooms/:room_id/invites", post(invite::send_invite))
        .route("/rooms/:room_id/accept", post(invite::accept_invite))
        .route("/rooms/:room_id/decline", post(invite::decline_invite))
        .route("/rooms/:room_id/leave", post(invite::leave_room))
        .route("/rooms/:room_id/start", post(room::start_game))
        .route("/rooms/:room_id/spin/begin", post(room::begin_spin))
        .route("/rooms/:room_id/spin", post(room::record_spin))
        .route("/rooms/:room_id/timeout", post(room::report_timeout))
        .route("/invites", get(invite::list_invites))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::jwt_auth,
        ));

    Router::new()
        .route("/session", post(session::create_session))
        .route("/ws/rooms/:room_id", get(websockets::room_websocket_handler))
        .route("/ws/invites", get(websockets::invites_websocket_handler))
        .merge(authenticated)
        .with_state(state)
}
