use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::{info, instrument};

use super::types::{InviteListResponse, SendInviteRequest};
use crate::room::{action, ActionResponse};
use crate::session::UserIdentity;
use crate::shared::{AppError, AppState};

/// HTTP handler for inviting a user
///
/// POST /rooms/:room_id/invites
#[instrument(name = "send_invite", skip(state, user, request), fields(user_id = %user.id))]
pub async fn send_invite(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
    Json(request): Json<SendInviteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    if request.to_user_id.trim().is_empty() || request.to_user_id == user.id {
        return Err(AppError::BadRequest("Invalid invitee".to_string()));
    }
    action(
        state
            .coordinator
            .send_invite(&room_id, &user, &request.to_user_id)
            .await,
    )
}

/// POST /rooms/:room_id/accept
#[instrument(name = "accept_invite", skip(state, user), fields(user_id = %user.id))]
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    action(state.coordinator.accept_invite(&room_id, &user).await)
}

/// POST /rooms/:room_id/decline
#[instrument(name = "decline_invite", skip(state, user), fields(user_id = %user.id))]
pub async fn decline_invite(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    action(state.coordinator.decline_invite(&room_id, &user.id).await)
}

/// POST /rooms/:room_id/leave
#[instrument(name = "leave_room", skip(state, user), fields(user_id = %user.id))]
pub async fn leave_room(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    action(state.coordinator.leave_room(&room_id, &user.id).await)
}

/// GET /invites
/// Pending invites for the caller that have not expired yet, newest first
#[instrument(name = "list_invites", skip(state, user), fields(user_id = %user.id))]
pub async fn list_invites(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> Result<Json<InviteListResponse>, AppError> {
    let invites = state
        .coordinator
        .actionable_invites(&user.id)
        .await
        .ok_or(AppError::ActionFailed)?;

    info!(invite_count = invites.len(), "Invites listed");
    Ok(Json(InviteListResponse { invites }))
}
