use axum::{extract::State, Json};
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{CreateSessionRequest, SessionResponse, UserIdentity};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new session
///
/// POST /session
/// Issues a fresh user id and a JWT carrying the given display name
#[instrument(name = "create_session", skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let display_name = request.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::BadRequest(
            "Display name cannot be empty".to_string(),
        ));
    }

    let identity = UserIdentity {
        id: Uuid::new_v4().to_string(),
        display_name: display_name.to_string(),
        avatar: request.avatar,
    };
    let token = state.token_config.create_token(&identity)?;

    info!(user_id = %identity.id, "Session created successfully");

    Ok(Json(SessionResponse {
        token,
        user_id: identity.id,
        display_name: identity.display_name,
    }))
}
