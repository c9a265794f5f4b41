use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::{info, instrument};

use super::models::GameRoom;
use super::types::{ActionResponse, RoomCreateRequest, RoomCreatedResponse, TimeoutRequest};
use crate::game::WheelPet;
use crate::session::UserIdentity;
use crate::shared::{AppError, AppState};

/// Maps the coordinator's boolean result onto the generic action response
pub(crate) fn action(succeeded: bool) -> Result<Json<ActionResponse>, AppError> {
    if succeeded {
        Ok(Json(ActionResponse::ok()))
    } else {
        Err(AppError::ActionFailed)
    }
}

/// HTTP handler for creating a new room
///
/// POST /rooms
/// Samples a wheel from the pet catalog; the caller becomes host
#[instrument(name = "create_room", skip(state, user, request), fields(user_id = %user.id))]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    request: Option<Json<RoomCreateRequest>>,
) -> Result<Json<RoomCreatedResponse>, AppError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let room_id = state
        .coordinator
        .create_room_from_catalog(&user, request.max_players)
        .await
        .ok_or(AppError::ActionFailed)?;

    info!(room_id = %room_id, "Room created successfully");
    Ok(Json(RoomCreatedResponse { room_id }))
}

/// GET /rooms/:room_id
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<GameRoom>, AppError> {
    state
        .coordinator
        .get_room(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room not found: {}", room_id)))
}

/// POST /rooms/:room_id/start
#[instrument(name = "start_game", skip(state, user), fields(user_id = %user.id))]
pub async fn start_game(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    action(state.coordinator.start_game(&room_id, &user.id).await)
}

/// POST /rooms/:room_id/spin/begin
/// Returns the pet the wheel will land on
#[instrument(name = "begin_spin", skip(state, user), fields(user_id = %user.id))]
pub async fn begin_spin(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
) -> Result<Json<WheelPet>, AppError> {
    state
        .coordinator
        .begin_spin(&room_id, &user.id)
        .await
        .map(Json)
        .ok_or(AppError::ActionFailed)
}

/// POST /rooms/:room_id/spin
#[instrument(name = "record_spin", skip(state, user, spin), fields(user_id = %user.id))]
pub async fn record_spin(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
    Json(spin): Json<WheelPet>,
) -> Result<Json<ActionResponse>, AppError> {
    action(state.coordinator.record_spin(&room_id, &user.id, &spin).await)
}

/// POST /rooms/:room_id/timeout
/// Any player in the room may report an expired turn; only the leaver reports leaving
#[instrument(name = "report_timeout", skip(state, user, request), fields(user_id = %user.id))]
pub async fn report_timeout(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(room_id): Path<String>,
    Json(request): Json<TimeoutRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    action(
        state
            .coordinator
            .end_game_due_to_timeout(
                &room_id,
                &user.id,
                &request.offending_player_id,
                request.reason,
            )
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::room::RoomStatus;
    use crate::shared::test_utils::{identity, AppStateBuilder};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    fn app(state: AppState, user: UserIdentity) -> Router {
        Router::new()
            .route("/rooms", post(create_room))
            .route("/rooms/:room_id", get(get_room))
            .route("/rooms/:room_id/start", post(start_game))
            .route("/rooms/:room_id/spin/begin", post(begin_spin))
            .route("/rooms/:room_id/spin", post(record_spin))
            .route("/rooms/:room_id/timeout", post(report_timeout))
            .layer(Extension(user))
            .with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_room() {
        let state = AppStateBuilder::new().build();
        let host = identity("host", "Hana");

        let response = app(state.clone(), host.clone())
            .oneshot(post_json("/rooms", r#"{"maxPlayers": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let room_id = body_json(response).await["roomId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app(state, host)
            .oneshot(
                Request::builder()
                    .uri(format!("/rooms/{}", room_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let room = body_json(response).await;
        assert_eq!(room["status"], "waiting");
        assert_eq!(room["maxPlayers"], 3);
        assert_eq!(room["currentPlayers"], 1);
        assert_eq!(room["wheelPets"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_create_room_without_body_uses_defaults() {
        let state = AppStateBuilder::new().build();
        let response = app(state.clone(), identity("host", "Hana"))
            .oneshot(Request::builder().method("POST").uri("/rooms").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let room_id = body_json(response).await["roomId"].as_str().unwrap().to_string();
        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.max_players, 2);
    }

    #[tokio::test]
    async fn test_get_unknown_room_is_not_found() {
        let state = AppStateBuilder::new().build();
        let response = app(state, identity("host", "Hana"))
            .oneshot(Request::builder().uri("/rooms/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejected_action_is_generic_conflict() {
        let state = AppStateBuilder::new().build();
        let host = identity("host", "Hana");
        let room_id = state
            .coordinator
            .create_room_from_catalog(&host, None)
            .await
            .unwrap();

        // Alone in the room, so the game cannot start
        let response = app(state, host)
            .oneshot(post_json(&format!("/rooms/{}/start", room_id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await["error"],
            "Action could not be completed"
        );
    }

    #[tokio::test]
    async fn test_spin_flow_over_http() {
        let state = AppStateBuilder::new().build();
        let host = identity("host", "Hana");
        let room_id = state
            .coordinator
            .create_room_from_catalog(&host, None)
            .await
            .unwrap();
        assert!(state.coordinator.accept_invite(&room_id, &identity("guest", "Gus")).await);
        assert!(state.coordinator.start_game(&room_id, "host").await);

        let response = app(state.clone(), host.clone())
            .oneshot(post_json(&format!("/rooms/{}/spin/begin", room_id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let landed = body_json(response).await;

        let response = app(state.clone(), host)
            .oneshot(post_json(&format!("/rooms/{}/spin", room_id), &landed.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.game_data.current_turn_index, 1);
        assert_eq!(room.game_data.spin_history.len(), 1);
        assert!(!room.game_data.is_spinning);
    }

    async fn playing_room(state: &AppState) -> String {
        let room_id = state
            .coordinator
            .create_room_from_catalog(&identity("host", "Hana"), None)
            .await
            .unwrap();
        assert!(state.coordinator.accept_invite(&room_id, &identity("guest", "Gus")).await);
        assert!(state.coordinator.start_game(&room_id, "host").await);
        room_id
    }

    async fn report(state: &AppState, user: UserIdentity, room_id: &str, body: &str) -> StatusCode {
        app(state.clone(), user)
            .oneshot(post_json(&format!("/rooms/{}/timeout", room_id), body))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_fresh_turn_timeout_is_rejected() {
        let state = AppStateBuilder::new().build();
        let room_id = playing_room(&state).await;

        let status = report(
            &state,
            identity("guest", "Gus"),
            &room_id,
            r#"{"offendingPlayerId": "host", "reason": "timeout"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn test_stranger_cannot_end_a_game() {
        let state = AppStateBuilder::new()
            .with_config(GameConfig {
                turn_timeout: Duration::from_millis(1),
                ..GameConfig::default()
            })
            .build();
        let room_id = playing_room(&state).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        for body in [
            r#"{"offendingPlayerId": "host", "reason": "timeout"}"#,
            r#"{"offendingPlayerId": "host", "reason": "left"}"#,
        ] {
            let status = report(&state, identity("mallory", "Mal"), &room_id, body).await;
            assert_eq!(status, StatusCode::CONFLICT);
        }
        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn test_leaving_is_only_self_reported() {
        let state = AppStateBuilder::new().build();
        let room_id = playing_room(&state).await;
        let left = r#"{"offendingPlayerId": "host", "reason": "left"}"#;

        assert_eq!(report(&state, identity("guest", "Gus"), &room_id, left).await, StatusCode::CONFLICT);
        assert_eq!(report(&state, identity("host", "Hana"), &room_id, left).await, StatusCode::OK);

        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.game_data.timeout_reason.as_deref(), Some("Hana left the game"));
    }

    #[tokio::test]
    async fn test_report_expired_turn_over_http() {
        let state = AppStateBuilder::new()
            .with_config(GameConfig {
                turn_timeout: Duration::from_millis(1),
                ..GameConfig::default()
            })
            .build();
        let room_id = playing_room(&state).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = report(
            &state,
            identity("guest", "Gus"),
            &room_id,
            r#"{"offendingPlayerId": "host", "reason": "timeout"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.game_data.timeout_reason.as_deref(), Some("Hana ran out of time"));
    }

    #[tokio::test]
    async fn test_off_wheel_spin_over_http_is_rejected() {
        let state = AppStateBuilder::new().build();
        let room_id = playing_room(&state).await;

        let response = app(state.clone(), identity("host", "Hana"))
            .oneshot(post_json(
                &format!("/rooms/{}/spin", room_id),
                r#"{"name": "NotOnWheel", "image": "x.png", "value": 1000000000000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let room = state.coordinator.get_room(&room_id).await.unwrap();
        assert!(room.game_data.spin_history.is_empty());
        assert_eq!(room.game_data.score_of("host"), 0.0);
    }
}
