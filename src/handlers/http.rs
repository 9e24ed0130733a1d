//! HTTP 요청/응답 핸들러

use crate::error::{AppError, AppResult};
use crate::handlers::lifecycle::{self, NewMessage};
use crate::identity::Identity;
use crate::protocol::MessageView;
use crate::registry::RoomInfo;
use crate::state::AppState;
use crate::store::{self, User};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub room_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub username: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    pub email: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub phone: Option<i64>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::InvalidRequest(e.body_text()))
}

/// 방 관리 권한 확인
async fn require_admin(state: &AppState, identity: &Identity) -> AppResult<()> {
    let limit = state.config.database.timeout;
    let user = store::timed(
        limit,
        state
            .store
            .get_or_create_user(&identity.email, Some(identity.username.as_str())),
    )
    .await?;

    if user.role.can_administer_rooms() {
        Ok(())
    } else {
        tracing::warn!(email = %identity.email, "Room administration denied");
        Err(AppError::Forbidden)
    }
}

/// POST /rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> AppResult<Json<CreateRoomResponse>> {
    let request = body(payload)?;
    require_admin(&state, &identity).await?;

    let room = lifecycle::create_room(&state, request.room_id.as_deref(), request.name.as_deref()).await?;
    Ok(Json(CreateRoomResponse {
        room_id: room.room_id,
        room_name: room.room_name,
    }))
}

/// DELETE /rooms/:room_id
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &identity).await?;
    lifecycle::delete_room(&state, &room_id).await?;
    Ok((StatusCode::OK, "Room deleted."))
}

/// GET /rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomInfo>> {
    Json(lifecycle::list_rooms(&state))
}

/// POST /rooms/:room_id/messages
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = body(payload)?;
    lifecycle::post_message(
        &state,
        &room_id,
        NewMessage {
            username: request.username,
            email: request.email,
            content: request.message,
        },
    )
    .await?;
    Ok((StatusCode::OK, "Message Sent"))
}

/// GET /rooms/:room_id/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<MessageView>>> {
    Ok(Json(lifecycle::fetch_history(&state, &room_id).await?))
}

/// POST /users/sync
pub async fn sync_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SyncUserRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let request = body(payload)?;
    let identity = Identity::new(&request.email, request.username.as_deref())
        .ok_or_else(|| AppError::InvalidRequest("email is required".to_string()))?;

    let limit = state.config.database.timeout;
    let user = store::timed(
        limit,
        state
            .store
            .get_or_create_user(&identity.email, request.username.as_deref()),
    )
    .await?;
    Ok(Json(user))
}

/// GET /users/:email
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> AppResult<Json<User>> {
    let limit = state.config.database.timeout;
    store::timed(limit, state.store.get_user(&email))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User not found: {email}")))
}

/// PATCH /users/:email
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let request = body(payload)?;
    let limit = state.config.database.timeout;
    let updated = store::timed(
        limit,
        state
            .store
            .update_user(&email, request.username.as_deref(), request.phone),
    )
    .await?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("User not found: {email}")))
    }
}
