//! 방 생명주기 API
//!
//! 요청/응답 경로의 방 생성·삭제, 메시지 게시, 조회. HTTP 와 푸시 채널이 공유한다.

use crate::error::{AppError, AppResult};
use crate::handlers::broadcast;
use crate::protocol::MessageView;
use crate::registry::RoomInfo;
use crate::state::AppState;
use crate::store;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// 게시할 메시지
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub username: String,
    pub email: String,
    pub content: String,
}

/// 변경 → 저장 → 알림 구간을 별도 태스크에서 실행한다.
/// 요청 future 가 중간에 취소되어도 레지스트리 변경과 브로드캐스트는 함께 끝난다.
async fn detached<T, F>(section: F) -> AppResult<T>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    tokio::spawn(section)
        .await
        .map_err(|e| AppError::Internal(format!("room task failed: {e}")))?
}

/// 방 생성 후 RoomCreated 브로드캐스트
pub async fn create_room(
    state: &Arc<AppState>,
    room_id: Option<&str>,
    name: Option<&str>,
) -> AppResult<RoomInfo> {
    let room_id = match room_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    let name = name.map(str::to_string);
    let state = Arc::clone(state);

    detached(async move {
        // 방이 보이기 전에 게이트를 먼저 세운다
        let _gate = state.gates.install_and_lock(&room_id).await;

        let room = state.registry.create_room(Some(&room_id), name.as_deref())?;
        broadcast::room_created(&state, room.clone()).await;

        tracing::info!(room_id = %room.room_id, room_name = %room.room_name, "Room created");
        Ok(room)
    })
    .await
}

/// 방 삭제: 레지스트리 제거 → 이력 삭제 → RoomDeleted. 쫓겨난 연결 수를 돌려준다.
pub async fn delete_room(state: &Arc<AppState>, room_id: &str) -> AppResult<usize> {
    let room_id = room_id.to_string();
    let state = Arc::clone(state);

    detached(async move {
        let not_found = || AppError::NotFound(format!("Room does not exist: {room_id}"));
        let gate = state.gates.lock(&room_id).await.ok_or_else(not_found)?;

        let evicted = state.registry.delete_room(&room_id)?;

        // 레지스트리에서 이미 제거되었으므로 이력 삭제 실패는 삭제를 되돌리지 않는다
        let limit = state.config.database.timeout;
        match store::timed(limit, state.store.delete_messages(&room_id)).await {
            Ok(purged) => tracing::debug!(room_id = %room_id, purged = purged, "Room history purged"),
            Err(e) => tracing::error!(room_id = %room_id, error = %e, "Failed to purge room history"),
        }

        broadcast::room_deleted(&state, &room_id).await;
        state.gates.remove(&room_id);
        drop(gate);

        tracing::info!(room_id = %room_id, evicted = evicted.len(), "Room deleted");
        Ok(evicted.len())
    })
    .await
}

/// 메시지 게시: 방 확인 → 저장 → 방 멤버에게 ReceiveMessage.
/// 저장이 실패하거나 시간 초과되면 브로드캐스트하지 않는다.
pub async fn post_message(
    state: &Arc<AppState>,
    room_id: &str,
    message: NewMessage,
) -> AppResult<MessageView> {
    if message.content.is_empty() {
        return Err(AppError::InvalidRequest("message must not be empty".to_string()));
    }
    if message.email.is_empty() || message.username.is_empty() {
        return Err(AppError::InvalidRequest("username and email are required".to_string()));
    }

    let room_id = room_id.to_string();
    let state = Arc::clone(state);

    detached(async move {
        // 게이트를 쥐고 있으면 방이 존재한다
        let _gate = state
            .gates
            .lock(&room_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Room does not exist: {room_id}")))?;

        let limit = state.config.database.timeout;
        let stored = store::timed(
            limit,
            state
                .store
                .save_message(&room_id, &message.username, &message.email, &message.content),
        )
        .await?;

        let view = MessageView::from(stored);
        let delivered = broadcast::receive_message(&state, view.clone()).await;

        tracing::debug!(room_id = %room_id, delivered = delivered, "Message sent");
        Ok(view)
    })
    .await
}

/// 방 목록 스냅샷
pub fn list_rooms(state: &AppState) -> Vec<RoomInfo> {
    state.registry.list_rooms()
}

/// 메시지 이력 (시간 오름차순). 존재하지 않는 방은 빈 목록.
pub async fn fetch_history(state: &AppState, room_id: &str) -> AppResult<Vec<MessageView>> {
    if !state.registry.room_exists(room_id) {
        return Ok(Vec::new());
    }

    let limit = state.config.database.timeout;
    let messages = store::timed(limit, state.store.list_messages(room_id)).await?;
    Ok(messages.into_iter().map(MessageView::from).collect())
}
