//! 방 참여/퇴장 처리
//!
//! 푸시 채널의 수명 이벤트(참여, 퇴장, 연결 끊김)를 레지스트리 변경으로 옮기고
//! 인원 변경 알림을 낸다. 변경과 알림은 방 게이트 안에서 함께 일어난다.

use crate::handlers::broadcast;
use crate::state::AppState;

/// 방 참여 처리. 존재하지 않는 방이면 아무것도 바꾸지 않고 `false`.
pub async fn on_join(state: &AppState, peer_id: &str, room_id: &str) -> bool {
    let room_id = room_id.trim();

    let Some(_gate) = state.gates.lock(room_id).await else {
        tracing::info!(peer_id = %peer_id, room_id = %room_id, "Join rejected, unknown room");
        return false;
    };

    let change = match state.registry.add_member(room_id, peer_id) {
        Ok(change) => change,
        Err(e) => {
            tracing::info!(peer_id = %peer_id, room_id = %room_id, error = %e, "Join rejected");
            return false;
        }
    };

    let member_count = change.room.user_count;
    if change.changed {
        broadcast::room_updated(state, change.room).await;
    }

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        member_count = member_count,
        "User joined room"
    );
    true
}

/// 방 나가기 처리. 멤버가 아니었다면 알림을 내지 않는다.
pub async fn on_leave(state: &AppState, peer_id: &str, room_id: &str) {
    let room_id = room_id.trim();

    let Some(_gate) = state.gates.lock(room_id).await else {
        return;
    };

    let Some(change) = state.registry.remove_member(room_id, peer_id) else {
        return;
    };
    if !change.changed {
        tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Leave ignored, not a member");
        return;
    }

    let member_count = change.room.user_count;
    broadcast::room_updated(state, change.room).await;

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        member_count = member_count,
        "User left room"
    );
}

/// 연결 끊김 처리. 세션을 제거한 호출만 정리를 수행하므로 중복 통지에도 한 번만 실행된다.
pub async fn on_disconnect(state: &AppState, peer_id: &str) {
    if state.peers.remove(peer_id).is_none() {
        tracing::debug!(peer_id = %peer_id, "Duplicate disconnect ignored");
        return;
    }

    let rooms = state.registry.find_rooms_of(peer_id);
    for room_id in &rooms {
        on_leave(state, peer_id, room_id).await;
    }

    tracing::info!(peer_id = %peer_id, rooms = rooms.len(), "Connection closed");
}
