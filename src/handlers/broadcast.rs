//! 브로드캐스트 디스패처
//!
//! 상태를 갖지 않는 팬아웃. 대상은 "전체 연결" 또는 "방 멤버" 이며, 방 멤버는 매번
//! 레지스트리에서 해석하므로 멤버십과 구독 대상이 어긋나지 않는다.
//! 한 수신자에 대한 전송 실패는 기록 후 건너뛰고 나머지 전송은 계속한다.

use crate::protocol::{MessageView, ServerMessage};
use crate::registry::RoomInfo;
use crate::state::AppState;
use futures::future::join_all;
use tokio::sync::mpsc::Sender;

/// 새 방 알림 (전체)
pub async fn room_created(state: &AppState, room: RoomInfo) -> usize {
    broadcast_all(state, ServerMessage::RoomCreated { room }).await
}

/// 인원 변경 알림 (전체)
pub async fn room_updated(state: &AppState, room: RoomInfo) -> usize {
    broadcast_all(state, ServerMessage::RoomUpdated { room }).await
}

/// 방 삭제 알림 (전체). 방 안에 있던 클라이언트는 이 이벤트로 퇴장한다.
pub async fn room_deleted(state: &AppState, room_id: &str) -> usize {
    broadcast_all(
        state,
        ServerMessage::RoomDeleted {
            room_id: room_id.to_string(),
        },
    )
    .await
}

/// 채팅 메시지 (방 멤버만)
pub async fn receive_message(state: &AppState, message: MessageView) -> usize {
    let room_id = message.room_id.clone();
    broadcast_to_room(state, &room_id, ServerMessage::ReceiveMessage { message }).await
}

/// 모든 연결에 전송
pub async fn broadcast_all(state: &AppState, message: ServerMessage) -> usize {
    let targets: Vec<(String, Sender<ServerMessage>)> = state
        .peers
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().sender.clone()))
        .collect();
    deliver(state, targets, message).await
}

/// 방 멤버에게만 전송
pub async fn broadcast_to_room(state: &AppState, room_id: &str, message: ServerMessage) -> usize {
    let targets: Vec<(String, Sender<ServerMessage>)> = state
        .registry
        .members(room_id)
        .into_iter()
        .filter_map(|peer_id| {
            let sender = state.peers.get(&peer_id)?.sender.clone();
            Some((peer_id, sender))
        })
        .collect();
    deliver(state, targets, message).await
}

/// 특정 피어에게 메시지 전송
pub async fn send_to_peer(state: &AppState, peer_id: &str, message: ServerMessage) -> bool {
    let Some(sender) = state.peers.get(peer_id).map(|s| s.sender.clone()) else {
        return false;
    };
    deliver(state, vec![(peer_id.to_string(), sender)], message).await == 1
}

/// 수신자별 제한 시간 안에 병렬 전송. 성공한 수신자 수를 돌려준다.
async fn deliver(
    state: &AppState,
    targets: Vec<(String, Sender<ServerMessage>)>,
    message: ServerMessage,
) -> usize {
    let timeout = state.config.delivery.send_timeout;

    let sends = targets.into_iter().map(|(peer_id, sender)| {
        let message = message.clone();
        async move {
            match sender.send_timeout(message, timeout).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(peer_id = %peer_id, error = %e, "Failed to deliver event");
                    false
                }
            }
        }
    });

    join_all(sends).await.into_iter().filter(|ok| *ok).count()
}
