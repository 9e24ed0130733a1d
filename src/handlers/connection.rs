//! 연결 핸들러

use crate::error::AppError;
use crate::handlers::{broadcast, lifecycle, membership};
use crate::identity::Identity;
use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

/// 새 연결 처리
pub async fn handle_connection(
    state: &AppState,
    sender: Sender<ServerMessage>,
    identity: Option<Identity>,
) -> String {
    let peer_id = Uuid::new_v4().to_string();

    let session = PeerSession {
        id: peer_id.clone(),
        identity: identity.clone(),
        sender,
        connected_at: Instant::now(),
    };

    state.peers.insert(peer_id.clone(), session);

    broadcast::send_to_peer(
        state,
        &peer_id,
        ServerMessage::Connected {
            socket_id: peer_id.clone(),
        },
    )
    .await;

    tracing::info!(
        peer_id = %peer_id,
        email = ?identity.as_ref().map(|i| i.email.as_str()),
        "New connection established"
    );
    peer_id
}

/// 연결 해제 처리
pub async fn handle_disconnect(state: &AppState, peer_id: &str) {
    membership::on_disconnect(state, peer_id).await;
}

/// Heartbeat 처리
pub async fn handle_heartbeat(state: &AppState, peer_id: &str) {
    broadcast::send_to_peer(state, peer_id, ServerMessage::HeartbeatAck).await;
}

/// 방 참여 요청에 대한 응답
pub async fn handle_join_room(state: &AppState, peer_id: &str, room_id: &str) {
    let accepted = membership::on_join(state, peer_id, room_id).await;
    broadcast::send_to_peer(
        state,
        peer_id,
        ServerMessage::JoinResult {
            room_id: room_id.to_string(),
            accepted,
        },
    )
    .await;
}

/// 소켓으로 보낸 채팅 메시지. 세션 신원으로 게시하며 실패는 보낸 연결에만 알린다.
pub async fn handle_send_message(state: &Arc<AppState>, peer_id: &str, room_id: &str, content: &str) {
    let identity = state.peers.get(peer_id).and_then(|s| s.identity.clone());

    let result = match identity {
        Some(identity) => {
            lifecycle::post_message(
                state,
                room_id,
                lifecycle::NewMessage {
                    username: identity.username,
                    email: identity.email,
                    content: content.to_string(),
                },
            )
            .await
        }
        None => Err(AppError::Unauthorized),
    };

    if let Err(e) = result {
        tracing::warn!(peer_id = %peer_id, room_id = %room_id, error = %e, "Socket message rejected");
        broadcast::send_to_peer(
            state,
            peer_id,
            ServerMessage::Error {
                code: e.code().to_string(),
                message: e.public_message(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connect_peer, connect_peer_as, drain, test_state};

    #[tokio::test]
    async fn connection_is_greeted_with_its_socket_id() {
        let state = test_state().await;
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);

        let peer_id = handle_connection(&state, tx, None).await;
        assert_eq!(drain(&mut rx), vec![ServerMessage::Connected { socket_id: peer_id.clone() }]);
        assert!(state.peers.contains_key(&peer_id));

        handle_disconnect(&state, &peer_id).await;
        assert!(!state.peers.contains_key(&peer_id));
    }

    #[tokio::test]
    async fn join_reply_reports_acceptance() {
        let state = test_state().await;
        let mut a = connect_peer(&state, "a");
        lifecycle::create_room(&state, Some("r"), None).await.unwrap();
        drain(&mut a);

        handle_join_room(&state, "a", "ghost").await;
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::JoinResult { room_id: "ghost".to_string(), accepted: false }]
        );

        handle_join_room(&state, "a", "r").await;
        let events = drain(&mut a);
        assert_eq!(
            events.last(),
            Some(&ServerMessage::JoinResult { room_id: "r".to_string(), accepted: true })
        );
    }

    #[tokio::test]
    async fn socket_message_uses_session_identity() {
        let state = test_state().await;
        let identity = Identity::new("amy@x.io", Some("Amy"));
        let mut a = connect_peer_as(&state, "a", identity);
        lifecycle::create_room(&state, Some("r"), None).await.unwrap();
        membership::on_join(&state, "a", "r").await;
        drain(&mut a);

        handle_send_message(&state, "a", "r", "hello").await;
        match drain(&mut a).as_slice() {
            [ServerMessage::ReceiveMessage { message }] => {
                assert_eq!(message.username, "Amy");
                assert_eq!(message.email, "amy@x.io");
                assert_eq!(message.content, "hello");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn anonymous_socket_message_is_rejected_to_sender_only() {
        let state = test_state().await;
        let mut anon = connect_peer(&state, "anon");
        let mut other = connect_peer(&state, "other");
        lifecycle::create_room(&state, Some("r"), None).await.unwrap();
        membership::on_join(&state, "other", "r").await;
        drain(&mut anon);
        drain(&mut other);

        handle_send_message(&state, "anon", "r", "hi").await;
        assert!(matches!(
            drain(&mut anon).as_slice(),
            [ServerMessage::Error { code, .. }] if code == "unauthorized"
        ));
        assert!(drain(&mut other).is_empty());
    }
}
