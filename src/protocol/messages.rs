//! 클라이언트-서버 메시지 프로토콜 정의

use crate::registry::RoomInfo;
use crate::store::StoredMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Membership
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },

    // Chat
    SendMessage { room_id: String, content: String },
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    // Connection
    Connected { socket_id: String },
    HeartbeatAck,
    Error { code: String, message: String },

    // Membership
    JoinResult { room_id: String, accepted: bool },

    // Room Events
    RoomCreated { room: RoomInfo },
    RoomUpdated { room: RoomInfo },
    RoomDeleted { room_id: String },

    // Chat
    ReceiveMessage { message: MessageView },
}

/// 채팅 메시지 페이로드. "내 메시지" 여부는 받는 쪽이 email 로 판단한다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// 저장소 순번. 같은 시각의 메시지는 이 값으로 정렬한다.
    pub id: i64,
    pub room_id: String,
    pub username: String,
    pub email: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<StoredMessage> for MessageView {
    fn from(message: StoredMessage) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            username: message.username,
            email: message.email,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_use_tagged_camel_case_payloads() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "JoinRoom", "payload": {"roomId": "r1"}})).unwrap();
        assert!(matches!(msg, ClientMessage::JoinRoom { room_id } if room_id == "r1"));

        let msg: ClientMessage = serde_json::from_value(json!({"type": "Heartbeat"})).unwrap();
        assert!(matches!(msg, ClientMessage::Heartbeat));
    }

    #[test]
    fn room_events_serialize_with_wire_names() {
        let event = ServerMessage::RoomUpdated {
            room: RoomInfo {
                room_id: "r1".to_string(),
                room_name: "alpha".to_string(),
                user_count: 2,
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "RoomUpdated",
                "payload": {"room": {"roomId": "r1", "roomName": "alpha", "userCount": 2}}
            })
        );

        let deleted = ServerMessage::RoomDeleted { room_id: "r1".to_string() };
        assert_eq!(
            serde_json::to_value(&deleted).unwrap(),
            json!({"type": "RoomDeleted", "payload": {"roomId": "r1"}})
        );
    }
}
