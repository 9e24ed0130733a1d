//! 방 레지스트리
//!
//! 어떤 방이 존재하는지, 각 방에 어떤 연결이 속해 있는지에 대한 유일한 원본 상태.
//! I/O 를 하지 않으며 브로드캐스트도 호출하지 않는다. 모든 연산은 하나의
//! 임계 구역 안에서 끝나므로 "확인 후 삽입" 사이에 다른 스레드가 끼어들 수 없다.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// 레지스트리 연산 실패
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("room not found: {0}")]
    NotFound(String),
    #[error("room already exists: {0}")]
    AlreadyExists(String),
}

/// 방 스냅샷 (목록 조회, RoomCreated/RoomUpdated 페이로드)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub room_name: String,
    pub user_count: usize,
}

/// 멤버 추가/제거 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChange {
    pub room: RoomInfo,
    /// 멤버 집합이 실제로 바뀌었는지
    pub changed: bool,
}

struct Room {
    name: String,
    members: HashSet<String>,
}

impl Room {
    fn info(&self, id: &str) -> RoomInfo {
        RoomInfo {
            room_id: id.to_string(),
            room_name: self.name.clone(),
            user_count: self.members.len(),
        }
    }
}

#[derive(Default)]
struct Inner {
    /// room_id -> Room
    rooms: HashMap<String, Room>,
    /// connection_id -> 소속 room_id 집합 (역방향 인덱스)
    memberships: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn unlink(&mut self, connection_id: &str, room_id: &str) {
        if let Some(rooms) = self.memberships.get_mut(connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.memberships.remove(connection_id);
            }
        }
    }
}

/// 방 레지스트리
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 방 생성. `room_id` 가 없으면 새 식별자를 발급한다.
    /// 이름이 비어 있으면 식별자를 이름으로 쓴다.
    pub fn create_room(
        &self,
        room_id: Option<&str>,
        name: Option<&str>,
    ) -> Result<RoomInfo, RegistryError> {
        let room_id = match room_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&room_id)
            .to_string();

        let mut inner = self.inner.write();
        if inner.rooms.contains_key(&room_id) {
            return Err(RegistryError::AlreadyExists(room_id));
        }

        let room = Room {
            name,
            members: HashSet::new(),
        };
        let info = room.info(&room_id);
        inner.rooms.insert(room_id, room);
        Ok(info)
    }

    /// 방 삭제. 삭제 시점의 멤버 집합을 돌려준다.
    pub fn delete_room(&self, room_id: &str) -> Result<HashSet<String>, RegistryError> {
        let mut inner = self.inner.write();
        let room = inner
            .rooms
            .remove(room_id)
            .ok_or_else(|| RegistryError::NotFound(room_id.to_string()))?;

        for connection_id in &room.members {
            inner.unlink(connection_id, room_id);
        }
        Ok(room.members)
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.inner.read().rooms.contains_key(room_id)
    }

    #[cfg(test)]
    pub fn room_info(&self, room_id: &str) -> Option<RoomInfo> {
        self.inner.read().rooms.get(room_id).map(|room| room.info(room_id))
    }

    /// 멤버 추가 (멱등). 방이 없으면 아무것도 바꾸지 않고 실패한다.
    pub fn add_member(
        &self,
        room_id: &str,
        connection_id: &str,
    ) -> Result<MemberChange, RegistryError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let room = inner
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::NotFound(room_id.to_string()))?;

        let changed = room.members.insert(connection_id.to_string());
        let info = room.info(room_id);
        if changed {
            inner
                .memberships
                .entry(connection_id.to_string())
                .or_default()
                .insert(room_id.to_string());
        }
        Ok(MemberChange {
            room: info,
            changed,
        })
    }

    /// 멤버 제거 (멱등). 방이 이미 없으면 `None`.
    pub fn remove_member(&self, room_id: &str, connection_id: &str) -> Option<MemberChange> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let room = inner.rooms.get_mut(room_id)?;

        let changed = room.members.remove(connection_id);
        let info = room.info(room_id);
        if changed {
            inner.unlink(connection_id, room_id);
        }
        Some(MemberChange {
            room: info,
            changed,
        })
    }

    /// 연결이 속한 모든 방 (다중 방 참여 허용)
    pub fn find_rooms_of(&self, connection_id: &str) -> Vec<String> {
        self.inner
            .read()
            .memberships
            .get(connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 방의 현재 멤버 (브로드캐스트 대상 해석용)
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.inner
            .read()
            .rooms
            .get(room_id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 전체 방 스냅샷. 순서는 보장하지 않는다.
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        self.inner
            .read()
            .rooms
            .iter()
            .map(|(id, room)| room.info(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().rooms.len()
    }
}
