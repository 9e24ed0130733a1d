//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::identity::Identity;
use crate::protocol::ServerMessage;
use crate::registry::RoomRegistry;
use crate::store::ChatStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::Sender, Mutex, OwnedMutexGuard};

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방/멤버십 원본 상태
    pub registry: RoomRegistry,
    /// 방별 순서 게이트
    pub gates: RoomGates,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 메시지/사용자 저장소
    pub store: Arc<dyn ChatStore>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ChatStore>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            gates: RoomGates::default(),
            peers: DashMap::new(),
            store,
            config: Arc::new(config),
        }
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    #[allow(dead_code)]
    pub id: String,
    /// 연결 수명 동안 고정되는 신원
    pub identity: Option<Identity>,
    pub sender: Sender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}

/// 방별 순서 게이트
///
/// 한 방에 대한 "레지스트리 변경 → 저장 → 브로드캐스트" 를 직렬화한다. 게이트는 방이
/// 보이기 전에 설치되고, 삭제 시 게이트를 쥔 채로 제거된다. 게이트가 없는 방은
/// 존재하지 않는 방으로 취급한다.
#[derive(Default)]
pub struct RoomGates {
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomGates {
    /// 게이트 설치 (이미 있으면 기존 게이트)
    pub fn install(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(room_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// 방 생성용: 게이트를 설치하고 획득한다. 대기 중 게이트가 제거되면 새로 설치한다.
    pub async fn install_and_lock(&self, room_id: &str) -> OwnedMutexGuard<()> {
        loop {
            let gate = self.install(room_id);
            let guard = gate.clone().lock_owned().await;

            if let Some(current) = self.gates.get(room_id) {
                if Arc::ptr_eq(current.value(), &gate) {
                    return guard;
                }
            }
        }
    }

    /// 방 게이트 획득. 방이 없거나 대기 중 삭제되면 `None`.
    pub async fn lock(&self, room_id: &str) -> Option<OwnedMutexGuard<()>> {
        loop {
            let gate = self.gates.get(room_id).map(|g| Arc::clone(g.value()))?;
            let guard = gate.clone().lock_owned().await;

            match self.gates.get(room_id) {
                Some(current) if Arc::ptr_eq(current.value(), &gate) => return Some(guard),
                // 대기 중 같은 id 로 방이 다시 만들어짐
                Some(_) => continue,
                None => return None,
            }
        }
    }

    pub fn remove(&self, room_id: &str) {
        self.gates.remove(room_id);
    }
}
