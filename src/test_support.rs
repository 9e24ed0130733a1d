//! 테스트 공용 도우미

use crate::config::Config;
use crate::identity::Identity;
use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use crate::store::{ChatStore, SqliteStore, StoreError, StoredMessage, User};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database.admin_emails = vec!["admin@x.io".to_string()];
    config.database.timeout = Duration::from_millis(200);
    config.delivery.send_timeout = Duration::from_millis(100);
    config.delivery.outbound_buffer = 64;
    config
}

pub async fn memory_store() -> SqliteStore {
    match SqliteStore::connect(&test_config().database).await {
        Ok(store) => store,
        Err(e) => panic!("in-memory store: {e}"),
    }
}

pub async fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), Arc::new(memory_store().await)))
}

pub fn test_state_with(store: Arc<dyn ChatStore>) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), store))
}

/// 신원 없는 가짜 연결 등록
pub fn connect_peer(state: &AppState, peer_id: &str) -> mpsc::Receiver<ServerMessage> {
    connect_peer_as(state, peer_id, None)
}

pub fn connect_peer_as(
    state: &AppState,
    peer_id: &str,
    identity: Option<Identity>,
) -> mpsc::Receiver<ServerMessage> {
    let (tx, rx) = mpsc::channel(state.config.delivery.outbound_buffer);
    state.peers.insert(
        peer_id.to_string(),
        PeerSession {
            id: peer_id.to_string(),
            identity,
            sender: tx,
            connected_at: Instant::now(),
        },
    );
    rx
}

/// 지금까지 받은 이벤트 전부
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// 실패/지연을 주입할 수 있는 저장소
pub struct FlakyStore {
    inner: SqliteStore,
    pub fail_saves: AtomicBool,
    pub fail_purges: AtomicBool,
    /// 저장 지연 (ms)
    pub save_delay_ms: AtomicU64,
    /// 이력 삭제 지연 (ms)
    pub purge_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: memory_store().await,
            fail_saves: AtomicBool::new(false),
            fail_purges: AtomicBool::new(false),
            save_delay_ms: AtomicU64::new(0),
            purge_delay_ms: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl ChatStore for FlakyStore {
    async fn save_message(
        &self,
        room_id: &str,
        username: &str,
        email: &str,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let delay = self.save_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.save_message(room_id, username, email, content).await
    }

    async fn list_messages(&self, room_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        self.inner.list_messages(room_id).await
    }

    async fn delete_messages(&self, room_id: &str) -> Result<u64, StoreError> {
        let delay = self.purge_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_purges.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.delete_messages(room_id).await
    }

    async fn get_or_create_user(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<User, StoreError> {
        self.inner.get_or_create_user(email, username).await
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.get_user(email).await
    }

    async fn update_user(
        &self,
        email: &str,
        username: Option<&str>,
        phone: Option<i64>,
    ) -> Result<bool, StoreError> {
        self.inner.update_user(email, username, phone).await
    }
}
