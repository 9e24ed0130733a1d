//! 영속 저장소
//!
//! 메시지 이력과 사용자 역할을 보관한다. 코어는 `ChatStore` 트레이트로만 접근하며,
//! 모든 호출은 `timed` 로 감싸 지연된 저장소가 방 연산을 붙잡지 못하게 한다.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// 저장소 오류
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// 저장된 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub room_id: String,
    pub username: String,
    pub email: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// 사용자 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// 방 생성/삭제 권한
    pub fn can_administer_rooms(self) -> bool {
        self == Self::Admin
    }
}

/// 사용자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub username: String,
    pub phone: i64,
    pub role: UserRole,
}

/// 메시지/사용자 저장소
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn save_message(
        &self,
        room_id: &str,
        username: &str,
        email: &str,
        content: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// 시간 오름차순
    async fn list_messages(&self, room_id: &str) -> Result<Vec<StoredMessage>, StoreError>;

    async fn delete_messages(&self, room_id: &str) -> Result<u64, StoreError>;

    async fn get_or_create_user(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<User, StoreError>;

    async fn get_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// 사용자가 없으면 `false`
    async fn update_user(
        &self,
        email: &str,
        username: Option<&str>,
        phone: Option<i64>,
    ) -> Result<bool, StoreError>;
}

/// 저장소 호출에 시간 제한 적용
pub async fn timed<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
