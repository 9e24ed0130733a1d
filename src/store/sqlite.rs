//! SQLite 저장소

use super::{ChatStore, StoreError, StoredMessage, User, UserRole};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

type MessageRow = (i64, String, String, String, String, i64);
type UserRow = (String, String, i64, String);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id TEXT NOT NULL,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_room_time ON messages (room_id, timestamp_ms)",
    "CREATE TABLE IF NOT EXISTS users (
        email TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        phone INTEGER NOT NULL DEFAULT 0,
        role TEXT NOT NULL DEFAULT 'user'
    )",
];

/// SQLite 기반 `ChatStore`
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    admin_emails: Vec<String>,
}

impl SqliteStore {
    /// 연결 후 스키마 생성
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let in_memory = config.url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            // 메모리 DB 는 연결마다 별개이므로 하나만 유지
            .max_connections(if in_memory { 1 } else { config.max_connections.max(1) })
            .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(60)) })
            .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(1800)) })
            .acquire_timeout(config.timeout)
            .connect(&config.url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        tracing::info!(url = %config.url, "Database connected");
        Ok(Self {
            pool,
            admin_emails: config.admin_emails.clone(),
        })
    }

    fn default_role(&self, email: &str) -> UserRole {
        let email = email.to_lowercase();
        if self.admin_emails.iter().any(|admin| *admin == email) {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }
}

fn message_from_row((id, room_id, username, email, content, timestamp_ms): MessageRow) -> StoredMessage {
    StoredMessage {
        id,
        room_id,
        username,
        email,
        content,
        timestamp: DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default(),
    }
}

fn user_from_row((email, username, phone, role): UserRow) -> User {
    User {
        email,
        username,
        phone,
        role: UserRole::parse(&role),
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn save_message(
        &self,
        room_id: &str,
        username: &str,
        email: &str,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (room_id, username, email, content, timestamp_ms) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(username)
        .bind(email)
        .bind(content)
        .bind(timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(StoredMessage {
            id: result.last_insert_rowid(),
            room_id: room_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            content: content.to_string(),
            timestamp: DateTime::<Utc>::from_timestamp_millis(timestamp.timestamp_millis())
                .unwrap_or(timestamp),
        })
    }

    async fn list_messages(&self, room_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, room_id, username, email, content, timestamp_ms FROM messages
             WHERE room_id = ? ORDER BY timestamp_ms ASC, id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn delete_messages(&self, room_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_or_create_user(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<User, StoreError> {
        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email));

        let created = sqlx::query(
            "INSERT OR IGNORE INTO users (email, username, phone, role) VALUES (?, ?, 0, ?)",
        )
        .bind(email)
        .bind(username)
        .bind(self.default_role(email).as_str())
        .execute(&self.pool)
        .await?;

        if created.rows_affected() > 0 {
            tracing::info!(email = %email, "User created");
        }

        let row: UserRow =
            sqlx::query_as("SELECT email, username, phone, role FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(user_from_row(row))
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT email, username, phone, role FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(user_from_row))
    }

    async fn update_user(
        &self,
        email: &str,
        username: Option<&str>,
        phone: Option<i64>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = COALESCE(?, username), phone = COALESCE(?, phone) WHERE email = ?",
        )
        .bind(username)
        .bind(phone)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
