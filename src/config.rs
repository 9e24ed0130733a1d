//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub delivery: DeliveryConfig,
    pub log_level: String,
}

/// 영속 저장소 설정
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 생성 시 admin 역할을 받는 이메일 목록
    pub admin_emails: Vec<String>,
    pub timeout: Duration,
}

/// 푸시 채널 전송 설정
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub send_timeout: Duration,
    pub outbound_buffer: usize,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_var("PORT", 5248),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: split_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://roomcast.db?mode=rwc".to_string()),
                max_connections: parse_var("DB_MAX_CONNECTIONS", 5),
                admin_emails: split_list(&env::var("ADMIN_EMAILS").unwrap_or_default())
                    .into_iter()
                    .map(|email| email.to_lowercase())
                    .collect(),
                timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 5000)),
            },
            delivery: DeliveryConfig {
                send_timeout: Duration::from_millis(parse_var("SEND_TIMEOUT_MS", 2000)),
                outbound_buffer: parse_var::<usize>("OUTBOUND_BUFFER", 256).max(1),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// CORS 와일드카드 여부
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5248,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                admin_emails: Vec::new(),
                timeout: Duration::from_millis(5000),
            },
            delivery: DeliveryConfig {
                send_timeout: Duration::from_millis(2000),
                outbound_buffer: 256,
            },
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
