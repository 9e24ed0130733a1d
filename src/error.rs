//! 요청 단위 오류
//!
//! 모든 실패는 해당 요청(또는 해당 연결 이벤트)에 한정된다. 전송 실패는 여기에
//! 포함되지 않으며 브로드캐스트 내부에서 기록 후 건너뛴다.

use crate::registry::RegistryError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("identity required")]
    Unauthorized,
    #[error("room administration requires admin role")]
    Forbidden,
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 클라이언트에 노출되는 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Persistence(_) => "persistence_failure",
            Self::Internal(_) => "internal_error",
        }
    }

    /// 클라이언트에 노출되는 메시지. 저장소 내부 오류는 숨긴다.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(format!("Room does not exist: {id}")),
            RegistryError::AlreadyExists(id) => Self::Conflict(format!("Room already exists: {id}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Persistence(err) => tracing::error!(error = %err, "Persistence failure"),
            Self::Internal(reason) => tracing::error!(reason = %reason, "Internal failure"),
            _ => {}
        }

        (
            self.status(),
            Json(serde_json::json!({
                "error": self.code(),
                "message": self.public_message(),
            })),
        )
            .into_response()
    }
}
