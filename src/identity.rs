//! 외부 인증 공급자가 넘겨준 신원
//!
//! 앞단 게이트웨이가 검증한 email/표시 이름을 헤더로 전달하며, 서버는 이를 그대로 신뢰한다.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Deserialize;

pub const EMAIL_HEADER: &str = "x-user-email";
pub const NAME_HEADER: &str = "x-user-name";

/// 검증된 사용자 신원
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub email: String,
    pub username: String,
}

impl Identity {
    /// 이름이 없으면 email 의 로컬 파트를 쓴다
    pub fn new(email: &str, username: Option<&str>) -> Option<Self> {
        let email = email.trim();
        if email.is_empty() {
            return None;
        }
        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email));

        Some(Self {
            email: email.to_string(),
            username: username.to_string(),
        })
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let email = headers.get(EMAIL_HEADER)?.to_str().ok()?;
        let username = headers.get(NAME_HEADER).and_then(|v| v.to_str().ok());
        Self::new(email, username)
    }
}

/// WebSocket 업그레이드 쿼리 (`?email=&username=`)
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    pub email: Option<String>,
    pub username: Option<String>,
}

impl IdentityQuery {
    pub fn into_identity(self) -> Option<Identity> {
        Identity::new(self.email.as_deref()?, self.username.as_deref())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn headers_supply_identity_with_name_fallback() {
        let mut headers = HeaderMap::new();
        assert!(Identity::from_headers(&headers).is_none());

        headers.insert(EMAIL_HEADER, HeaderValue::from_static("amy@x.io"));
        let identity = Identity::from_headers(&headers).unwrap();
        assert_eq!(identity.username, "amy");

        headers.insert(NAME_HEADER, HeaderValue::from_static("Amy Pond"));
        let identity = Identity::from_headers(&headers).unwrap();
        assert_eq!(identity.username, "Amy Pond");
        assert_eq!(identity.email, "amy@x.io");
    }

    #[test]
    fn blank_email_is_not_an_identity() {
        let query = IdentityQuery {
            email: Some("  ".to_string()),
            username: Some("ghost".to_string()),
        };
        assert!(query.into_identity().is_none());
    }
}
