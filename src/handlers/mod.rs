//! 핸들러 모듈

pub mod broadcast;
pub mod connection;
pub mod http;
pub mod lifecycle;
pub mod membership;
