//! 에러 타입 정의

use thiserror::Error;

/// NMT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("재조립 불변식 위반: chunks_remaining={chunks_remaining}, pending={pending}")]
    ReassemblyInvariant { chunks_remaining: u8, pending: u64 },

    #[error("stream_info 조회 실패: {name}")]
    StreamInfoUnavailable { name: String },

    #[error("채널 종료")]
    ChannelClosed,

    #[error("실행 중이 아님")]
    NotRunning,

    #[error("이미 실행 중")]
    AlreadyRunning,

    #[error("네트워크 페이스 에러: {0}")]
    Face(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
