//! # NMT (Named Media Transport)
//!
//! CCN/NDN 기반 풀(pull) 방식 미디어 스트리밍 전송 프로토콜
//!
//! ## 핵심 특징
//! - **이름 기반 전송**: Interest로 이름을 요청하면 서명된 ContentObject가 응답
//! - **세그먼트 코덱**: 미디어 버퍼를 크기 제한 패킷으로 분할, 손실 허용 재조립
//! - **윈도우 파이프라인**: 고정 윈도우 내 다중 Interest 발행, 순서 보장 전달
//! - **손실 복구**: 재시도 예산 소진 시 불연속으로 표시하고 재생 지속
//! - **탐색/길이 탐지**: 프레임 인덱스 트리를 exclusion 필터로 질의
//! - **단일 워커 스레드**: 프로토콜 상태는 워커만 소유, 큐 2개로만 통신

pub mod config;
pub mod error;
pub mod face;
pub mod media;
pub mod name;
pub mod pipeline;
pub mod publisher;
pub mod segmenter;
pub mod stats;
pub mod subscriber;

pub use config::Config;
pub use error::{Error, Result};
pub use face::{
    ChildSelector, ContentObject, ExclusionFilter, Face, FaceEvent, FaceWaker, Interest, Publish,
    Signer,
};
pub use media::{BufferStatus, MediaBuffer, MediaReceiver};
pub use name::Name;
pub use pipeline::{PipelineFetch, PipelineOutcome};
pub use publisher::{FreshFlush, Publisher, PublishPolicy};
pub use segmenter::Segmenter;
pub use stats::SubscriberStats;
pub use subscriber::Subscriber;

/// 패킷 헤더 길이 (chunks_remaining:u8 + element_offset:u16 + element_count:u8)
pub const PACKET_HDR_LEN: usize = 4;

/// 세그먼트 헤더 길이 (size:u32 + timestamp:u64 + duration:u64)
pub const SEGMENT_HDR_LEN: usize = 20;

/// 기본 패킷 크기 (바이트, 헤더 포함)
pub const DEFAULT_PACKET_SIZE: usize = 4096;

/// 기본 파이프라인 윈도우
pub const DEFAULT_WINDOW: usize = 1;
