//! 미디어 협력자 타입
//!
//! 미디어 프레임워크의 버퍼는 여기 정의된 필드 너머로는 불투명하다.

use bytes::Bytes;

/// 미디어 버퍼 (프레임 1개)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBuffer {
    /// 페이로드 바이트
    pub data: Bytes,

    /// 타임스탬프 (나노초)
    pub timestamp_ns: u64,

    /// 지속 시간 (나노초)
    pub duration_ns: u64,

    /// 직전 버퍼와 타임라인 불연속 여부
    pub discontinuity: bool,
}

impl MediaBuffer {
    pub fn new(data: impl Into<Bytes>, timestamp_ns: u64, duration_ns: u64) -> Self {
        Self {
            data: data.into(),
            timestamp_ns,
            duration_ns,
            discontinuity: false,
        }
    }
}

/// 출력 버퍼 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// 연속 재생
    Normal,

    /// 탐색/손실로 인한 타임라인 점프가 뒤따름
    DiscontinuityFollows,
}

/// 소비자측 출력 큐 수신기 타입
pub type MediaReceiver = crossbeam_channel::Receiver<(BufferStatus, MediaBuffer)>;
