//! 수신 통계

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// 워커가 기록하고 호출자가 읽는 카운터 (락 없음)
#[derive(Debug, Default)]
pub struct Counters {
    /// 재시도 횟수
    pub retries: AtomicU64,

    /// 재시도 예산 소진으로 포기한 세그먼트 수
    pub drops: AtomicU64,

    /// 파이프라인 커서
    pub position: AtomicU64,

    /// outstanding 요청 수
    pub outstanding: AtomicU64,

    /// 현재 윈도우
    pub window: AtomicU64,

    /// 탐지된 스트림 길이 (나노초)
    pub duration_ns: AtomicU64,
}

impl Counters {
    pub fn new(window: usize) -> Self {
        let counters = Self::default();
        counters.window.store(window as u64, Ordering::Relaxed);
        counters
    }

    /// 스냅샷 생성
    pub fn snapshot(&self) -> SubscriberStats {
        SubscriberStats {
            pipeline_size: self.outstanding.load(Ordering::Relaxed),
            window: self.window.load(Ordering::Relaxed),
            position: self.position.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            duration_ns: self.duration_ns.load(Ordering::Relaxed),
        }
    }
}

/// 수신 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberStats {
    /// outstanding 요청 수
    pub pipeline_size: u64,

    /// 윈도우
    pub window: u64,

    /// 파이프라인 커서
    pub position: u64,

    /// 재시도 횟수
    pub retries: u64,

    /// 포기한 세그먼트 수
    pub drops: u64,

    /// 스트림 길이 (나노초)
    pub duration_ns: u64,
}

impl fmt::Display for SubscriberStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline size: {}/{} Position: {} Retries: {} Drops: {} Duration: {}s",
            self.pipeline_size,
            self.window,
            self.position,
            self.retries,
            self.drops,
            self.duration_ns / 1_000_000_000,
        )
    }
}
