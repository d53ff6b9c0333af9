//! 프로토콜 설정

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_PACKET_SIZE, DEFAULT_WINDOW, PACKET_HDR_LEN};

/// NMT 프로토콜 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 패킷 최대 크기 (바이트, 헤더 포함)
    pub packet_max_size: usize,

    /// 파이프라인 윈도우 (동시 outstanding Interest 수)
    pub window: usize,

    /// 세그먼트 Interest 수명 (밀리초)
    pub interest_lifetime_ms: u64,

    /// 세그먼트당 재시도 횟수
    pub interest_retries: u32,

    /// 길이 탐지 질의 타임아웃 (밀리초, 짧게 유지)
    pub duration_probe_timeout_ms: u64,

    /// 워커의 네트워크 이벤트 루프 1회 구동 시간 (밀리초)
    pub poll_interval_ms: u64,

    /// 출력 큐 put 재시도 간격 (밀리초)
    pub push_retry_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packet_max_size: DEFAULT_PACKET_SIZE,
            window: DEFAULT_WINDOW,
            interest_lifetime_ms: 1000,       // 1초
            interest_retries: 1,
            duration_probe_timeout_ms: 100,   // 길이 탐지는 짧게
            poll_interval_ms: 2000,
            push_retry_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 패킷당 페이로드 크기 (헤더 제외)
    pub fn packet_payload_size(&self) -> usize {
        self.packet_max_size.saturating_sub(PACKET_HDR_LEN)
    }

    /// 출력 큐 용량 (윈도우의 2배)
    pub fn output_queue_capacity(&self) -> usize {
        self.window.max(1) * 2
    }

    /// 저지연 재생용 설정
    pub fn low_latency() -> Self {
        Self {
            packet_max_size: 1400,            // MTU 이하
            window: 4,
            interest_lifetime_ms: 500,
            interest_retries: 1,
            duration_probe_timeout_ms: 50,
            poll_interval_ms: 500,
            push_retry_timeout_ms: 500,
        }
    }

    /// 손실이 잦은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            packet_max_size: 1400,
            window: 8,
            interest_lifetime_ms: 2000,
            interest_retries: 3,              // 재시도 여유
            duration_probe_timeout_ms: 200,
            poll_interval_ms: 2000,
            push_retry_timeout_ms: 1000,
        }
    }

    /// 대역폭 우선 설정
    pub fn high_throughput() -> Self {
        Self {
            packet_max_size: 8192,            // 8KB
            window: 16,
            interest_lifetime_ms: 1000,
            interest_retries: 2,
            duration_probe_timeout_ms: 100,
            poll_interval_ms: 2000,
            push_retry_timeout_ms: 1000,
        }
    }
}
