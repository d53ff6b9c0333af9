//! 윈도우 파이프라인 페처
//!
//! 단조 증가 시퀀스 번호 공간에서 최대 window개의 요청을 유지하고,
//! 네트워크 도착 순서와 무관하게 소비자에게는 항상 순서대로 전달한다.
//! 순수 상태 기계: 각 전이가 "전달할 응답"과 "발행할 요청"을 돌려준다.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

/// 전이 결과
#[derive(Debug)]
pub struct PipelineOutcome<R> {
    /// 순서대로 소비자에게 전달할 응답 (None = 포기한 슬롯)
    pub delivered: Vec<(u64, Option<R>)>,

    /// 새로 발행할 요청 번호
    pub issue: Vec<u64>,
}

impl<R> PipelineOutcome<R> {
    fn empty() -> Self {
        Self {
            delivered: Vec::new(),
            issue: Vec::new(),
        }
    }
}

/// 윈도우 파이프라인 페처 (단일 스레드 소유)
pub struct PipelineFetch<R> {
    /// 최대 outstanding 요청 수
    window: usize,

    /// 아직 전달하지 않은 최소 시퀀스 번호
    position: u64,

    /// 다음에 발행할 시퀀스 번호
    next_request: u64,

    /// 발행됐지만 미해결인 번호
    outstanding: BTreeSet<u64>,

    /// 도착했지만 아직 전달 순서가 아닌 응답 (항상 position보다 큼)
    reorder: BTreeMap<u64, Option<R>>,
}

impl<R> PipelineFetch<R> {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            position: 0,
            next_request: 0,
            outstanding: BTreeSet::new(),
            reorder: BTreeMap::new(),
        }
    }

    /// 모든 상태를 버리고 `start`부터 윈도우를 다시 채운다
    ///
    /// 반환값은 발행할 요청 번호 목록.
    pub fn reset(&mut self, start: u64) -> Vec<u64> {
        self.outstanding.clear();
        self.reorder.clear();
        self.position = start;
        self.next_request = start;

        let mut issue = Vec::with_capacity(self.window);
        self.refill(&mut issue);
        issue
    }

    /// 번호 `n`의 응답 도착
    pub fn put(&mut self, n: u64, response: R) -> PipelineOutcome<R> {
        self.complete(n, Some(response))
    }

    /// 번호 `n` 최종 실패 (순서상 deliver(n, None)과 동일)
    pub fn timeout(&mut self, n: u64) -> PipelineOutcome<R> {
        self.complete(n, None)
    }

    /// 윈도우 변경 (다음 보충 시점부터 반영)
    pub fn set_window(&mut self, window: usize) {
        self.window = window.max(1);
    }

    /// 현재 윈도우
    pub fn window(&self) -> usize {
        self.window
    }

    /// outstanding 요청 수
    pub fn pipeline_size(&self) -> usize {
        self.outstanding.len()
    }

    /// 현재 커서
    pub fn position(&self) -> u64 {
        self.position
    }

    fn complete(&mut self, n: u64, response: Option<R>) -> PipelineOutcome<R> {
        if !self.outstanding.remove(&n) {
            // 늦게 도착한 중복/리셋 이전 응답
            debug!("파이프라인 외 응답 무시: seq={}", n);
            return PipelineOutcome::empty();
        }

        let mut outcome = PipelineOutcome::empty();

        if n == self.position {
            outcome.delivered.push((n, response));
            self.position += 1;

            // 연속된 재정렬 버퍼 배출
            while let Some(buffered) = self.reorder.remove(&self.position) {
                outcome.delivered.push((self.position, buffered));
                self.position += 1;
            }
        } else if n > self.position {
            self.reorder.insert(n, response);
        }

        self.refill(&mut outcome.issue);
        outcome
    }

    fn refill(&mut self, issue: &mut Vec<u64>) {
        while self.outstanding.len() < self.window {
            let n = self.next_request;
            self.outstanding.insert(n);
            issue.push(n);
            self.next_request += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_fills_window() {
        let mut p: PipelineFetch<&str> = PipelineFetch::new(3);
        assert_eq!(p.reset(0), vec![0, 1, 2]);
        assert_eq!(p.pipeline_size(), 3);
        assert_eq!(p.position(), 0);

        // 임의 위치에서 재시작
        assert_eq!(p.reset(10), vec![10, 11, 12]);
        assert_eq!(p.position(), 10);
    }

    #[test]
    fn test_out_of_order_delivery() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(3);
        p.reset(0);

        // 2, 1 먼저 도착 → 전달 보류, 윈도우는 보충
        let o2 = p.put(2, 200);
        assert!(o2.delivered.is_empty());
        assert_eq!(o2.issue, vec![3]);

        let o1 = p.put(1, 100);
        assert!(o1.delivered.is_empty());
        assert_eq!(o1.issue, vec![4]);

        // 0 도착 → 0,1,2 순서대로 한꺼번에 전달
        let o0 = p.put(0, 0);
        assert_eq!(
            o0.delivered,
            vec![(0, Some(0)), (1, Some(100)), (2, Some(200))]
        );
        assert_eq!(o0.issue, vec![5]);
        assert_eq!(p.position(), 3);
        assert_eq!(p.pipeline_size(), 3);
    }

    #[test]
    fn test_timeout_at_position_unblocks() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(2);
        p.reset(0);

        let o1 = p.put(1, 100);
        assert!(o1.delivered.is_empty());

        // position의 슬롯 포기 → 틈을 건너뛰고 버퍼된 후속 전달
        let o0 = p.timeout(0);
        assert_eq!(o0.delivered, vec![(0, None), (1, Some(100))]);
        assert_eq!(p.position(), 2);
        assert_eq!(p.pipeline_size(), 2);
    }

    #[test]
    fn test_one_refill_per_completion() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(4);
        p.reset(0);

        for n in 0..4u64 {
            let o = p.put(n, n as u32);
            assert_eq!(o.issue.len(), 1, "seq {}", n);
            assert_eq!(p.pipeline_size(), 4);
        }
    }

    #[test]
    fn test_stale_response_ignored() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(2);
        p.reset(0);
        p.put(0, 0);

        // 이미 해결된 번호 재도착
        let stale = p.put(0, 1);
        assert!(stale.delivered.is_empty());
        assert!(stale.issue.is_empty());

        // 리셋 이전 번호
        p.reset(100);
        let old = p.put(2, 2);
        assert!(old.delivered.is_empty());
        assert!(old.issue.is_empty());
    }

    #[test]
    fn test_window_change_applies_on_refill() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(2);
        p.reset(0);

        p.set_window(4);
        assert_eq!(p.pipeline_size(), 2); // 동기 반영 없음

        let o = p.put(0, 0);
        assert_eq!(o.issue, vec![2, 3, 4]); // 보충 시점에 확장
        assert_eq!(p.pipeline_size(), 4);

        p.set_window(1);
        let o = p.put(1, 1);
        assert!(o.issue.is_empty()); // 축소: 자연 소진 대기
        assert_eq!(p.pipeline_size(), 3);
    }

    // 재정렬 버퍼는 position보다 큰 번호만 담는다
    #[test]
    fn test_reorder_buffer_invariant() {
        let mut p: PipelineFetch<u32> = PipelineFetch::new(4);
        p.reset(0);

        p.put(3, 3);
        p.put(1, 1);
        for &k in p.reorder.keys() {
            assert!(k > p.position());
        }

        p.put(0, 0);
        for &k in p.reorder.keys() {
            assert!(k > p.position());
        }
    }
}
