//! 서브스크라이버 (소비자측)
//!
//! - 윈도우 파이프라인으로 세그먼트 fetch, 순서 보장 디코딩
//! - 타임아웃 재시도 / 예산 소진 시 드랍 + 불연속 표시
//! - 프레임 인덱스 질의로 탐색(seek)과 길이 탐지
//!
//! 프로토콜 상태(코덱, 파이프라인, 네트워크 핸들)는 워커 스레드가
//! 단독 소유한다. 호출자와는 명령 큐(용량 2)와 출력 큐(용량 2×window)
//! 두 개로만 통신하며 락은 쓰지 않는다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::face::{ChildSelector, ExclusionFilter, Face, FaceEvent, FaceWaker, Interest};
use crate::media::{BufferStatus, MediaBuffer, MediaReceiver};
use crate::name::Name;
use crate::pipeline::{PipelineFetch, PipelineOutcome};
use crate::segmenter::Segmenter;
use crate::stats::{Counters, SubscriberStats};
use crate::{Config, ContentObject, Error, Result};

/// 호출자 → 워커 명령
enum Command {
    /// 타임스탬프(나노초)로 탐색
    Seek(u64),

    /// 윈도우 변경 (다음 보충 시점 반영)
    SetWindow(usize),
}

/// 서브스크라이버 핸들 (호출자 스레드용)
pub struct Subscriber<F: Face + Send + 'static> {
    config: Config,
    base: Name,

    /// 워커 시작 전까지 보관되는 네트워크 핸들
    face: Option<F>,

    waker: Option<Arc<dyn FaceWaker>>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,

    /// 캐시된 포맷 디스크립터 (호출자 스레드에서만 갱신)
    stream_info: Mutex<Option<Bytes>>,

    cmd_tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl<F: Face + Send + 'static> Subscriber<F> {
    /// 새 서브스크라이버 생성 (start 전까지 네트워크 동작 없음)
    pub fn new(face: F, base: Name, config: Config) -> Self {
        Self {
            counters: Arc::new(Counters::new(config.window)),
            config,
            base,
            face: Some(face),
            waker: None,
            running: Arc::new(AtomicBool::new(false)),
            stream_info: Mutex::new(None),
            cmd_tx: None,
            worker: None,
        }
    }

    /// 포맷 디스크립터 조회 (캐시됨)
    ///
    /// 실패는 치명적이다: 디스크립터 없이는 스트림을 해석할 수 없다.
    pub fn fetch_stream_info(&mut self) -> Result<Bytes> {
        if let Some(info) = self.stream_info.lock().clone() {
            return Ok(info);
        }

        let face = self.face.as_mut().ok_or(Error::AlreadyRunning)?;
        let name = self.base.append_str("stream_info");
        debug!("stream_info 조회: {}", name);

        let interest = Interest::new().with_lifetime(self.config.interest_lifetime_ms);
        let object = face
            .get(&name, &interest, self.config.interest_lifetime_ms)?
            .ok_or_else(|| Error::StreamInfoUnavailable {
                name: name.to_string(),
            })?;

        *self.stream_info.lock() = Some(object.content.clone());
        Ok(object.content)
    }

    /// 캐시된 포맷 디스크립터
    pub fn stream_info(&self) -> Option<Bytes> {
        self.stream_info.lock().clone()
    }

    /// 워커 시작, 출력 큐 수신기 반환
    pub fn start(&mut self) -> Result<MediaReceiver> {
        if self.worker.is_some() {
            return Err(Error::AlreadyRunning);
        }

        // 디스크립터 없이는 시작하지 않는다
        self.fetch_stream_info()?;

        let face = self.face.take().ok_or(Error::AlreadyRunning)?;
        self.waker = Some(face.waker());

        let (cmd_tx, cmd_rx) = bounded::<Command>(2);
        let (out_tx, out_rx) = bounded(self.config.output_queue_capacity());
        self.cmd_tx = Some(cmd_tx);
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            name_segments: self.base.append_str("segments"),
            name_frames: self.base.append_str("index"),
            segmenter: Segmenter::new(self.config.packet_max_size),
            pipeline: PipelineFetch::new(self.config.window),
            retry_budget: HashMap::new(),
            seek_pending: false,
            duration_last: None,
            config: self.config.clone(),
            face,
            out_tx,
            cmd_rx,
            running: self.running.clone(),
            counters: self.counters.clone(),
        };

        info!("서브스크라이버 시작: base={}", self.base);

        let handle = std::thread::Builder::new()
            .name("nmt-subscriber".into())
            .spawn(move || worker.run())?;
        self.worker = Some(handle);

        Ok(out_rx)
    }

    /// 워커 정지 및 합류
    ///
    /// 블로킹 중인 네트워크 대기를 깨워 즉시 종료시킨다.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(waker) = &self.waker {
            waker.wake();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.cmd_tx = None;
    }

    /// 타임스탬프로 탐색
    pub fn seek(&self, timestamp_ns: u64) -> Result<()> {
        self.send_command(Command::Seek(timestamp_ns))
    }

    /// 윈도우 변경
    pub fn set_window(&self, window: usize) -> Result<()> {
        self.send_command(Command::SetWindow(window))
    }

    /// 상태 스냅샷
    pub fn get_status(&self) -> SubscriberStats {
        self.counters.snapshot()
    }

    /// 탐지된 스트림 길이 (나노초)
    pub fn duration_ns(&self) -> u64 {
        self.get_status().duration_ns
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send_command(&self, cmd: Command) -> Result<()> {
        let tx = self.cmd_tx.as_ref().ok_or(Error::NotRunning)?;
        tx.send(cmd).map_err(|_| Error::ChannelClosed)?;

        // 긴 poll에 묶이지 않도록 워커를 깨운다
        if let Some(waker) = &self.waker {
            waker.wake();
        }
        Ok(())
    }
}

/// 워커 내부 상태 (워커 스레드 단독 소유)
struct Worker<F: Face> {
    config: Config,
    face: F,
    name_segments: Name,
    name_frames: Name,
    segmenter: Segmenter,
    pipeline: PipelineFetch<ContentObject>,

    /// 세그먼트 번호 → 남은 재시도 예산
    retry_budget: HashMap<u64, u32>,

    /// 탐색 직후 첫 출력 버퍼에 불연속 상태 부착
    seek_pending: bool,

    /// 길이 탐지에서 마지막으로 본 인덱스 컴포넌트
    duration_last: Option<Bytes>,

    out_tx: Sender<(BufferStatus, MediaBuffer)>,
    cmd_rx: Receiver<Command>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<F: Face> Worker<F> {
    fn run(mut self) {
        debug!("수신 워커 시작");
        self.check_duration();

        let issue = self.pipeline.reset(0);
        self.issue_interests(issue);

        let mut iter = 0u32;
        while self.running.load(Ordering::SeqCst) {
            if iter > 5 {
                iter = 0;
                self.check_duration();
            }

            let events = match self.face.run_for(self.config.poll_interval_ms) {
                Ok(events) => events,
                Err(e) => {
                    warn!("이벤트 루프 에러: {}", e);
                    Vec::new()
                }
            };

            for event in events {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.handle_event(event) {
                    // 재조립 불변식 위반은 프로토콜 결함: 스트림 처리 중단
                    error!("스트림 처리 중단: {}", e);
                    self.running.store(false, Ordering::SeqCst);
                    return;
                }
            }

            self.process_commands();
            self.publish_counters();
            iter += 1;
        }

        debug!("수신 워커 종료");
    }

    /// 네트워크 이벤트 상태 전이
    fn handle_event(&mut self, event: FaceEvent) -> Result<()> {
        match event {
            FaceEvent::ContentArrived(object) => {
                let n = match segment_number(&object.name) {
                    Some(n) => n,
                    None => {
                        warn!("세그먼트 번호 없는 응답 무시: {}", object.name);
                        return Ok(());
                    }
                };

                self.retry_budget.remove(&n);
                let outcome = self.pipeline.put(n, object);
                self.apply_outcome(outcome)
            }

            FaceEvent::TimedOut(name) => {
                let n = match segment_number(&name) {
                    Some(n) => n,
                    None => return Ok(()),
                };
                self.handle_timeout(n, name)
            }

            FaceEvent::Unverified(object) => {
                // 데이터도 실패도 아님: 재검증을 위해 다시 요청
                debug!("미검증 응답, 재요청: {}", object.name);
                let interest = Interest::new().with_lifetime(self.config.interest_lifetime_ms);
                if let Err(e) = self.face.express_interest(&object.name, &interest) {
                    warn!("재검증 요청 실패: {}", e);
                }
                Ok(())
            }
        }
    }

    fn handle_timeout(&mut self, n: u64, name: Name) -> Result<()> {
        match self.retry_budget.get_mut(&n) {
            Some(budget) if *budget > 0 => {
                // 예산 내 재발행: 윈도우 슬롯은 유지
                *budget -= 1;
                self.counters.retries.fetch_add(1, Ordering::Relaxed);

                let interest = Interest::new().with_lifetime(self.config.interest_lifetime_ms);
                if let Err(e) = self.face.express_interest(&name, &interest) {
                    warn!("재발행 실패: seq={}, {}", n, e);
                }
                Ok(())
            }
            Some(_) => {
                debug!("세그먼트 {} 포기", n);
                self.retry_budget.remove(&n);
                self.counters.drops.fetch_add(1, Ordering::Relaxed);

                let outcome = self.pipeline.timeout(n);
                self.apply_outcome(outcome)
            }
            None => {
                // 리셋 이전 Interest의 잔류 타임아웃
                debug!("무효 타임아웃 무시: seq={}", n);
                Ok(())
            }
        }
    }

    /// 파이프라인 전이 결과 반영: 순서대로 디코딩, 윈도우 보충
    fn apply_outcome(&mut self, outcome: PipelineOutcome<ContentObject>) -> Result<()> {
        for (n, response) in outcome.delivered {
            match response {
                Some(object) => {
                    let mut decoded = Vec::new();
                    self.segmenter
                        .decode(&object.content, &mut |b| decoded.push(b))?;
                    for buffer in decoded {
                        self.push(buffer);
                    }
                }
                None => {
                    debug!("세그먼트 {} 건너뜀, 손실 처리", n);
                    self.segmenter.mark_lost();
                }
            }
        }

        self.issue_interests(outcome.issue);
        Ok(())
    }

    fn issue_interests(&mut self, numbers: Vec<u64>) {
        for n in numbers {
            let name = self.name_segments.append_segment(n);
            self.retry_budget.insert(n, self.config.interest_retries);

            let interest = Interest::new().with_lifetime(self.config.interest_lifetime_ms);
            if let Err(e) = self.face.express_interest(&name, &interest) {
                warn!("Interest 발행 실패: seq={}, {}", n, e);
            }
        }
    }

    /// 틱당 명령 1개 처리
    fn process_commands(&mut self) {
        match self.cmd_rx.try_recv() {
            Ok(Command::Seek(ns)) => self.seek_to(ns),
            Ok(Command::SetWindow(window)) => {
                self.pipeline.set_window(window);
                self.counters
                    .window
                    .store(window as u64, Ordering::Relaxed);
            }
            Err(_) => {}
        }
    }

    fn seek_to(&mut self, timestamp_ns: u64) {
        let (index_ts, segment) = match self.fetch_seek_query(timestamp_ns) {
            Some(found) => found,
            None => return,
        };

        info!("탐색: ts={} -> segment={} (index={})", timestamp_ns, segment, index_ts);

        self.seek_pending = true;
        self.segmenter.mark_lost();
        self.retry_budget.clear();

        let issue = self.pipeline.reset(segment);
        self.issue_interests(issue);
    }

    /// `timestamp_ns` 이하의 가장 큰 프레임 인덱스 항목 조회 (무한 재시도)
    fn fetch_seek_query(&mut self, timestamp_ns: u64) -> Option<(u64, u64)> {
        let mut exclude = ExclusionFilter::new();
        exclude.add_component(Name::number_to_component(timestamp_ns.saturating_add(1)));
        exclude.add_any();

        let interest = Interest::new()
            .with_lifetime(self.config.interest_lifetime_ms)
            .with_child_selector(ChildSelector::Rightmost)
            .with_exclude(exclude);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return None;
            }

            match self
                .face
                .get(&self.name_frames, &interest, self.config.interest_lifetime_ms)
            {
                Ok(Some(object)) => {
                    let index_ts = object.name.last().and_then(|c| Name::component_to_number(c));
                    let segment = std::str::from_utf8(&object.content)
                        .ok()
                        .and_then(|s| s.trim().parse::<u64>().ok());

                    match (index_ts, segment) {
                        (Some(ts), Some(segment)) => return Some((ts, segment)),
                        _ => {
                            warn!("잘못된 인덱스 항목: {}", object.name);
                            return None;
                        }
                    }
                }
                Ok(None) => {
                    debug!("탐색 타임아웃, 재시도: ts={}", timestamp_ns);
                }
                Err(e) => {
                    warn!("탐색 질의 에러: {}", e);
                    return None;
                }
            }
        }
    }

    /// 길이 탐지: 이미 아는 항목과 그 이전을 제외한 최대 인덱스 조회
    fn check_duration(&mut self) {
        let mut interest = Interest::new()
            .with_lifetime(self.config.duration_probe_timeout_ms)
            .with_child_selector(ChildSelector::Rightmost);

        if let Some(last) = &self.duration_last {
            let mut exclude = ExclusionFilter::new();
            exclude.add_any();
            exclude.add_component(last.clone());
            interest = interest.with_exclude(exclude);
        }

        match self
            .face
            .get(&self.name_frames, &interest, self.config.duration_probe_timeout_ms)
        {
            Ok(Some(object)) => {
                if let Some(component) = object.name.last() {
                    self.duration_last = Some(component.clone());
                }
            }
            Ok(None) => {
                // 타임아웃: 캐시된 값 유지
                debug!("길이 질의 응답 없음");
            }
            Err(e) => warn!("길이 질의 에러: {}", e),
        }

        if let Some(ts) = self
            .duration_last
            .as_ref()
            .and_then(|c| Name::component_to_number(c))
        {
            self.counters.duration_ns.store(ts, Ordering::Relaxed);
        }
    }

    /// 출력 큐에 버퍼 투입 (백프레셔, 종료 시에만 폐기)
    fn push(&mut self, buffer: MediaBuffer) {
        let status = if self.seek_pending {
            self.seek_pending = false;
            BufferStatus::DiscontinuityFollows
        } else {
            BufferStatus::Normal
        };

        let timeout = Duration::from_millis(self.config.push_retry_timeout_ms);
        let mut item = (status, buffer);

        loop {
            match self.out_tx.send_timeout(item, timeout) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        // 종료 우선: 버퍼 폐기
                        break;
                    }
                    item = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => break,
            }
        }
    }

    fn publish_counters(&self) {
        self.counters
            .position
            .store(self.pipeline.position(), Ordering::Relaxed);
        self.counters
            .outstanding
            .store(self.pipeline.pipeline_size() as u64, Ordering::Relaxed);
        self.counters
            .window
            .store(self.pipeline.window() as u64, Ordering::Relaxed);
    }
}

/// 이름 마지막 컴포넌트에서 세그먼트 번호 추출
fn segment_number(name: &Name) -> Option<u64> {
    name.last().and_then(|c| Name::component_to_number(c))
}
