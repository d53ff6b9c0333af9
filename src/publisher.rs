//! 퍼블리셔 (생산자측)
//!
//! 라이브 스트림을 기본 이름 아래의 서명된 ContentObject 트리로 게시한다:
//! - base/key            공개키 (1회)
//! - base/stream_info    포맷 디스크립터 (최초 1회, first-write-wins)
//! - base/segments/<n>   패킷 바이트, n은 단조 증가
//! - base/index/<ts>     타임스탬프 → 세그먼트 번호 (ASCII 십진수)

use bytes::Bytes;
use tracing::{debug, info};

use crate::face::{Publish, Signer};
use crate::media::MediaBuffer;
use crate::name::Name;
use crate::segmenter::Segmenter;
use crate::{Config, Result};

/// 버퍼별 패킷화 정책: (start_fresh, flush) 결정
///
/// 스트림 특성에 따라 재정의한다 (예: 키프레임에서만 fresh).
pub trait PublishPolicy: Send {
    fn pre_process(&mut self, buffer: &MediaBuffer) -> (bool, bool);
}

/// 기본 정책: 버퍼마다 독립 패킷 런
pub struct FreshFlush;

impl PublishPolicy for FreshFlush {
    fn pre_process(&mut self, _buffer: &MediaBuffer) -> (bool, bool) {
        (true, true)
    }
}

/// 퍼블리셔
pub struct Publisher<P: Publish, S: Signer> {
    /// 네트워크 게시 핸들
    publisher: P,

    /// 서명 협력자
    signer: S,

    /// 기본 이름
    base: Name,

    /// base/segments
    name_segments: Name,

    /// base/index
    name_frames: Name,

    /// 세그먼트 코덱
    segmenter: Segmenter,

    /// 다음 세그먼트 번호
    segment: u64,

    /// 캐시된 포맷 디스크립터
    stream_info: Option<Bytes>,

    /// 패킷화 정책
    policy: Box<dyn PublishPolicy>,
}

impl<P: Publish, S: Signer> Publisher<P, S> {
    /// 새 퍼블리셔 생성, 공개키를 base/key에 1회 게시
    pub fn new(mut publisher: P, signer: S, base: Name, config: &Config) -> Result<Self> {
        let name_key = base.append_str("key");
        let key_object = signer.sign(name_key, signer.public_key_der());
        publisher.put(key_object)?;

        info!("퍼블리셔 시작: base={}", base);

        Ok(Self {
            name_segments: base.append_str("segments"),
            name_frames: base.append_str("index"),
            segmenter: Segmenter::new(config.packet_max_size),
            publisher,
            signer,
            base,
            segment: 0,
            stream_info: None,
            policy: Box::new(FreshFlush),
        })
    }

    /// 패킷화 정책 교체 (빌더)
    pub fn with_policy(mut self, policy: impl PublishPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// 포맷 디스크립터 설정 (멱등, 최초 호출만 게시)
    pub fn set_format(&mut self, descriptor: impl Into<Bytes>) -> Result<()> {
        if self.stream_info.is_some() {
            return Ok(());
        }

        let descriptor = descriptor.into();
        let name = self.base.append_str("stream_info");
        let object = self.signer.sign(name, descriptor.clone());
        self.publisher.put(object)?;
        self.stream_info = Some(descriptor);

        Ok(())
    }

    /// 미디어 버퍼 게시
    pub fn publish(&mut self, buffer: &MediaBuffer) -> Result<()> {
        let (start_fresh, flush) = self.policy.pre_process(buffer);

        let mut packets = Vec::new();
        self.segmenter
            .encode(buffer, start_fresh, flush, &mut |p| packets.push(p));

        self.send_packets(packets)
    }

    /// 버퍼 1개를 자체 완결 패킷 런으로 게시
    pub fn publish_standalone(&mut self, buffer: &MediaBuffer) -> Result<()> {
        let mut packets = Vec::new();
        self.segmenter
            .encode_standalone(buffer, &mut |p| packets.push(p));

        self.send_packets(packets)
    }

    /// 프레임 인덱스 항목 게시: base/index/<ts> → 세그먼트 번호
    pub fn publish_frame_index(&mut self, frame_timestamp_ns: u64, segment: u64) -> Result<()> {
        let name = self
            .name_frames
            .append(Name::number_to_component(frame_timestamp_ns));
        let content = Bytes::from(segment.to_string());

        let object = self.signer.sign(name, content);
        self.publisher.put(object)?;

        debug!("인덱스 게시: ts={} -> segment={}", frame_timestamp_ns, segment);
        Ok(())
    }

    /// 다음에 게시될 세그먼트 번호
    pub fn current_segment(&self) -> u64 {
        self.segment
    }

    /// 캐시된 포맷 디스크립터
    pub fn stream_info(&self) -> Option<&Bytes> {
        self.stream_info.as_ref()
    }

    fn send_packets(&mut self, packets: Vec<Bytes>) -> Result<()> {
        for packet in packets {
            let name = self.name_segments.append_segment(self.segment);
            self.segment += 1;

            let object = self.signer.sign(name, packet);
            self.publisher.put(object)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::ContentObject;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// 게시 기록용 핸들
    #[derive(Clone, Default)]
    struct RecordingPublish {
        objects: Rc<RefCell<Vec<ContentObject>>>,
    }

    impl Publish for RecordingPublish {
        fn put(&mut self, object: ContentObject) -> Result<()> {
            self.objects.borrow_mut().push(object);
            Ok(())
        }
    }

    /// crc32를 서명으로 쓰는 테스트 서명자
    struct TestSigner;

    impl Signer for TestSigner {
        fn sign(&self, name: Name, content: Bytes) -> ContentObject {
            let signature = Bytes::from(crc32fast::hash(&content).to_be_bytes().to_vec());
            ContentObject {
                name,
                content,
                signature,
                key_locator: Name::from_uri("/test/key"),
            }
        }

        fn public_key_der(&self) -> Bytes {
            Bytes::from_static(b"test-der-key")
        }
    }

    fn make_publisher(
        store: &RecordingPublish,
    ) -> Publisher<RecordingPublish, TestSigner> {
        Publisher::new(
            store.clone(),
            TestSigner,
            Name::from_uri("/live/cam0"),
            &Config::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_key_published_on_construction() {
        let store = RecordingPublish::default();
        let _p = make_publisher(&store);

        let objects = store.objects.borrow();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name.to_string(), "/live/cam0/key");
        assert_eq!(objects[0].content, Bytes::from_static(b"test-der-key"));
    }

    #[test]
    fn test_set_format_idempotent() {
        let store = RecordingPublish::default();
        let mut p = make_publisher(&store);

        p.set_format(&b"video/h264"[..]).unwrap();
        p.set_format(&b"video/vp8"[..]).unwrap(); // 무시되어야 함

        let objects = store.objects.borrow();
        let infos: Vec<_> = objects
            .iter()
            .filter(|o| o.name.to_string() == "/live/cam0/stream_info")
            .collect();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].content, Bytes::from_static(b"video/h264"));
        assert_eq!(p.stream_info(), Some(&Bytes::from_static(b"video/h264")));
    }

    #[test]
    fn test_sequential_segment_names() {
        let store = RecordingPublish::default();
        let mut p = make_publisher(&store);

        for ts in 0..3u64 {
            p.publish(&MediaBuffer::new(vec![0u8; 100], ts, 1)).unwrap();
        }
        assert_eq!(p.current_segment(), 3);

        let objects = store.objects.borrow();
        let segments: Vec<_> = objects
            .iter()
            .filter(|o| o.name.starts_with(&Name::from_uri("/live/cam0/segments")))
            .collect();
        assert_eq!(segments.len(), 3);

        for (i, o) in segments.iter().enumerate() {
            let n = Name::component_to_number(o.name.last().unwrap()).unwrap();
            assert_eq!(n, i as u64);
        }
    }

    #[test]
    fn test_frame_index_entry() {
        let store = RecordingPublish::default();
        let mut p = make_publisher(&store);

        p.publish_frame_index(1_000_000_000, 42).unwrap();

        let objects = store.objects.borrow();
        let entry = objects.last().unwrap();
        assert!(entry.name.starts_with(&Name::from_uri("/live/cam0/index")));
        assert_eq!(
            Name::component_to_number(entry.name.last().unwrap()),
            Some(1_000_000_000)
        );
        assert_eq!(entry.content, Bytes::from_static(b"42"));
    }
}
