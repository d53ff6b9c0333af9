//! 세그먼트 코덱
//!
//! - Segment: 미디어 버퍼 1개의 와이어 인코딩 (20바이트 헤더 + 페이로드)
//! - Packet: 네트워크 전송 단위 (4바이트 헤더 + Segment 연접/분할)
//! - 손실 허용 재조립: 손실 직후 버퍼 1개만 불연속으로 표시

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::media::MediaBuffer;
use crate::{Error, Result, PACKET_HDR_LEN, SEGMENT_HDR_LEN};

/// 패킷 헤더 (big-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// 이 배치를 끝내는 데 더 필요한 패킷 수 (0 = 마지막)
    pub chunks_remaining: u8,

    /// 수신측 누적 버퍼에서 새 요소가 시작되는 바이트 오프셋
    pub element_offset: u16,

    /// 이 패킷이 새로 기여하는 세그먼트 수
    pub element_count: u8,
}

impl PacketHeader {
    /// 헤더를 버퍼 앞에 기록
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.chunks_remaining);
        buf.put_u16(self.element_offset);
        buf.put_u8(self.element_count);
    }

    /// 패킷 선두에서 헤더 파싱
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < PACKET_HDR_LEN {
            return None;
        }
        Some(Self {
            chunks_remaining: data[0],
            element_offset: u16::from_be_bytes([data[1], data[2]]),
            element_count: data[3],
        })
    }
}

/// 세그먼트 코덱 (인코더/디코더 겸용, 단일 스레드 소유)
pub struct Segmenter {
    /// 패킷 최대 크기 (헤더 포함)
    max_size: usize,

    /// 패킷당 페이로드 예산
    max_payload: usize,

    /// 누적 버퍼 (인코딩: 미전송 내용 / 디코딩: 재조립 중 내용)
    content: BytesMut,

    /// 미완 요소 수
    pending: u64,

    /// 다음 패킷 헤더에 실릴 요소 시작 오프셋 (인코더측)
    element_offset: u16,

    /// 손실 복구 중 여부 (디코더측)
    lost: bool,
}

impl Segmenter {
    /// 새 코덱 생성. `max_size`는 헤더를 포함한 패킷 크기 상한.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > PACKET_HDR_LEN, "max_size가 패킷 헤더보다 작음");
        let max_payload = max_size - PACKET_HDR_LEN;
        assert!(
            max_payload <= u16::MAX as usize,
            "max_size가 element_offset 표현 범위를 넘음"
        );
        Self {
            max_size,
            max_payload,
            content: BytesMut::new(),
            pending: 0,
            element_offset: 0,
            lost: false,
        }
    }

    /// 미디어 버퍼를 Segment 바이트로 인코딩
    pub fn buffer_to_segment(buffer: &MediaBuffer) -> Bytes {
        let mut out = BytesMut::with_capacity(SEGMENT_HDR_LEN + buffer.data.len());
        out.put_u32(buffer.data.len() as u32);
        out.put_u64(buffer.timestamp_ns);
        out.put_u64(buffer.duration_ns);
        out.extend_from_slice(&buffer.data);
        out.freeze()
    }

    /// `offset` 위치에서 Segment 1개 파싱 시도
    ///
    /// 헤더나 페이로드가 모자라면 None (에러 아님, 다음 패킷 대기).
    pub fn segment_to_buffer(content: &[u8], offset: usize) -> Option<(MediaBuffer, usize)> {
        let rest = content.get(offset..)?;
        if rest.len() < SEGMENT_HDR_LEN {
            return None;
        }

        let size = u32::from_be_bytes(rest[0..4].try_into().unwrap()) as usize;
        let timestamp_ns = u64::from_be_bytes(rest[4..12].try_into().unwrap());
        let duration_ns = u64::from_be_bytes(rest[12..20].try_into().unwrap());

        let end = SEGMENT_HDR_LEN.checked_add(size)?;
        if rest.len() < end {
            return None;
        }

        let buffer = MediaBuffer::new(
            Bytes::copy_from_slice(&rest[SEGMENT_HDR_LEN..end]),
            timestamp_ns,
            duration_ns,
        );
        Some((buffer, offset + end))
    }

    /// 버퍼 인코딩 (누적/패킹 경로)
    ///
    /// - `start_fresh`: 누적분이 있으면 먼저 마지막 패킷으로 밀어낸다
    /// - `flush`: 이번 버퍼까지 포함해 전부 내보낸다
    ///
    /// 생성된 패킷은 `emit`으로 순서대로 전달된다.
    pub fn encode(
        &mut self,
        buffer: &MediaBuffer,
        start_fresh: bool,
        flush: bool,
        emit: &mut dyn FnMut(Bytes),
    ) {
        if start_fresh && !self.content.is_empty() {
            self.emit_packet(0, None, emit);
        }

        let segment = Self::buffer_to_segment(buffer);
        self.content.extend_from_slice(&segment);
        self.pending += 1;

        // 두 패킷 이상 필요한 동안은 앞에서부터 꽉 채워 내보낸다
        let mut chunks = (self.content.len() + self.max_payload - 1) / self.max_payload;
        while chunks >= 2 {
            let size = self.max_payload.min(self.content.len());
            chunks -= 1;
            self.emit_packet(chunks as u8, Some(size), emit);
        }
        debug_assert_eq!(chunks, 1);

        // 정확히 한 패킷 분량: 누적분이 패킷 상한(헤더 포함)과 일치하거나
        // flush 요청 시에만 내보내고, 아니면 다음 버퍼와 합쳐 보내는
        // 패킹 최적화를 위해 보류한다. 페이로드 예산과 같은 꼬리도 보류 대상.
        if self.content.len() == self.max_size || flush {
            self.emit_packet(0, None, emit);
        }
    }

    /// 버퍼 1개를 자체 완결 패킷 런으로 분할 (누적 상태 무시)
    pub fn encode_standalone(&mut self, buffer: &MediaBuffer, emit: &mut dyn FnMut(Bytes)) {
        let segment = Self::buffer_to_segment(buffer);
        let mut chunks = (segment.len() + self.max_payload - 1) / self.max_payload;

        let mut off = 0;
        let mut first = true;
        while off < segment.len() {
            let size = self.max_payload.min(segment.len() - off);
            chunks -= 1;

            let header = PacketHeader {
                chunks_remaining: chunks as u8,
                element_offset: 0,
                // 요소의 바이트가 시작되는 패킷이 요소를 기여한다
                element_count: if first { 1 } else { 0 },
            };

            let mut packet = BytesMut::with_capacity(PACKET_HDR_LEN + size);
            header.write_to(&mut packet);
            packet.extend_from_slice(&segment[off..off + size]);
            emit(packet.freeze());

            off += size;
            first = false;
        }
        debug_assert_eq!(chunks, 0);
    }

    /// 패킷 디코딩, 완성된 버퍼는 `emit`으로 전달
    ///
    /// 손실 복구 중 첫 패킷의 element_offset만큼 선두 바이트를 버린다
    /// (유실된 요소의 꼬리). 그 외에는 오프셋을 신뢰하지 않는다.
    pub fn decode(&mut self, packet: &[u8], emit: &mut dyn FnMut(MediaBuffer)) -> Result<()> {
        let header = match PacketHeader::parse(packet) {
            Some(h) => h,
            None => {
                warn!("패킷이 헤더보다 짧음: {} bytes", packet.len());
                return Ok(());
            }
        };

        let payload = &packet[PACKET_HDR_LEN..];
        let skip = if self.lost && self.content.is_empty() {
            (header.element_offset as usize).min(payload.len())
        } else {
            0
        };

        self.content.extend_from_slice(&payload[skip..]);
        self.pending += header.element_count as u64;

        let mut off = 0;
        while self.pending > 0 {
            let (mut buffer, end) = match Self::segment_to_buffer(&self.content, off) {
                Some(parsed) => parsed,
                None => break, // 미완성, 다음 패킷 대기
            };

            if self.lost {
                buffer.discontinuity = true;
                self.lost = false;
            }

            emit(buffer);
            self.pending -= 1;
            off = end;
        }

        // 진행 중 배치에는 부분 수신 요소가 최대 1개만 존재한다
        if !((header.chunks_remaining > 0 && self.pending == 1) || self.pending == 0) {
            return Err(Error::ReassemblyInvariant {
                chunks_remaining: header.chunks_remaining,
                pending: self.pending,
            });
        }

        self.content.advance(off);
        Ok(())
    }

    /// 손실 통보: 재조립 상태를 버리고 다음 버퍼를 불연속으로 표시
    pub fn mark_lost(&mut self) {
        self.lost = true;
        self.content.clear();
        self.pending = 0;
    }

    /// 누적/재조립 버퍼 크기
    pub fn buffered_bytes(&self) -> usize {
        self.content.len()
    }

    /// 미완 요소 수
    pub fn pending_elements(&self) -> u64 {
        self.pending
    }

    fn emit_packet(&mut self, chunks_remaining: u8, size: Option<usize>, emit: &mut dyn FnMut(Bytes)) {
        let size = size.unwrap_or(self.content.len());

        let header = PacketHeader {
            chunks_remaining,
            element_offset: self.element_offset,
            element_count: self.pending.min(u8::MAX as u64) as u8,
        };

        let mut packet = BytesMut::with_capacity(PACKET_HDR_LEN + size);
        header.write_to(&mut packet);
        packet.extend_from_slice(&self.content[..size]);
        emit(packet.freeze());

        self.content.advance(size);
        // 꼬리가 u16 범위를 넘는 경우는 요소 시작이 없는 연속 패킷뿐이다.
        // 포화값이 페이로드 길이를 넘으면 디코더는 페이로드 전체를 건너뛴다.
        self.element_offset = u16::try_from(self.content.len()).unwrap_or(u16::MAX);
        self.pending = 0;
    }
}
