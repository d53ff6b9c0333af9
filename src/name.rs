//! 계층적 이름 정의
//!
//! - Name: 불투명 바이트 컴포넌트의 순서열
//! - 숫자 컴포넌트: 0x00 마커 + 최소 길이 big-endian (세그먼트 번호, 인덱스 타임스탬프 공용)
//! - 정렬: CCN canonical order (짧은 컴포넌트 우선, 이후 사전순)

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

/// 숫자 컴포넌트 마커 바이트
pub const NUMBER_MARKER: u8 = 0x00;

/// 계층적 이름 (불투명 컴포넌트 순서열)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<Bytes>,
}

impl Name {
    /// 빈 이름 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// URI 문자열에서 이름 생성 ("/live/cam0" 또는 "ndn:/live/cam0")
    pub fn from_uri(uri: &str) -> Self {
        let path = uri.strip_prefix("ndn:").unwrap_or(uri);
        let components = path
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| Bytes::from(percent_decode(c)))
            .collect();
        Self { components }
    }

    /// 컴포넌트 추가 (새 이름 반환)
    pub fn append(&self, component: impl Into<Bytes>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Self { components }
    }

    /// 문자열 컴포넌트 추가
    pub fn append_str(&self, component: &str) -> Self {
        self.append(Bytes::copy_from_slice(component.as_bytes()))
    }

    /// 숫자 세그먼트 컴포넌트 추가
    pub fn append_segment(&self, n: u64) -> Self {
        self.append(Self::number_to_component(n))
    }

    /// 컴포넌트 수
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// 빈 이름 여부
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// 컴포넌트 접근
    pub fn component(&self, i: usize) -> Option<&Bytes> {
        self.components.get(i)
    }

    /// 마지막 컴포넌트
    pub fn last(&self) -> Option<&Bytes> {
        self.components.last()
    }

    /// 접두사 여부 확인
    pub fn starts_with(&self, prefix: &Name) -> bool {
        prefix.components.len() <= self.components.len()
            && self.components[..prefix.components.len()] == prefix.components[..]
    }

    /// 숫자를 컴포넌트로 인코딩 (마커 + 최소 big-endian)
    pub fn number_to_component(n: u64) -> Bytes {
        let be = n.to_be_bytes();
        let skip = if n == 0 {
            8
        } else {
            be.iter().take_while(|&&b| b == 0).count()
        };
        let mut out = Vec::with_capacity(9 - skip);
        out.push(NUMBER_MARKER);
        out.extend_from_slice(&be[skip..]);
        Bytes::from(out)
    }

    /// 숫자 컴포넌트 디코딩 (마커 바이트 필수)
    pub fn component_to_number(component: &[u8]) -> Option<u64> {
        if component.is_empty() || component[0] != NUMBER_MARKER || component.len() > 9 {
            return None;
        }
        let mut n: u64 = 0;
        for &b in &component[1..] {
            n = (n << 8) | b as u64;
        }
        Some(n)
    }
}

/// 컴포넌트 canonical 비교 (길이 우선, 이후 사전순)
///
/// 마커 인코딩 숫자 컴포넌트에 대해 숫자 값 순서와 일치한다.
pub fn component_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match component_cmp(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/")?;
            for &b in c.iter() {
                // 출력 가능한 ASCII만 그대로, 나머지는 %XX
                if b.is_ascii_graphic() && b != b'%' && b != b'/' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "%{:02X}", b)?;
                }
            }
        }
        Ok(())
    }
}

fn percent_decode(s: &str) -> Vec<u8> {
    let raw = s.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if let (Some(h), Some(l)) = (
                raw.get(i + 1).and_then(|&c| (c as char).to_digit(16)),
                raw.get(i + 2).and_then(|&c| (c as char).to_digit(16)),
            ) {
                out.push((h * 16 + l) as u8);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_component_roundtrip() {
        for n in [0u64, 1, 255, 256, 0x1234_5678, u64::MAX] {
            let c = Name::number_to_component(n);
            assert_eq!(c[0], NUMBER_MARKER);
            assert_eq!(Name::component_to_number(&c), Some(n));
        }

        // 0은 마커 단독
        assert_eq!(Name::number_to_component(0).as_ref(), &[0x00]);
        assert_eq!(Name::number_to_component(1).as_ref(), &[0x00, 0x01]);
    }

    #[test]
    fn test_number_component_rejects_garbage() {
        assert_eq!(Name::component_to_number(b""), None);
        assert_eq!(Name::component_to_number(b"abc"), None);
        // 9바이트 초과 (u64 범위 밖)
        assert_eq!(Name::component_to_number(&[0u8; 10]), None);
    }

    #[test]
    fn test_canonical_order_matches_numeric() {
        let mut numbers = vec![0u64, 1, 17, 255, 256, 65535, 65536, 1 << 40];
        let mut components: Vec<Bytes> =
            numbers.iter().map(|&n| Name::number_to_component(n)).collect();

        components.sort_by(|a, b| component_cmp(a, b));
        numbers.sort_unstable();

        let decoded: Vec<u64> = components
            .iter()
            .map(|c| Name::component_to_number(c).unwrap())
            .collect();
        assert_eq!(decoded, numbers);
    }

    #[test]
    fn test_uri_roundtrip() {
        let name = Name::from_uri("ndn:/live/cam0");
        assert_eq!(name.len(), 2);
        assert_eq!(name.to_string(), "/live/cam0");

        let seg = name.append_segment(7);
        assert_eq!(seg.to_string(), "/live/cam0/%00%07");
        assert_eq!(Name::component_to_number(seg.last().unwrap()), Some(7));
    }

    #[test]
    fn test_starts_with() {
        let base = Name::from_uri("/live/cam0");
        let child = base.append_str("segments").append_segment(3);
        assert!(child.starts_with(&base));
        assert!(!base.starts_with(&child));
    }
}
