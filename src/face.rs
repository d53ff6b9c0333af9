//! 네트워크 협력자 계약
//!
//! Interest/ContentObject 프리미티브와 서명은 외부 네트워크 라이브러리 소관이다.
//! 이 모듈은 프로토콜이 소비하는 좁은 인터페이스만 정의한다.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::name::{component_cmp, Name};
use crate::Result;

/// 서명된 불변 응답 객체
#[derive(Debug, Clone)]
pub struct ContentObject {
    /// 전체 이름
    pub name: Name,

    /// 내용 바이트
    pub content: Bytes,

    /// 서명 (불투명)
    pub signature: Bytes,

    /// 서명 키 위치
    pub key_locator: Name,
}

/// 자식 선택자 (접두사 아래에서 가장 왼쪽/오른쪽 매칭)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSelector {
    Leftmost,
    Rightmost,
}

/// exclusion 필터 항목
#[derive(Debug, Clone)]
enum ExcludeTerm {
    /// 정확히 이 컴포넌트 제외
    Component(Bytes),

    /// 인접 컴포넌트 사이(또는 경계 밖) 전체 범위 제외
    Any,
}

/// Interest exclusion 필터
///
/// 항목 순서가 의미를 가진다. `Any`는 앞뒤 `Component` 항목이 이루는
/// 닫힌 범위 전체를 제외한다 (경계 항목이 없으면 무한 범위).
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    terms: Vec<ExcludeTerm>,
}

impl ExclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 단일 컴포넌트 제외 추가
    pub fn add_component(&mut self, component: impl Into<Bytes>) {
        self.terms.push(ExcludeTerm::Component(component.into()));
    }

    /// 범위 와일드카드 추가
    pub fn add_any(&mut self) {
        self.terms.push(ExcludeTerm::Any);
    }

    /// 컴포넌트 제외 여부 판정
    pub fn excludes(&self, component: &[u8]) -> bool {
        for (i, term) in self.terms.iter().enumerate() {
            match term {
                ExcludeTerm::Component(c) => {
                    if component_cmp(component, c) == Ordering::Equal {
                        return true;
                    }
                }
                ExcludeTerm::Any => {
                    let lo = match i.checked_sub(1).map(|p| &self.terms[p]) {
                        Some(ExcludeTerm::Component(c)) => Some(c),
                        _ => None,
                    };
                    let hi = match self.terms.get(i + 1) {
                        Some(ExcludeTerm::Component(c)) => Some(c),
                        _ => None,
                    };
                    let above = lo.map_or(true, |c| component_cmp(component, c) != Ordering::Less);
                    let below =
                        hi.map_or(true, |c| component_cmp(component, c) != Ordering::Greater);
                    if above && below {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// 이름 기반 요청
#[derive(Debug, Clone)]
pub struct Interest {
    /// Interest 수명 (밀리초)
    pub lifetime_ms: u64,

    /// 자식 선택자
    pub child_selector: Option<ChildSelector>,

    /// exclusion 필터
    pub exclude: Option<ExclusionFilter>,
}

impl Default for Interest {
    fn default() -> Self {
        Self {
            lifetime_ms: 1000,
            child_selector: None,
            exclude: None,
        }
    }
}

impl Interest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lifetime(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    pub fn with_child_selector(mut self, selector: ChildSelector) -> Self {
        self.child_selector = Some(selector);
        self
    }

    pub fn with_exclude(mut self, exclude: ExclusionFilter) -> Self {
        self.exclude = Some(exclude);
        self
    }
}

/// 비동기 네트워크 이벤트 (닫힌 집합)
#[derive(Debug, Clone)]
pub enum FaceEvent {
    /// 내용 도착
    ContentArrived(ContentObject),

    /// Interest 수명 만료
    TimedOut(Name),

    /// 서명 검증 실패 상태로 도착
    Unverified(ContentObject),
}

/// 워커의 블로킹 대기를 외부 스레드에서 중단시키는 핸들
pub trait FaceWaker: Send + Sync {
    fn wake(&self);
}

/// 소비자측 네트워크 핸들
///
/// 상태 변경 메서드는 모두 소유 스레드(워커)에서만 호출된다.
pub trait Face {
    /// 비동기 Interest 발행 (응답은 `run_for` 이벤트로 전달)
    fn express_interest(&mut self, name: &Name, interest: &Interest) -> Result<()>;

    /// 동기 조회 (타임아웃 시 None)
    fn get(
        &mut self,
        name: &Name,
        interest: &Interest,
        timeout_ms: u64,
    ) -> Result<Option<ContentObject>>;

    /// 이벤트 루프를 최대 `timeout_ms` 동안 구동하고 발생 이벤트 반환
    ///
    /// `waker().wake()` 호출 시 조기 반환해야 한다.
    fn run_for(&mut self, timeout_ms: u64) -> Result<Vec<FaceEvent>>;

    /// 중단 핸들 (다른 스레드로 전달 가능)
    fn waker(&self) -> Arc<dyn FaceWaker>;
}

/// 생산자측 발행 핸들
pub trait Publish {
    /// 서명된 ContentObject를 네트워크에 게시
    fn put(&mut self, object: ContentObject) -> Result<()>;
}

/// 서명 협력자 (키 관리는 외부 소관)
pub trait Signer {
    /// 이름과 내용을 서명해 ContentObject 생성
    fn sign(&self, name: Name, content: Bytes) -> ContentObject;

    /// DER 인코딩 공개키
    fn public_key_der(&self) -> Bytes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    // 길이 탐지 질의 형태: 알려진 항목과 그 이전 전부 제외
    #[test]
    fn test_exclude_upto_known() {
        let mut filter = ExclusionFilter::new();
        filter.add_any();
        filter.add_component(Name::number_to_component(500));

        assert!(filter.excludes(&Name::number_to_component(0)));
        assert!(filter.excludes(&Name::number_to_component(499)));
        assert!(filter.excludes(&Name::number_to_component(500)));
        assert!(!filter.excludes(&Name::number_to_component(501)));
        assert!(!filter.excludes(&Name::number_to_component(100_000)));
    }

    // 탐색 질의 형태: 대상과 그 이후 전부 제외
    #[test]
    fn test_exclude_target_and_after() {
        let mut filter = ExclusionFilter::new();
        filter.add_component(Name::number_to_component(1000));
        filter.add_any();

        assert!(!filter.excludes(&Name::number_to_component(999)));
        assert!(filter.excludes(&Name::number_to_component(1000)));
        assert!(filter.excludes(&Name::number_to_component(1001)));
        assert!(filter.excludes(&Name::number_to_component(u64::MAX)));
    }

    #[test]
    fn test_exclude_single_component() {
        let mut filter = ExclusionFilter::new();
        filter.add_component(Name::number_to_component(7));

        assert!(filter.excludes(&Name::number_to_component(7)));
        assert!(!filter.excludes(&Name::number_to_component(6)));
        assert!(!filter.excludes(&Name::number_to_component(8)));
    }
}
