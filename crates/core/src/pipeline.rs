//! 파이프라인 trait -- 모듈 확장 포인트 정의

use crate::types::{Dialect, NeighborObservation};

/// BGP 요약 출력 파서 trait
///
/// 새로운 장비 형식을 지원하려면 이 trait을 구현합니다.
/// 파서는 순수 함수여야 하며, 형식에 맞지 않는 줄은 에러 없이 건너뜁니다.
pub trait NeighborParser: Send + Sync {
    /// 이 파서가 처리하는 형식
    fn dialect(&self) -> Dialect;

    /// 원시 CLI 출력을 이웃 목록으로 변환
    ///
    /// 이웃이 없으면 빈 목록을 반환합니다.
    fn parse(&self, raw: &str, source_router: &str) -> Vec<NeighborObservation>;
}
