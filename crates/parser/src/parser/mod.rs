//! 형식별 BGP 요약 파서
//!
//! 각 파서는 core의 [`NeighborParser`] trait을 구현하며 자신의 줄 패턴을 소유합니다.
//! 호출 측은 [`parser_for`]로 장비 형식에 맞는 파서를 고르거나 [`parse`]를 직접 호출합니다.
//!
//! # 지원 형식
//! - Cisco IOS / IOS-XE ([`IosParser`])
//! - Cisco IOS-XR ([`IosXrParser`])
//! - Nokia SR-OS ([`SrosParser`])

pub mod ios;
pub mod iosxr;
pub mod sros;

pub use ios::IosParser;
pub use iosxr::IosXrParser;
pub use sros::SrosParser;

use std::net::IpAddr;

use peersync_core::metrics as m;
use peersync_core::pipeline::NeighborParser;
use peersync_core::types::{Dialect, NeighborObservation, SessionState};
use regex::Regex;
use tracing::debug;

static IOS: IosParser = IosParser;
static IOS_XR: IosXrParser = IosXrParser;
static SROS: SrosParser = SrosParser;

/// 형식에 맞는 파서를 반환합니다.
pub fn parser_for(dialect: Dialect) -> &'static dyn NeighborParser {
    match dialect {
        Dialect::Ios => &IOS,
        Dialect::IosXr => &IOS_XR,
        Dialect::Sros => &SROS,
    }
}

/// 원시 출력을 형식에 맞게 파싱합니다.
///
/// 파싱된 이웃 수를 메트릭으로 기록합니다.
pub fn parse(raw: &str, dialect: Dialect, source_router: &str) -> Vec<NeighborObservation> {
    let neighbors = parser_for(dialect).parse(raw, source_router);
    debug!(
        router = source_router,
        dialect = %dialect,
        count = neighbors.len(),
        "parsed bgp summary"
    );
    metrics::counter!(m::PARSER_NEIGHBORS_PARSED_TOTAL, m::LABEL_DIALECT => dialect.name())
        .increment(neighbors.len() as u64);
    neighbors
}

/// AS 번호를 asplain 값으로 파싱합니다.
///
/// asdot 표기(`1.10`)는 `high * 65536 + low`로 변환합니다.
/// 범위를 벗어나거나 숫자가 아니면 `None`입니다.
pub fn parse_asn(s: &str) -> Option<u32> {
    match s.split_once('.') {
        Some((high, low)) => {
            let high: u16 = high.parse().ok()?;
            let low: u16 = low.parse().ok()?;
            Some((u32::from(high) << 16) | u32::from(low))
        }
        None => s.parse().ok(),
    }
}

/// 주소 문자열이 IPv4/IPv6 주소인지 확인합니다.
pub(crate) fn is_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Cisco 계열의 `State/PfxRcd` 컬럼을 해석합니다.
///
/// 숫자이면 Established 상태의 수신 프리픽스 수이고,
/// 그렇지 않으면 상태 문자열입니다 (`Idle (Admin)` 등).
/// 숫자처럼 보이지만 범위를 벗어나면 `None`입니다.
pub(crate) fn cisco_state(field: &str) -> Option<(SessionState, u64)> {
    let field = field.trim();
    if field.bytes().all(|b| b.is_ascii_digit()) && !field.is_empty() {
        let prefixes = field.parse().ok()?;
        return Some((SessionState::Established, prefixes));
    }
    Some((SessionState::from_str_loose(field), 0))
}

/// Cisco 계열 이웃 행 하나를 관찰값으로 변환합니다.
///
/// 패턴은 `ip`, `asn`, `state` 캡처 그룹을 가져야 합니다.
pub(crate) fn cisco_row(
    pattern: &Regex,
    line: &str,
    source_router: &str,
) -> Option<NeighborObservation> {
    let caps = pattern.captures(line.trim())?;
    let ip = caps.name("ip")?.as_str();
    if !is_ip(ip) {
        return None;
    }
    let remote_as = parse_asn(caps.name("asn")?.as_str())?;
    let (state, prefixes_received) = cisco_state(caps.name("state")?.as_str())?;

    Some(NeighborObservation {
        neighbor_ip: ip.to_owned(),
        remote_as,
        state,
        prefixes_received,
        source_router: source_router.to_owned(),
    })
}

/// 너무 긴 이웃 주소(주로 IPv6) 때문에 두 줄로 나뉜 행을 합칩니다.
///
/// Cisco 장비는 주소가 컬럼 폭을 넘으면 주소만 한 줄에 출력하고
/// 나머지 컬럼을 다음 줄에 들여써서 출력합니다.
pub(crate) fn unwrap_cisco_rows(raw: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut pending: Option<&str> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(addr) = pending.take() {
            if !trimmed.is_empty() && line.starts_with(char::is_whitespace) {
                rows.push(format!("{addr} {trimmed}"));
                continue;
            }
        }
        if is_ip(trimmed) {
            pending = Some(trimmed);
            continue;
        }
        rows.push(line.to_owned());
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_for_returns_matching_dialect() {
        for dialect in Dialect::ALL {
            assert_eq!(parser_for(dialect).dialect(), dialect);
        }
    }

    #[test]
    fn parse_asn_plain() {
        assert_eq!(parse_asn("65001"), Some(65001));
        assert_eq!(parse_asn("4200000000"), Some(4_200_000_000));
    }

    #[test]
    fn parse_asn_asdot() {
        assert_eq!(parse_asn("1.10"), Some(65546));
        assert_eq!(parse_asn("0.65000"), Some(65000));
        assert_eq!(parse_asn("65535.65535"), Some(u32::MAX));
    }

    #[test]
    fn parse_asn_rejects_garbage() {
        assert_eq!(parse_asn(""), None);
        assert_eq!(parse_asn("AS65001"), None);
        assert_eq!(parse_asn("65536.1"), None);
        assert_eq!(parse_asn("99999999999"), None);
    }

    #[test]
    fn cisco_state_number_means_established() {
        assert_eq!(
            cisco_state("17"),
            Some((SessionState::Established, 17))
        );
        assert_eq!(cisco_state("0"), Some((SessionState::Established, 0)));
    }

    #[test]
    fn cisco_state_word() {
        assert_eq!(cisco_state("Idle (Admin)"), Some((SessionState::Idle, 0)));
        assert_eq!(cisco_state("Active"), Some((SessionState::Active, 0)));
    }

    #[test]
    fn cisco_state_overflowing_count_is_rejected() {
        assert_eq!(cisco_state("999999999999999999999999"), None);
    }

    #[test]
    fn unwrap_joins_wrapped_ipv6_rows() {
        let raw = "2001:db8::1\n                4 65010      10      12        5    0    0 00:10:00        3\n";
        let rows = unwrap_cisco_rows(raw);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("2001:db8::1 4 65010"));
    }

    #[test]
    fn unwrap_keeps_normal_rows() {
        let raw = "10.0.0.1 4 65001 1 1 1 0 0 00:00:01 Idle\nBGP table version is 1\n";
        let rows = unwrap_cisco_rows(raw);
        assert_eq!(rows.len(), 2);
    }
}
