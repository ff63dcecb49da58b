//! Cisco IOS / IOS-XE `show ip bgp summary` 파서
//!
//! # 출력 형식
//! ```text
//! Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
//! 10.0.0.2        4        65001    1234    1200      500    0    0 2d03h          17
//! 10.0.0.6        4          1.10      12      15        0    0    0 00:01:12 Idle (Admin)
//! ```
//!
//! `V` 컬럼은 항상 `4`입니다. IPv6 이웃 주소가 길면 주소가 한 줄,
//! 나머지 컬럼이 다음 줄로 나뉩니다.

use std::sync::LazyLock;

use peersync_core::pipeline::NeighborParser;
use peersync_core::types::{Dialect, NeighborObservation};
use regex::Regex;

use super::{cisco_row, unwrap_cisco_rows};

// ip V AS MsgRcvd MsgSent TblVer InQ OutQ Up/Down State/PfxRcd
static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ip>[0-9A-Fa-f:.]+)\s+4\s+(?P<asn>\d+(?:\.\d+)?)\s+\d+\s+\d+\s+\d+\s+\d+\s+\d+\s+(?P<updown>\S+)\s+(?P<state>\S.*)$",
    )
    .expect("literal pattern")
});

/// Cisco IOS BGP 요약 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct IosParser;

impl NeighborParser for IosParser {
    fn dialect(&self) -> Dialect {
        Dialect::Ios
    }

    fn parse(&self, raw: &str, source_router: &str) -> Vec<NeighborObservation> {
        unwrap_cisco_rows(raw)
            .iter()
            .filter_map(|line| cisco_row(&ROW, line, source_router))
            .collect()
    }
}
