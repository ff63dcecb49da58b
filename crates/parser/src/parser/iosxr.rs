//! Cisco IOS-XR `show bgp summary` 파서
//!
//! # 출력 형식
//! ```text
//! Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd
//! 64.50.224.11      0  4181  102030  100223   884211    0    0    5w0d        812
//! 206.223.119.5     0 13335       0       0        0    0    0 00:00:00 Active
//! ```
//!
//! IOS와 컬럼 구성이 같고 두 번째 컬럼이 BGP speaker ID(`Spk`)입니다.

use std::sync::LazyLock;

use peersync_core::pipeline::NeighborParser;
use peersync_core::types::{Dialect, NeighborObservation};
use regex::Regex;

use super::{cisco_row, unwrap_cisco_rows};

// ip Spk AS MsgRcvd MsgSent TblVer InQ OutQ Up/Down St/PfxRcd
static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ip>[0-9A-Fa-f:.]+)\s+(?P<spk>\d+)\s+(?P<asn>\d+(?:\.\d+)?)\s+\d+\s+\d+\s+\d+\s+\d+\s+\d+\s+(?P<updown>\S+)\s+(?P<state>\S.*)$",
    )
    .expect("literal pattern")
});

/// Cisco IOS-XR BGP 요약 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct IosXrParser;

impl NeighborParser for IosXrParser {
    fn dialect(&self) -> Dialect {
        Dialect::IosXr
    }

    fn parse(&self, raw: &str, source_router: &str) -> Vec<NeighborObservation> {
        unwrap_cisco_rows(raw)
            .iter()
            .filter_map(|line| cisco_row(&ROW, line, source_router))
            .collect()
    }
}
