//! Nokia SR-OS `show router bgp summary` 파서
//!
//! SR-OS는 이웃 하나를 여러 줄에 걸쳐 출력합니다.
//!
//! # 출력 형식
//! ```text
//! Neighbor
//! Description
//!                    AS PktRcvd InQ  Up/Down   State|Rcv/Act/Sent (Addr Family)
//!                       PktSent OutQ
//! -------------------------------------------------------------------------------
//! 64.50.224.0
//! CHCGILDTcor51 Te0/0/0/1
//!                  4181  240117    0 27d04h12m 1021/980/14 (IPv4)
//!                        238811    0
//! 192.0.2.77
//!                 65077       0    0 00h00m41s Active
//!                             0    0
//! ```
//!
//! 주소 줄을 만나면 보류하고, 선택적인 설명 줄을 건너뛴 뒤
//! AS 줄에서 관찰값을 완성합니다.

use std::sync::LazyLock;

use peersync_core::pipeline::NeighborParser;
use peersync_core::types::{Dialect, NeighborObservation, SessionState};
use regex::Regex;

use super::{is_ip, parse_asn};

// AS PktRcvd InQ Up/Down State|Rcv/Act/Sent [(Family)]
static AS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<asn>\d+(?:\.\d+)?)\s+\d+\s+\d+\s+(?P<updown>\S+)\s+(?P<state>\S+)")
        .expect("literal pattern")
});

// Rcv/Act/Sent, 세션이 Established일 때만 나타남
static COUNTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<rcv>\d+)/\d+/\d+$").expect("literal pattern"));

/// Nokia SR-OS BGP 요약 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct SrosParser;

impl SrosParser {
    fn state_column(field: &str) -> Option<(SessionState, u64)> {
        match COUNTERS.captures(field) {
            Some(caps) => {
                let received = caps.name("rcv")?.as_str().parse().ok()?;
                Some((SessionState::Established, received))
            }
            None => Some((SessionState::from_str_loose(field), 0)),
        }
    }
}

impl NeighborParser for SrosParser {
    fn dialect(&self) -> Dialect {
        Dialect::Sros
    }

    fn parse(&self, raw: &str, source_router: &str) -> Vec<NeighborObservation> {
        let mut neighbors = Vec::new();
        let mut pending: Option<&str> = None;

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_ip(trimmed) {
                pending = Some(trimmed);
                continue;
            }

            let Some(addr) = pending else {
                continue;
            };

            let Some(caps) = AS_LINE.captures(trimmed) else {
                // 설명 줄
                continue;
            };
            pending = None;

            let parsed = caps
                .name("asn")
                .and_then(|m| parse_asn(m.as_str()))
                .zip(caps.name("state").and_then(|m| Self::state_column(m.as_str())));

            if let Some((remote_as, (state, prefixes_received))) = parsed {
                neighbors.push(NeighborObservation {
                    neighbor_ip: addr.to_owned(),
                    remote_as,
                    state,
                    prefixes_received,
                    source_router: source_router.to_owned(),
                });
            }
        }

        neighbors
    }
}
