//! 캡처된 CLI 출력에 대한 파서 통합 테스트

use peersync_core::types::{Dialect, SessionState};
use peersync_parser::{parse, parser_for};
use proptest::prelude::*;

const IOS: &str = include_str!("fixtures/ios_summary.txt");
const IOS_XR: &str = include_str!("fixtures/iosxr_summary.txt");
const SROS: &str = include_str!("fixtures/sros_summary.txt");

#[test]
fn ios_capture() {
    let neighbors = parse(IOS, Dialect::Ios, "GRBYWIAJagg01");
    let ips: Vec<_> = neighbors.iter().map(|n| n.neighbor_ip.as_str()).collect();
    assert_eq!(
        ips,
        ["64.50.224.2", "198.51.100.9", "203.0.113.17", "2001:DB8:4181::2"]
    );

    assert_eq!(neighbors[1].state, SessionState::Idle);
    assert_eq!(neighbors[2].remote_as, 65546);
    assert_eq!(neighbors[3].state, SessionState::Established);
    assert_eq!(neighbors[3].prefixes_received, 0);
    assert!(neighbors.iter().all(|n| n.source_router == "GRBYWIAJagg01"));
}

#[test]
fn ios_header_plus_two_rows_gives_two_observations() {
    let raw = "\
Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
10.0.0.2        4        65001    1234    1200      500    0    0 2d03h          17
10.0.0.6        4        65002      12      15        0    0    0 00:01:12 Idle
";
    assert_eq!(parse(raw, Dialect::Ios, "r1").len(), 2);
}

#[test]
fn iosxr_capture() {
    let neighbors = parse(IOS_XR, Dialect::IosXr, "CHCGILDTcor51");
    assert_eq!(neighbors.len(), 4);

    let established = neighbors.iter().filter(|n| n.state.is_established()).count();
    assert_eq!(established, 3);
    assert_eq!(neighbors[3].prefixes_received, 11022);
}

#[test]
fn sros_capture() {
    let neighbors = parse(SROS, Dialect::Sros, "MDSNWIGJdst53");
    assert_eq!(neighbors.len(), 3);
    assert_eq!(neighbors[1].neighbor_ip, "64.50.224.4");
    assert_eq!(neighbors[1].prefixes_received, 1019);
    assert_eq!(neighbors[2].state, SessionState::Active);
}

#[test]
fn wrong_dialect_finds_nothing_in_sros_output() {
    assert!(parse(SROS, Dialect::Ios, "r1").is_empty());
    assert!(parse(SROS, Dialect::IosXr, "r1").is_empty());
}

#[test]
fn parser_for_dispatches_by_dialect() {
    for dialect in Dialect::ALL {
        assert_eq!(parser_for(dialect).dialect(), dialect);
    }
}

proptest! {
    #[test]
    fn arbitrary_text_never_panics(raw in "\\PC{0,400}") {
        for dialect in Dialect::ALL {
            let _ = parse(&raw, dialect, "r1");
        }
    }

    #[test]
    fn arbitrary_lines_with_newlines_never_panic(
        lines in prop::collection::vec("[0-9a-fA-F:./ ()A-Za-z]{0,80}", 0..30)
    ) {
        let raw = lines.join("\n");
        for dialect in Dialect::ALL {
            let _ = parse(&raw, dialect, "r1");
        }
    }

    #[test]
    fn ios_row_roundtrips_numbers(
        asn in 1u32..=u32::MAX,
        pfx in 0u64..1_000_000,
        octet in 1u8..=254,
    ) {
        let raw = format!(
            "10.0.0.{octet}        4 {asn:>12}    1234    1200      500    0    0 2d03h {pfx:>12}"
        );
        let neighbors = parse(&raw, Dialect::Ios, "r1");
        prop_assert_eq!(neighbors.len(), 1);
        prop_assert_eq!(neighbors[0].remote_as, asn);
        prop_assert_eq!(neighbors[0].prefixes_received, pfx);
    }
}
