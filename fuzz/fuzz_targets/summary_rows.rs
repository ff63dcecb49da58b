#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use peersync_core::types::Dialect;
use peersync_parser::parse;

/// 퍼저용 구조적 입력: 실제 행 모양에 가까운 컬럼 조합
#[derive(Arbitrary, Debug)]
struct FuzzRow {
    octets: [u8; 4],
    asn: u32,
    asdot: bool,
    counters: [u32; 5],
    up_down: String,
    state: FuzzState,
    /// 주소를 별도 줄에 출력
    wrapped: bool,
}

#[derive(Arbitrary, Debug)]
enum FuzzState {
    Prefixes(u64),
    Word(String),
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    dialect_idx: u8,
    rows: Vec<FuzzRow>,
}

fn single_line(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

fuzz_target!(|input: FuzzInput| {
    let dialect = Dialect::ALL[usize::from(input.dialect_idx) % Dialect::ALL.len()];
    let mut raw = String::new();

    for row in input.rows.iter().take(64) {
        let [a, b, c, d] = row.octets;
        let asn = if row.asdot {
            format!("{}.{}", row.asn >> 16, row.asn & 0xffff)
        } else {
            row.asn.to_string()
        };
        let state = match &row.state {
            FuzzState::Prefixes(n) => n.to_string(),
            FuzzState::Word(w) => single_line(w),
        };
        let up_down = single_line(&row.up_down);
        let sep = if row.wrapped { "\n    " } else { " " };
        let [m1, m2, t, i, o] = row.counters;
        match dialect {
            Dialect::Sros => {
                raw.push_str(&format!(
                    "{a}.{b}.{c}.{d}\n   {asn} {m1} {i} {up_down} {state}\n"
                ));
            }
            _ => {
                raw.push_str(&format!(
                    "{a}.{b}.{c}.{d}{sep}4 {asn} {m1} {m2} {t} {i} {o} {up_down} {state}\n"
                ));
            }
        }
    }

    let neighbors = parse(&raw, dialect, "fuzz");
    assert!(neighbors.len() <= input.rows.len().min(64));
});
