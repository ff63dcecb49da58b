#![no_main]

use libfuzzer_sys::fuzz_target;
use peersync_core::pipeline::NeighborParser;
use peersync_parser::SrosParser;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        for neighbor in SrosParser.parse(raw, "fuzz") {
            assert!(!neighbor.neighbor_ip.is_empty());
        }
    }
});
