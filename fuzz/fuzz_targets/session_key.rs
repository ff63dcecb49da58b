#![no_main]

use libfuzzer_sys::fuzz_target;
use peersync_reconciler::key::build_key;

fuzz_target!(|input: (String, String)| {
    let (remote, local) = input;
    let key = build_key(&remote, &local);
    // 마스크 제거는 멱등이어야 함
    let again = build_key(&key.remote, &key.local);
    assert_eq!(key, again);
});
