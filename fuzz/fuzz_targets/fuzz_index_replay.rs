#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    // Replay must reject or accept, never panic; valid_len never exceeds input
    if let Ok(r) = hashflog::index::replay(data) {
        assert!(r.valid_len as usize <= data.len());
        assert!(r.map.len() <= r.lines);
    }
});
