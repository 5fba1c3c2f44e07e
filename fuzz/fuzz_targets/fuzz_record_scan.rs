#![no_main]
use libfuzzer_sys::fuzz_target;
use hashflog::record_log::read_record;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    let mut cur: &[u8] = data;
    let mut offset = 0u64;
    // Walk records until EOF or the first corrupt one
    while let Ok(Some(blob)) = read_record(&mut cur, offset) {
        offset += 4 + blob.len() as u64;
        assert!(offset as usize <= data.len());
    }
});
