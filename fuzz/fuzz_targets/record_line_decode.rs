//! Fuzz target for single archive record decoding.
//!
//! Run with:
//!   cargo +nightly fuzz run record_line_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use speakleash::reader::decode_record_line;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let _ = decode_record_line(data);
});
