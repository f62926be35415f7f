//! Fuzz target for streaming whole archives, compressed or plain.
//!
//! Inputs starting with the zstd magic go through the decompressor, the
//! rest are read as plain JSONL. Both decode modes are exercised.
//!
//! Run with:
//!   cargo +nightly fuzz run record_stream

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use speakleash::reader::{DecodeMode, RecordStream};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

fuzz_target!(|data: &[u8]| {
    if data.len() > 4 * 1024 * 1024 {
        return;
    }

    for mode in [DecodeMode::Lenient, DecodeMode::Strict] {
        let mut stream = if data.starts_with(&ZSTD_MAGIC) {
            match RecordStream::from_zstd(Cursor::new(data.to_vec()), "fuzz", mode) {
                Ok(stream) => stream,
                Err(_) => return,
            }
        } else {
            RecordStream::from_reader(Cursor::new(data.to_vec()), "fuzz", mode)
        };

        for _ in stream.by_ref().take(10_000) {}
        let _ = stream.finish();
    }
});
