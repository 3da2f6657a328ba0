#![no_main]

//! Fuzz target for decode_stored_key()
//!
//! Run with: cargo +nightly fuzz run fuzz_stored_key

use libfuzzer_sys::fuzz_target;
use passkey_core::decode_stored_key;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for algorithm in [-8, -7, -257, 0] {
        if let Ok(key) = decode_stored_key(algorithm, text) {
            let _ = key.verify(b"message", &[0u8; 64]);
        }
    }
});
