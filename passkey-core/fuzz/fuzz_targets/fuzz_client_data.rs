#![no_main]

//! Fuzz target for ClientData::parse() and its checks
//!
//! Run with: cargo +nightly fuzz run fuzz_client_data

use libfuzzer_sys::fuzz_target;
use passkey_core::client_data::{ClientData, TYPE_GET};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected with an error, never a panic
    if let Ok(client_data) = ClientData::parse(data.to_vec()) {
        let _ = client_data.check_challenge(&[0u8; 32]);
        let _ = client_data.check_origin(Some("https://example.test"));
        let _ = client_data.check_type(TYPE_GET);
        let _ = client_data.hash();
    }
});
