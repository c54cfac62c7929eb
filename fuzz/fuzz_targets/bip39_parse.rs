#![no_main]

use libfuzzer_sys::fuzz_target;
use seedshard_core::seed::{from_bip39, parse_phrase};

fuzz_target!(|data: &[u8]| {
    // Try parsing arbitrary bytes as a UTF-8 string, then as a BIP-39 phrase.
    // Neither parser may panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_phrase(s);
        let words: Vec<&str> = s.split_whitespace().collect();
        let _ = from_bip39(&words);
    }
});
