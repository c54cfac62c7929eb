#![no_main]

use libfuzzer_sys::fuzz_target;
use seedshard_shamir::wordlist::{index_to_word, RADIX};
use seedshard_shamir::Share;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text as a SLIP-39 mnemonic: must return Ok or Err, never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Share::from_mnemonic(s);
    }

    // Byte pairs mapped onto real words reach past the word lookup into the
    // checksum and field checks.
    let words: Vec<&str> = data
        .chunks_exact(2)
        .filter_map(|pair| index_to_word(u16::from_be_bytes([pair[0], pair[1]]) % RADIX as u16))
        .collect();
    if let Ok(share) = Share::from_words(&words) {
        // A decoded share with in-range fields re-encodes to the same words
        if share.validate().is_ok() {
            assert_eq!(share.to_words().ok(), Some(words));
        }
    }
});
