#![no_main]

use libfuzzer_sys::fuzz_target;
use seedshard_shamir::RecoverySet;

fuzz_target!(|data: &[u8]| {
    // Newline-separated mnemonics fed into one recovery set.
    // Every call must return Ok or Err; the set must never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let mut set = RecoverySet::new();
        for line in s.lines() {
            let _ = set.add_mnemonic(line);
        }
        let _ = set.progress();
        let _ = set.recovered_secret("");
    }
});
