#![no_main]

//! Fuzz target for fingerprint text parsing
//!
//! Feeds arbitrary strings through the `kind:hex` and bit-string parsers.
//! Anything that parses must print back to an equal fingerprint.
//!
//! Run with: cargo +nightly fuzz run fuzz_fingerprint_parse

use libfuzzer_sys::fuzz_target;
use signet_core::hashing::hamming_distance_bits;
use signet_core::{BitFingerprint, FingerprintKind};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(fp) = text.parse::<BitFingerprint>() {
        let reparsed: BitFingerprint = fp.to_string().parse().expect("display output parses");
        assert_eq!(fp, reparsed);
    }

    if let Ok(fp) = BitFingerprint::from_bit_string(FingerprintKind::DHash, text) {
        assert_eq!(fp.to_bit_string().len(), 64);
    }

    // Split the input in half and compare as bit strings
    let mid = text.len() / 2;
    if text.is_char_boundary(mid) {
        let (a, b) = text.split_at(mid);
        let _ = hamming_distance_bits(a, b);
    }
});
