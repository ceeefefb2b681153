//! Hamming distance over fingerprints.

use crate::error::{Result, SignetError};

use super::fingerprint::FINGERPRINT_BITS;

/// Number of differing bits between two 64-bit fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Hamming distance normalized to [0, 1] by dividing by 64.
pub fn normalized_hamming(a: u64, b: u64) -> f64 {
    hamming_distance(a, b) as f64 / FINGERPRINT_BITS as f64
}

/// Hamming distance between two textual bit strings (`"0110..."`).
///
/// Both strings must be the same length; a mismatch is an input error rather
/// than a silently truncated comparison.
pub fn hamming_distance_bits(a: &str, b: &str) -> Result<u32> {
    if a.len() != b.len() {
        return Err(SignetError::InputError(format!(
            "cannot compare bit strings of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance_identical() {
        assert_eq!(hamming_distance(0xAA55_00FF_AA55_00FF, 0xAA55_00FF_AA55_00FF), 0);
    }

    #[test]
    fn test_hamming_distance_different() {
        assert_eq!(hamming_distance(0, u64::MAX), 64);
        assert_eq!(normalized_hamming(0, u64::MAX), 1.0);
    }

    #[test]
    fn test_hamming_distance_partial() {
        assert_eq!(hamming_distance(0, 1), 1);
        assert_eq!(normalized_hamming(0, 0xF), 4.0 / 64.0);
    }

    #[test]
    fn test_bit_strings() {
        assert_eq!(hamming_distance_bits("0101", "0110").unwrap(), 2);
        assert_eq!(hamming_distance_bits("", "").unwrap(), 0);
    }

    #[test]
    fn test_bit_strings_length_mismatch() {
        let err = hamming_distance_bits("010", "0101").unwrap_err();
        assert!(matches!(err, SignetError::InputError(_)));
    }
}
