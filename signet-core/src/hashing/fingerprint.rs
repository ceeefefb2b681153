//! Dual perceptual fingerprints for still images and video frames.
//!
//! # Algorithm
//!
//! The input is a 32x32 raster. Every pixel is reduced to luminance and the
//! global mean is taken over the whole buffer. An 8x8 grid is then sampled at
//! stride 4:
//!
//! - **pHash** (mean-threshold): bit set when the sample is at or above the
//!   global mean. One global mean serves every cell; there are no per-block
//!   means.
//! - **dHash** (gradient): bit set when the sample is darker than its immediate
//!   right neighbour in the raw buffer. Uniform brightness or contrast shifts do
//!   not change it.
//!
//! Flat images produce constant (all-0 or all-1) hashes. They are accepted and
//! reported as low-information so callers can discount them.
//!
//! # Usage
//!
//! ```
//! use signet_core::hashing::compute_fingerprint;
//! use signet_core::Raster;
//!
//! let raster = Raster::from_gray(32, 32, &[128; 32 * 32]).unwrap();
//! let fingerprint = compute_fingerprint(&raster).unwrap();
//! assert!(fingerprint.is_low_information());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use super::distance::hamming_distance;
use crate::error::{Result, SignetError};
use crate::raster::{Raster, RasterSource};

/// Number of bits in every fingerprint.
pub const FINGERPRINT_BITS: u32 = 64;

/// Side length of the raster fingerprints are computed from.
pub const SAMPLE_SIZE: u32 = 32;

/// Sample grid side length (8x8 = 64 bits).
const GRID: usize = 8;

/// Distance between grid samples in the 32x32 buffer.
const STRIDE: usize = SAMPLE_SIZE as usize / GRID;

/// Default Hamming threshold for [`BitFingerprint::is_similar`].
const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;

/// Which fingerprint a set of bits represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FingerprintKind {
    /// Mean-threshold hash.
    PHash,
    /// Gradient-direction hash.
    DHash,
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PHash => write!(f, "pHash"),
            Self::DHash => write!(f, "dHash"),
        }
    }
}

/// An immutable 64-bit fingerprint.
///
/// Bit 0 of the sampling order (top-left grid cell) is the most significant
/// bit, so [`BitFingerprint::to_bit_string`] prints cells in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitFingerprint {
    kind: FingerprintKind,
    #[serde(serialize_with = "serialize_hex", deserialize_with = "deserialize_hex")]
    bits: u64,
}

impl BitFingerprint {
    pub const fn from_bits(kind: FingerprintKind, bits: u64) -> Self {
        Self { kind, bits }
    }

    pub const fn kind(&self) -> FingerprintKind {
        self.kind
    }

    pub const fn bits(&self) -> u64 {
        self.bits
    }

    /// Parse a 64-character string of `0` and `1`.
    pub fn from_bit_string(kind: FingerprintKind, bit_str: &str) -> Result<Self> {
        if bit_str.len() != FINGERPRINT_BITS as usize {
            return Err(SignetError::InputError(format!(
                "{kind} bit string has {} characters, expected {FINGERPRINT_BITS}",
                bit_str.len()
            )));
        }
        let bits = bit_str.bytes().try_fold(0u64, |acc, c| match c {
            b'0' => Ok(acc << 1),
            b'1' => Ok((acc << 1) | 1),
            other => Err(SignetError::InputError(format!(
                "Invalid {kind} bit string: unexpected character {:?}",
                other as char
            ))),
        })?;
        Ok(Self { kind, bits })
    }

    pub fn to_bit_string(&self) -> String {
        format!("{:064b}", self.bits)
    }

    /// Get the fingerprint as a 16-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bits.to_be_bytes())
    }

    /// Create a fingerprint from a 16-character hex string.
    pub fn from_hex(kind: FingerprintKind, hex_str: &str) -> Result<Self> {
        Ok(Self {
            kind,
            bits: parse_hex_bits(hex_str)?,
        })
    }

    /// True when every bit is equal (all-0 or all-1).
    pub fn is_constant(&self) -> bool {
        self.bits == 0 || self.bits == u64::MAX
    }

    /// Number of differing bits. Both fingerprints must be the same kind.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        if self.kind != other.kind {
            return Err(SignetError::FingerprintMismatch {
                left: self.kind,
                right: other.kind,
            });
        }
        Ok(hamming_distance(self.bits, other.bits))
    }

    /// Hamming distance divided by 64.
    pub fn normalized_distance(&self, other: &Self) -> Result<f64> {
        Ok(self.hamming_distance(other)? as f64 / FINGERPRINT_BITS as f64)
    }

    /// Check if two fingerprints are within `threshold` bits (default: 10).
    pub fn is_similar(&self, other: &Self, threshold: Option<u32>) -> Result<bool> {
        let threshold = threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        Ok(self.hamming_distance(other)? <= threshold)
    }
}

impl fmt::Display for BitFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.to_hex())
    }
}

impl FromStr for BitFingerprint {
    type Err = SignetError;

    /// Parse the `kind:hex` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, hex_str) = s.split_once(':').ok_or_else(|| {
            SignetError::InputError(format!("Expected <kind>:<hex> fingerprint, got {s:?}"))
        })?;
        let kind = match kind {
            "pHash" | "phash" => FingerprintKind::PHash,
            "dHash" | "dhash" => FingerprintKind::DHash,
            other => {
                return Err(SignetError::InputError(format!(
                    "Unknown fingerprint kind {other:?}"
                )))
            }
        };
        Self::from_hex(kind, hex_str)
    }
}

fn parse_hex_bits(hex_str: &str) -> Result<u64> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| SignetError::InputError(format!("Invalid hex string: {e}")))?;
    let bytes: [u8; 8] = bytes.try_into().map_err(|b: Vec<u8>| {
        SignetError::InputError(format!(
            "Fingerprint hex decodes to {} bytes, expected 8",
            b.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn serialize_hex<S>(bits: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bits.to_be_bytes()))
}

fn deserialize_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_bits(&s).map_err(serde::de::Error::custom)
}

/// The pHash/dHash pair computed from one image or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualFingerprint {
    pub p_hash: BitFingerprint,
    pub d_hash: BitFingerprint,
    /// Native size of the source image, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_size: Option<(u32, u32)>,
}

impl DualFingerprint {
    /// Build from raw bit patterns.
    pub const fn from_bits(p_hash: u64, d_hash: u64) -> Self {
        Self {
            p_hash: BitFingerprint::from_bits(FingerprintKind::PHash, p_hash),
            d_hash: BitFingerprint::from_bits(FingerprintKind::DHash, d_hash),
            source_size: None,
        }
    }

    /// Both hashes are constant, which is what a flat image produces.
    pub fn is_low_information(&self) -> bool {
        self.p_hash.is_constant() && self.d_hash.is_constant()
    }
}

/// Compute the pHash/dHash pair from a 32x32 raster.
///
/// Fully deterministic: the same raster always yields the same fingerprint.
pub fn compute_fingerprint(raster: &Raster) -> Result<DualFingerprint> {
    if raster.dimensions() != (SAMPLE_SIZE, SAMPLE_SIZE) {
        return Err(SignetError::InputError(format!(
            "fingerprints need a {SAMPLE_SIZE}x{SAMPLE_SIZE} raster, got {}x{}",
            raster.width(),
            raster.height()
        )));
    }

    let width = raster.width() as usize;
    let grays = raster.luminance();
    let mean = grays.iter().sum::<f64>() / grays.len() as f64;

    let mut p_bits = 0u64;
    let mut d_bits = 0u64;
    for y in 0..GRID {
        for x in 0..GRID {
            let idx = y * STRIDE * width + x * STRIDE;
            let bit = 1u64 << (FINGERPRINT_BITS as usize - 1 - (y * GRID + x));
            if grays[idx] >= mean {
                p_bits |= bit;
            }
            if grays[idx] < grays[idx + 1] {
                d_bits |= bit;
            }
        }
    }

    let fingerprint = DualFingerprint::from_bits(p_bits, d_bits);
    if fingerprint.is_low_information() {
        warn!(mean, "Flat image detected, fingerprint carries little information");
    }
    debug!(
        p_hash = %fingerprint.p_hash.to_hex(),
        d_hash = %fingerprint.d_hash.to_hex(),
        mean,
        "Computed fingerprint"
    );
    Ok(fingerprint)
}

/// Sample a source at 32x32 and fingerprint it.
pub async fn fingerprint_source(source: &dyn RasterSource) -> Result<DualFingerprint> {
    let raster = source.sample(SAMPLE_SIZE, SAMPLE_SIZE).await?;
    let mut fingerprint = compute_fingerprint(&raster)?;
    fingerprint.source_size = Some(source.dimensions());
    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_raster() -> Raster {
        let luma: Vec<u8> = (0..32u32)
            .flat_map(|y| (0..32u32).map(move |x| ((x * 7 + y * 3) % 256) as u8))
            .collect();
        Raster::from_gray(32, 32, &luma).unwrap()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let raster = gradient_raster();
        let first = compute_fingerprint(&raster).unwrap();
        let second = compute_fingerprint(&raster.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let raster = Raster::filled(16, 16, [0, 0, 0, 255]).unwrap();
        assert!(matches!(
            compute_fingerprint(&raster),
            Err(SignetError::InputError(_))
        ));
    }

    #[test]
    fn test_flat_image_is_low_information() {
        let raster = Raster::filled(32, 32, [90, 90, 90, 255]).unwrap();
        let fp = compute_fingerprint(&raster).unwrap();
        assert!(fp.is_low_information());
        assert!(fp.p_hash.is_constant());
        assert_eq!(fp.d_hash.bits(), 0);

        // Black is exact: every sample equals the zero mean.
        let black = Raster::filled(32, 32, [0, 0, 0, 255]).unwrap();
        let fp = compute_fingerprint(&black).unwrap();
        assert_eq!(fp.p_hash.bits(), u64::MAX);
    }

    #[test]
    fn test_horizontal_ramp_hashes() {
        let luma: Vec<u8> = (0..32u32)
            .flat_map(|_| (0..32u32).map(|x| (x * 8) as u8))
            .collect();
        let fp = compute_fingerprint(&Raster::from_gray(32, 32, &luma).unwrap()).unwrap();
        // Every sample is darker than its right neighbour.
        assert_eq!(fp.d_hash.bits(), u64::MAX);
        // Left half of each row is below the mean, right half above.
        let row = fp.p_hash.to_bit_string()[..8].to_string();
        assert_eq!(row, "00001111");
        assert!(!fp.is_low_information());
    }

    #[test]
    fn test_vertical_edge_sets_top_left_bit_first() {
        // Bright column at x = 1 makes the (0, 0) sample darker than its neighbour.
        let mut luma = vec![0u8; 32 * 32];
        luma[1] = 255;
        let fp = compute_fingerprint(&Raster::from_gray(32, 32, &luma).unwrap()).unwrap();
        assert_eq!(fp.d_hash.bits(), 1u64 << 63);
        assert!(fp.d_hash.to_bit_string().starts_with('1'));
    }

    #[test]
    fn test_dhash_ignores_brightness_shift() {
        let base: Vec<u8> = (0..32u32)
            .flat_map(|y| (0..32u32).map(move |x| ((x * 3 + y * 2) % 200) as u8))
            .collect();
        let shifted: Vec<u8> = base.iter().map(|v| v + 40).collect();
        let a = compute_fingerprint(&Raster::from_gray(32, 32, &base).unwrap()).unwrap();
        let b = compute_fingerprint(&Raster::from_gray(32, 32, &shifted).unwrap()).unwrap();
        assert_eq!(a.d_hash, b.d_hash);
    }

    #[test]
    fn test_bit_string_roundtrip() {
        let fp = BitFingerprint::from_bits(FingerprintKind::PHash, 0xDEAD_BEEF_CAFE_BABE);
        let restored =
            BitFingerprint::from_bit_string(FingerprintKind::PHash, &fp.to_bit_string()).unwrap();
        assert_eq!(fp, restored);
    }

    #[test]
    fn test_hex_and_display() {
        let fp = BitFingerprint::from_bits(FingerprintKind::DHash, 0xDEAD_BEEF_CAFE_BABE);
        assert_eq!(fp.to_hex(), "deadbeefcafebabe");
        assert_eq!(fp.to_string(), "dHash:deadbeefcafebabe");
        assert_eq!("dHash:deadbeefcafebabe".parse::<BitFingerprint>().unwrap(), fp);
    }

    #[test]
    fn test_bit_string_wrong_length() {
        let err = BitFingerprint::from_bit_string(FingerprintKind::DHash, "0101").unwrap_err();
        assert!(matches!(err, SignetError::InputError(_)));
        assert!(BitFingerprint::from_hex(FingerprintKind::DHash, "dead").is_err());
    }

    #[test]
    fn test_bit_string_rejects_sign_and_other_characters() {
        let signed = format!("+{}", "1".repeat(63));
        assert_eq!(signed.len(), 64);
        for bad in [signed, format!("{}2", "0".repeat(63)), format!("{} ", "1".repeat(63))] {
            let err = BitFingerprint::from_bit_string(FingerprintKind::PHash, &bad).unwrap_err();
            assert!(matches!(err, SignetError::InputError(_)), "{bad:?}");
        }

        let fp = BitFingerprint::from_bit_string(FingerprintKind::PHash, &"1".repeat(64)).unwrap();
        assert_eq!(fp.bits(), u64::MAX);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let p = BitFingerprint::from_bits(FingerprintKind::PHash, 0);
        let d = BitFingerprint::from_bits(FingerprintKind::DHash, 0);
        assert!(matches!(
            p.hamming_distance(&d),
            Err(SignetError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_exact_k_bit_distance() {
        let zero = BitFingerprint::from_bits(FingerprintKind::PHash, 0);
        for k in [0u32, 1, 7, 16, 33, 64] {
            let bits = if k == 64 { u64::MAX } else { (1u64 << k) - 1 };
            let other = BitFingerprint::from_bits(FingerprintKind::PHash, bits);
            assert_eq!(zero.hamming_distance(&other).unwrap(), k);
            assert_eq!(zero.normalized_distance(&other).unwrap(), k as f64 / 64.0);
        }
    }

    #[test]
    fn test_similarity_threshold() {
        let a = BitFingerprint::from_bits(FingerprintKind::PHash, 0);
        let b = BitFingerprint::from_bits(FingerprintKind::PHash, 1);
        assert!(a.is_similar(&b, None).unwrap());
        assert!(!a.is_similar(&b, Some(0)).unwrap());
    }

    #[test]
    fn test_serde_uses_hex() {
        let fp = DualFingerprint::from_bits(0x0102_0304_0506_0708, 0);
        let json = serde_json::to_value(fp).unwrap();
        assert_eq!(json["pHash"]["bits"], "0102030405060708");
        assert_eq!(json["dHash"]["kind"], "dHash");
        let back: DualFingerprint = serde_json::from_value(json).unwrap();
        assert_eq!(back, fp);
    }

    #[tokio::test]
    async fn test_fingerprint_source_records_size() {
        let raster = Raster::filled(64, 48, [10, 10, 10, 255]).unwrap();
        let fp = fingerprint_source(&raster).await.unwrap();
        assert_eq!(fp.source_size, Some((64, 48)));
    }
}
