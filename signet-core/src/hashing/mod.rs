//! Perceptual fingerprints and the distance metric over them.
//!
//! # Components
//!
//! - **Fingerprints**: two 64-bit hashes (mean-threshold and gradient) sampled
//!   from a 32x32 luminance raster. Visually similar images land a few bits apart.
//! - **Distance**: Hamming distance between equal-length fingerprints, normalized
//!   to [0, 1].

pub mod distance;
pub mod fingerprint;

pub use distance::*;
pub use fingerprint::*;
