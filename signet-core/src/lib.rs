//! Signet Core - perceptual difference and provenance audit engine
//!
//! This crate scores how far a submitted asset has drifted from the media it
//! claims to come from.
//!
//! # Features
//!
//! - 64-bit pHash/dHash fingerprints from a 32x32 luminance sample
//! - Windowed SSIM with a per-pixel difference map
//! - Optional object-detection comparison behind a lazily loaded detector
//! - Mode-weighted fusion into a banded 0-1000 delta
//! - Multi-frame consensus audits on a 0-1023 scale
//!
//! # Example
//!
//! ```no_run
//! use signet_core::{
//!     compute_audit_score, compute_fingerprint, Candidate, ComparisonConfig, FusionScorer,
//!     Raster, ReferenceFrame, ScanMode,
//! };
//!
//! # async fn example(original: Raster, upload: Raster) -> signet_core::Result<()> {
//! let scorer = FusionScorer::new(ComparisonConfig::new(ScanMode::DeepStructural));
//! let score = scorer.compare(&original, &upload, None).await?;
//! println!("delta {:.1} ({})", score.delta, score.band);
//!
//! let reference = ReferenceFrame::new("opening", compute_fingerprint(&original.resample(32, 32)?)?);
//! let candidate = Candidate::new("upload", compute_fingerprint(&upload.resample(32, 32)?)?);
//! let audit = compute_audit_score(&[candidate], &[reference], None)?;
//! println!("audit {} ({})", audit.score, audit.band);
//! # Ok(())
//! # }
//! ```

pub mod band;
pub mod config;
pub mod consensus;
pub mod error;
pub mod frames;
pub mod fusion;
pub mod hashing;
pub mod progress;
pub mod raster;
pub mod semantic;
pub mod ssim;

// Re-export main types for convenience
pub use band::{AuditBand, DeltaBand};
pub use config::{ChannelWeights, ComparisonConfig, EngineConfig, ScanMode};
pub use consensus::{
    collect_candidates, collect_references, compute_audit_score, AuditResult, AuditSignals,
    Candidate, FrameMatchResult, ReferenceFrame,
};
pub use error::{Result, SignetError};
pub use frames::{extract_frames, ExtractOptions, ExtractionReport, SkippedFrame, VideoSource};
pub use fusion::{FusionScorer, TridentScore};
pub use hashing::{
    compute_fingerprint, fingerprint_source, hamming_distance, BitFingerprint, DualFingerprint,
    FingerprintKind,
};
pub use progress::{Progress, ProgressFn};
pub use raster::{Raster, RasterSource};
pub use semantic::{
    compare_semantic, BoundingBox, Detection, DetectorLoader, LazyDetector, ObjectDetector,
    SemanticComparison,
};
pub use ssim::{compare_ssim, DiffMap, SsimOptions, SsimResult};

#[cfg(feature = "image-io")]
pub use raster::{decode_image, is_supported_format};
