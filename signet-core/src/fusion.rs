//! Multi-signal fusion scoring for still-image pairs.
//!
//! A [`FusionScorer`] carries one immutable [`ComparisonConfig`]. Every call to
//! [`FusionScorer::compare`] computes the fingerprint channel, and only the
//! channels the mode weights: SSIM in DeepStructural and SemanticAI, detection
//! signals in SemanticAI. Skipped channels cost nothing and contribute 0 to the
//! delta, exactly as a perfect match would.
//!
//! ```no_run
//! use signet_core::{ComparisonConfig, FusionScorer, Raster, ScanMode};
//!
//! # async fn example(a: Raster, b: Raster) -> signet_core::Result<()> {
//! let scorer = FusionScorer::new(ComparisonConfig::new(ScanMode::DeepStructural));
//! let score = scorer.compare(&a, &b, None).await?;
//! println!("delta {:.1} ({})", score.delta, score.band);
//!
//! // Another mode is another scorer; the first one is untouched.
//! let quick = scorer.with_mode(ScanMode::QuickScan);
//! let score = quick.compare(&a, &b, None).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::band::DeltaBand;
use crate::config::{ComparisonConfig, ScanMode};
use crate::error::{Result, SignetError};
use crate::hashing::{fingerprint_source, FINGERPRINT_BITS};
use crate::progress::{report, ProgressFn};
use crate::raster::RasterSource;
use crate::semantic::{compare_semantic, LazyDetector, SemanticComparison};
use crate::ssim::{compare_sources, DiffMap};

/// Nominal top of the delta scale. Deltas are clamped to `[0, DELTA_SCALE]`.
pub const DELTA_SCALE: f64 = 1000.0;

/// Share of the fingerprint channel given to the pHash distance; dHash gets the
/// rest. Independent of the frame-consensus fusion formula.
pub const HASH_CHANNEL_PHASH_SHARE: f64 = 0.5;

/// Fingerprint channel details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashChannel {
    pub p_hash_distance: u32,
    pub d_hash_distance: u32,
    /// Fused distance on the 0-1000 scale.
    pub normalized: f64,
}

/// Structural channel details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsimChannel {
    pub score: f64,
    pub normalized: f64,
    #[serde(skip)]
    pub diff_map: DiffMap,
}

/// Detection channel details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticChannel {
    #[serde(flatten)]
    pub comparison: SemanticComparison,
    pub feature_normalized: f64,
    pub semantic_normalized: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub weight: f64,
    pub contribution: f64,
}

/// Weighted contribution of every channel to the delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakdown {
    pub phash: Contribution,
    pub ssim: Contribution,
    pub features: Contribution,
    pub semantic: Contribution,
}

impl Breakdown {
    pub fn total(&self) -> f64 {
        self.phash.contribution
            + self.ssim.contribution
            + self.features.contribution
            + self.semantic.contribution
    }
}

/// Outcome of one image-pair comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TridentScore {
    /// Weighted difference on the 0-1000 scale.
    pub delta: f64,
    pub band: DeltaBand,
    pub hash: HashChannel,
    pub ssim: Option<SsimChannel>,
    pub semantic: Option<SemanticChannel>,
    pub breakdown: Breakdown,
    pub config: ComparisonConfig,
    /// At least one input produced a flat, low-information fingerprint.
    pub low_confidence: bool,
}

/// Image-pair scorer bound to one comparison config.
#[derive(Debug, Clone, Default)]
pub struct FusionScorer {
    config: ComparisonConfig,
    detector: Option<Arc<LazyDetector>>,
}

impl FusionScorer {
    pub fn new(config: ComparisonConfig) -> Self {
        Self {
            config,
            detector: None,
        }
    }

    /// Attach the detector used by SemanticAI comparisons.
    pub fn with_detector(mut self, detector: Arc<LazyDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// A scorer for another mode sharing this one's detector.
    pub fn with_mode(&self, mode: ScanMode) -> Self {
        Self {
            config: self.config.with_mode(mode),
            detector: self.detector.clone(),
        }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Compare two images.
    ///
    /// Runs to completion once started; `progress` is called synchronously at
    /// fixed milestones. Failing to obtain pixels for either input rejects the
    /// whole call.
    #[instrument(level = "debug", skip_all, fields(mode = %self.config.mode()))]
    pub async fn compare(
        &self,
        a: &dyn RasterSource,
        b: &dyn RasterSource,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TridentScore> {
        let mode = self.config.mode();
        let weights = self.config.weights();
        if mode.uses_semantic() && self.detector.is_none() {
            return Err(SignetError::UnavailableCapability(
                "SemanticAI mode requires an object detector".into(),
            ));
        }
        debug!(?weights, "Starting comparison");
        report(progress, "Initializing", 0);

        report(progress, "Analyzing perceptual hash (pHash)", 10);
        let (fp_a, fp_b) = tokio::try_join!(fingerprint_source(a), fingerprint_source(b))?;
        let p_hash_distance = fp_a.p_hash.hamming_distance(&fp_b.p_hash)?;
        let d_hash_distance = fp_a.d_hash.hamming_distance(&fp_b.d_hash)?;
        let fused = HASH_CHANNEL_PHASH_SHARE * p_hash_distance as f64
            + (1.0 - HASH_CHANNEL_PHASH_SHARE) * d_hash_distance as f64;
        let hash = HashChannel {
            p_hash_distance,
            d_hash_distance,
            normalized: fused / FINGERPRINT_BITS as f64 * DELTA_SCALE,
        };
        let low_confidence = fp_a.is_low_information() || fp_b.is_low_information();
        debug!(
            p_hash_distance,
            d_hash_distance,
            normalized = hash.normalized,
            low_confidence,
            "Fingerprint channel"
        );
        report(progress, "pHash analysis complete", 25);

        let ssim = if mode.uses_ssim() {
            report(progress, "Analyzing structural similarity (SSIM)", 30);
            let result = compare_sources(a, b, self.config.ssim_options()).await?;
            let channel = SsimChannel {
                score: result.score,
                normalized: result.normalized_distance() * DELTA_SCALE,
                diff_map: result.diff_map,
            };
            debug!(
                score = channel.score,
                normalized = channel.normalized,
                "SSIM channel"
            );
            report(progress, "SSIM analysis complete", 50);
            Some(channel)
        } else {
            None
        };

        let semantic = match (&self.detector, mode.uses_semantic()) {
            (Some(lazy), true) => {
                let detector = lazy.get(progress).await?;
                report(progress, "Analyzing semantic content (AI)", 55);
                let (raster_a, raster_b) = tokio::try_join!(a.native(), b.native())?;
                let comparison = compare_semantic(detector.as_ref(), &raster_a, &raster_b).await?;
                report(progress, "Semantic analysis complete", 85);
                Some(SemanticChannel {
                    feature_normalized: comparison.feature_distance() * DELTA_SCALE,
                    semantic_normalized: comparison.semantic_distance() * DELTA_SCALE,
                    comparison,
                })
            }
            _ => None,
        };

        report(progress, "Synthesizing final score", 95);
        let contribution = |weight: f64, normalized: Option<f64>| Contribution {
            weight,
            contribution: normalized.unwrap_or(0.0) * weight,
        };
        let breakdown = Breakdown {
            phash: contribution(weights.phash, Some(hash.normalized)),
            ssim: contribution(weights.ssim, ssim.as_ref().map(|s| s.normalized)),
            features: contribution(
                weights.features,
                semantic.as_ref().map(|s| s.feature_normalized),
            ),
            semantic: contribution(
                weights.semantic,
                semantic.as_ref().map(|s| s.semantic_normalized),
            ),
        };
        let delta = breakdown.total().clamp(0.0, DELTA_SCALE);
        let band = DeltaBand::from_delta(delta);

        info!(delta, %band, %mode, "Comparison complete");
        report(progress, "Complete", 100);

        Ok(TridentScore {
            delta,
            band,
            hash,
            ssim,
            semantic,
            breakdown,
            config: self.config,
            low_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;
    use crate::semantic::{BoundingBox, Detection};
    use std::sync::Mutex;

    fn pattern(size: u32, invert: bool) -> Raster {
        let luma: Vec<u8> = (0..size)
            .flat_map(|y| {
                (0..size).map(move |x| {
                    let v = ((x * 255 / size) as u8) ^ if (y / 4) % 2 == 0 { 0 } else { 0x40 };
                    if invert {
                        255 - v
                    } else {
                        v
                    }
                })
            })
            .collect();
        Raster::from_gray(size, size, &luma).unwrap()
    }

    fn scorer(mode: ScanMode) -> FusionScorer {
        FusionScorer::new(ComparisonConfig::new(mode))
    }

    fn class_detector() -> Arc<LazyDetector> {
        let detector = |raster: &Raster| -> Result<Vec<Detection>> {
            let mut found = vec![Detection::new(
                "person",
                BoundingBox::new(0.0, 0.0, 8.0, 8.0),
                0.8,
            )];
            if raster.data()[0] > 128 {
                found.push(Detection::new(
                    "dog",
                    BoundingBox::new(4.0, 4.0, 8.0, 8.0),
                    0.7,
                ));
            }
            Ok(found)
        };
        Arc::new(LazyDetector::ready(Arc::new(detector)))
    }

    #[tokio::test]
    async fn test_identical_32x32_quickscan_is_zero() {
        let raster = pattern(32, false);
        let score = scorer(ScanMode::QuickScan)
            .compare(&raster, &raster.clone(), None)
            .await
            .unwrap();
        assert_eq!(score.hash.p_hash_distance, 0);
        assert_eq!(score.hash.d_hash_distance, 0);
        assert_eq!(score.delta, 0.0);
        assert_eq!(score.band, DeltaBand::Minimal);
    }

    #[tokio::test]
    async fn test_identity_in_every_structural_mode() {
        let raster = pattern(48, false);
        for mode in [ScanMode::QuickScan, ScanMode::DeepStructural] {
            let score = scorer(mode).compare(&raster, &raster, None).await.unwrap();
            assert!(score.delta.abs() < 1e-9, "{mode}: {}", score.delta);
            assert_eq!(score.band, DeltaBand::Minimal);
        }
    }

    #[tokio::test]
    async fn test_quickscan_skips_expensive_channels() {
        let a = pattern(48, false);
        let b = pattern(48, true);
        let quick = scorer(ScanMode::QuickScan);
        let score = quick.compare(&a, &b, None).await.unwrap();
        assert!(score.ssim.is_none());
        assert!(score.semantic.is_none());
        assert_eq!(score.breakdown.ssim.contribution, 0.0);
        assert_eq!(score.breakdown.features.contribution, 0.0);
        assert_eq!(score.breakdown.semantic.contribution, 0.0);
        assert!(score.delta > 0.0);
        assert_eq!(score.delta, score.hash.normalized);

        let deep = quick.with_mode(ScanMode::DeepStructural);
        let score = deep.compare(&a, &b, None).await.unwrap();
        let ssim = score.ssim.expect("DeepStructural computes SSIM");
        assert!(ssim.normalized > 0.0);
        assert!(score.breakdown.ssim.contribution > 0.0);
        assert_eq!(quick.config().mode(), ScanMode::QuickScan);
    }

    #[tokio::test]
    async fn test_breakdown_sums_to_delta() {
        let a = pattern(40, false);
        let b = pattern(40, true);
        let score = scorer(ScanMode::DeepStructural)
            .compare(&a, &b, None)
            .await
            .unwrap();
        assert!((score.breakdown.total() - score.delta).abs() < 1e-9);
        assert_eq!(score.breakdown.phash.weight, 0.3);
        assert_eq!(score.breakdown.ssim.weight, 0.7);
    }

    #[tokio::test]
    async fn test_semantic_requires_detector() {
        let raster = pattern(32, false);
        let err = scorer(ScanMode::SemanticAi)
            .compare(&raster, &raster, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SignetError::UnavailableCapability(_)));
    }

    #[tokio::test]
    async fn test_semantic_mode_with_detector() {
        let bright = Raster::filled(32, 32, [200, 200, 200, 255]).unwrap();
        let dark = Raster::filled(32, 32, [20, 20, 20, 255]).unwrap();
        let scorer = scorer(ScanMode::SemanticAi).with_detector(class_detector());

        let stages = Mutex::new(Vec::new());
        let sink = |p: crate::progress::Progress| stages.lock().unwrap().push(p.percent);
        let score = scorer.compare(&bright, &dark, Some(&sink)).await.unwrap();

        let semantic = score.semantic.expect("SemanticAI computes detections");
        assert_eq!(semantic.comparison.semantic_score, 0.5);
        assert_eq!(semantic.semantic_normalized, 500.0);
        assert!(score.ssim.is_some());
        assert!(score.low_confidence);
        assert_eq!(
            *stages.lock().unwrap(),
            vec![0, 10, 25, 30, 50, 55, 85, 95, 100]
        );
    }

    #[tokio::test]
    async fn test_feature_overlap_is_directional() {
        let bright = Raster::filled(32, 32, [200, 200, 200, 255]).unwrap();
        let dark = Raster::filled(32, 32, [20, 20, 20, 255]).unwrap();
        let scorer = scorer(ScanMode::SemanticAi).with_detector(class_detector());

        // bright has a person and a dog, dark only the person
        let forward = scorer.compare(&bright, &dark, None).await.unwrap();
        let forward_semantic = forward.semantic.as_ref().unwrap();
        assert_eq!(forward_semantic.comparison.feature_ratio, 0.5);
        assert_eq!(forward_semantic.feature_normalized, 500.0);
        assert!((forward.breakdown.features.contribution - 100.0).abs() < 1e-9);

        let backward = scorer.compare(&dark, &bright, None).await.unwrap();
        let backward_semantic = backward.semantic.as_ref().unwrap();
        assert_eq!(backward_semantic.comparison.feature_ratio, 1.0);
        assert_eq!(backward_semantic.feature_normalized, 0.0);
        assert_eq!(backward.breakdown.features.contribution, 0.0);

        assert_eq!(
            forward_semantic.comparison.semantic_score,
            backward_semantic.comparison.semantic_score
        );
        assert!(forward.delta > backward.delta);
    }

    #[tokio::test]
    async fn test_deep_compare_of_wide_strip() {
        let strip = Raster::filled(2000, 20, [90, 140, 30, 255]).unwrap();
        let score = scorer(ScanMode::DeepStructural)
            .compare(&strip, &strip.clone(), None)
            .await
            .unwrap();
        let ssim = score.ssim.expect("DeepStructural computes SSIM");
        assert_eq!(ssim.diff_map.height(), 1);
        assert!(ssim.normalized.abs() < 1e-9);
        assert_eq!(score.band, DeltaBand::Minimal);
    }

    #[tokio::test]
    async fn test_concurrent_scorers_keep_their_modes() {
        let a = pattern(32, false);
        let b = pattern(32, true);
        let quick = scorer(ScanMode::QuickScan);
        let deep = quick.with_mode(ScanMode::DeepStructural);
        let (q, d) = tokio::join!(quick.compare(&a, &b, None), deep.compare(&a, &b, None));
        assert_eq!(q.unwrap().config.mode(), ScanMode::QuickScan);
        assert_eq!(d.unwrap().config.mode(), ScanMode::DeepStructural);
    }

    #[tokio::test]
    async fn test_json_omits_diff_map() {
        let raster = pattern(32, false);
        let score = scorer(ScanMode::DeepStructural)
            .compare(&raster, &raster, None)
            .await
            .unwrap();
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["band"], "MINIMAL");
        assert!(json["ssim"].get("diffMap").is_none());
        assert_eq!(json["config"]["mode"], "DeepStructural");
    }
}
