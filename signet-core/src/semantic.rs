//! Object-detection based comparison.
//!
//! The detector itself is an external capability: hosts plug one in through
//! [`DetectorLoader`] and the engine loads it at most once via [`LazyDetector`].
//!
//! Two signals come out of a pair of detection lists:
//!
//! - **semantic score**: Jaccard similarity of the two class sets.
//! - **feature ratio**: for each detection in A, the best IoU against a
//!   same-class detection in B, averaged over A's detections. It is asymmetric:
//!   `feature_ratio(a, b)` need not equal `feature_ratio(b, a)`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

use crate::error::{Result, SignetError};
use crate::progress::{report, ProgressFn};
use crate::raster::Raster;

/// Axis-aligned box in pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union. Degenerate boxes (zero union) give 0.
    pub fn iou(&self, other: &Self) -> f64 {
        let x_a = self.x.max(other.x);
        let y_a = self.y.max(other.y);
        let x_b = (self.x + self.width).min(other.x + other.width);
        let y_b = (self.y + self.height).min(other.y + other.height);
        let intersection = (x_b - x_a).max(0.0) * (y_b - y_a).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One object found by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            class: class.into(),
            bbox,
            confidence,
        }
    }
}

/// Trait for object-detection backends.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, image: &Raster) -> Result<Vec<Detection>>;
}

#[async_trait]
impl<F> ObjectDetector for F
where
    F: Fn(&Raster) -> Result<Vec<Detection>> + Send + Sync,
{
    async fn detect(&self, image: &Raster) -> Result<Vec<Detection>> {
        self(image)
    }
}

/// Produces a ready detector. May be slow (model download, backend warm-up).
#[async_trait]
pub trait DetectorLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ObjectDetector>>;
}

/// Loads a detector on first use and shares it afterwards.
///
/// Concurrent first callers await the same pending load. A failed load is not
/// memoized, so a later call attempts it again; nothing retries automatically.
pub struct LazyDetector {
    loader: Option<Box<dyn DetectorLoader>>,
    detector: OnceCell<Arc<dyn ObjectDetector>>,
}

impl LazyDetector {
    pub fn new(loader: impl DetectorLoader + 'static) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            detector: OnceCell::new(),
        }
    }

    /// Wrap a detector that is already loaded.
    pub fn ready(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            loader: None,
            detector: OnceCell::new_with(Some(detector)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.detector.initialized()
    }

    /// Get the detector, loading it if this is the first call.
    #[instrument(level = "debug", skip_all)]
    pub async fn get(&self, progress: Option<ProgressFn<'_>>) -> Result<Arc<dyn ObjectDetector>> {
        let detector = self
            .detector
            .get_or_try_init(|| async {
                let loader = self.loader.as_ref().ok_or_else(|| {
                    SignetError::UnavailableCapability("no detector loader configured".into())
                })?;
                info!("Loading object detection model");
                report(progress, "Initializing AI model", 1);
                report(progress, "Downloading AI model", 25);
                let detector = loader.load().await.map_err(|e| {
                    error!(error = %e, "Model load failed");
                    SignetError::UnavailableCapability(format!(
                        "object detection model failed to load: {e}"
                    ))
                })?;
                report(progress, "AI model ready", 100);
                info!("Object detection model ready");
                Ok::<_, SignetError>(detector)
            })
            .await?;
        Ok(Arc::clone(detector))
    }
}

impl std::fmt::Debug for LazyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyDetector")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Semantic signals for one image pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticComparison {
    /// Jaccard similarity of the class sets, in [0, 1].
    pub semantic_score: f64,
    /// Mean best same-class IoU over A's detections, in [0, 1].
    pub feature_ratio: f64,
    pub detections_a: usize,
    pub detections_b: usize,
}

impl SemanticComparison {
    pub fn from_detections(a: &[Detection], b: &[Detection]) -> Self {
        Self {
            semantic_score: jaccard(&class_set(a), &class_set(b)),
            feature_ratio: feature_ratio(a, b),
            detections_a: a.len(),
            detections_b: b.len(),
        }
    }

    pub fn semantic_distance(&self) -> f64 {
        1.0 - self.semantic_score
    }

    pub fn feature_distance(&self) -> f64 {
        1.0 - self.feature_ratio
    }
}

pub fn class_set(detections: &[Detection]) -> BTreeSet<&str> {
    detections.iter().map(|d| d.class.as_str()).collect()
}

/// Jaccard similarity. Two empty sets are treated as identical (1.0).
pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Mean best same-class IoU of A's detections against B. Zero when A is empty.
pub fn feature_ratio(a: &[Detection], b: &[Detection]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a
        .iter()
        .map(|det_a| {
            b.iter()
                .filter(|det_b| det_b.class == det_a.class)
                .map(|det_b| det_a.bbox.iou(&det_b.bbox))
                .fold(0.0, f64::max)
        })
        .sum();
    total / a.len() as f64
}

/// Run the detector over both rasters and compare the results.
pub async fn compare_semantic(
    detector: &dyn ObjectDetector,
    a: &Raster,
    b: &Raster,
) -> Result<SemanticComparison> {
    let (objects_a, objects_b) = tokio::try_join!(detector.detect(a), detector.detect(b))?;
    let comparison = SemanticComparison::from_detections(&objects_a, &objects_b);
    debug!(
        jaccard = comparison.semantic_score,
        feature_ratio = comparison.feature_ratio,
        detections_a = comparison.detections_a,
        detections_b = comparison.detections_b,
        "Semantic comparison"
    );
    Ok(comparison)
}
