//! Windowed structural similarity (SSIM).
//!
//! Every fully contained `window_size` x `window_size` window (stride 1) gets a
//! local SSIM value from its luminance mean, variance and covariance. Window
//! statistics come from summed-area tables, so cost is linear in pixel count
//! regardless of window size. The global score is the mean of the local values.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SignetError};
use crate::raster::{Raster, RasterSource};

/// Tuning for [`compare_ssim`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsimOptions {
    /// Side length of the local comparison window.
    pub window_size: u32,
    /// Luminance stabilization constant.
    pub k1: f64,
    /// Contrast stabilization constant.
    pub k2: f64,
    /// Dynamic range of the luminance values.
    pub dynamic_range: f64,
    /// Larger inputs are downsampled so their longest side fits.
    pub max_dimension: u32,
}

impl Default for SsimOptions {
    fn default() -> Self {
        Self {
            window_size: 5,
            k1: 0.01,
            k2: 0.03,
            dynamic_range: 255.0,
            max_dimension: 256,
        }
    }
}

impl SsimOptions {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(SignetError::ConfigError(
                "SSIM window size must be at least 1".into(),
            ));
        }
        if self.max_dimension < self.window_size {
            return Err(SignetError::ConfigError(format!(
                "SSIM max dimension {} is smaller than the window ({})",
                self.max_dimension, self.window_size
            )));
        }
        for (name, value) in [
            ("k1", self.k1),
            ("k2", self.k2),
            ("dynamic range", self.dynamic_range),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SignetError::ConfigError(format!(
                    "SSIM {name} must be a positive number (got {value})"
                )));
            }
        }
        Ok(())
    }

    /// Size both inputs are sampled at: the reference size scaled down so its
    /// longest side is at most `max_dimension`.
    ///
    /// A side never shrinks below the window, so an input the window fits
    /// still fits after downscaling. Extreme aspect ratios give up some
    /// proportion for that.
    pub fn working_size(&self, (width, height): (u32, u32)) -> (u32, u32) {
        let longest = width.max(height);
        if longest <= self.max_dimension {
            return (width, height);
        }
        let scale = self.max_dimension as f64 / longest as f64;
        let scaled = |side: u32| {
            let floor = side.min(self.window_size).max(1);
            ((side as f64 * scale).round() as u32).max(floor)
        };
        (scaled(width), scaled(height))
    }
}

/// Per-window dissimilarity rendering: `255 - similarity * 255`.
///
/// For visualization only; nothing reads it back into scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffMap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DiffMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(feature = "image-io")]
    pub fn to_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.pixels[(y * self.width + x) as usize]])
        })
    }
}

/// Result of a structural comparison.
#[derive(Debug, Clone)]
pub struct SsimResult {
    /// Mean SSIM in [-1, 1]; 1 means identical.
    pub score: f64,
    pub diff_map: DiffMap,
}

impl SsimResult {
    /// `(1 - score) / 2`, in [0, 1].
    pub fn normalized_distance(&self) -> f64 {
        (1.0 - self.score) / 2.0
    }
}

/// Summed-area table with a zero guard row and column.
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let s = self.stride;
        self.sums[(y + size) * s + x + size] - self.sums[y * s + x + size]
            - self.sums[(y + size) * s + x]
            + self.sums[y * s + x]
    }
}

/// Compare two rasters of identical size.
pub fn compare_ssim(a: &Raster, b: &Raster, options: &SsimOptions) -> Result<SsimResult> {
    options.validate()?;
    if a.dimensions() != b.dimensions() {
        return Err(SignetError::InputError(format!(
            "SSIM inputs differ in size: {}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    let (width, height) = (a.width() as usize, a.height() as usize);
    let ws = options.window_size as usize;
    if ws > width.min(height) {
        return Err(SignetError::InputError(format!(
            "SSIM window {ws} does not fit a {width}x{height} raster"
        )));
    }

    let la = a.luminance();
    let lb = b.luminance();
    let sum_a = Integral::build(width, height, |i| la[i]);
    let sum_b = Integral::build(width, height, |i| lb[i]);
    let sum_aa = Integral::build(width, height, |i| la[i] * la[i]);
    let sum_bb = Integral::build(width, height, |i| lb[i] * lb[i]);
    let sum_ab = Integral::build(width, height, |i| la[i] * lb[i]);

    let c1 = (options.k1 * options.dynamic_range).powi(2);
    let c2 = (options.k2 * options.dynamic_range).powi(2);
    let n = (ws * ws) as f64;

    let map_w = width - ws + 1;
    let map_h = height - ws + 1;
    let mut pixels = Vec::with_capacity(map_w * map_h);
    let mut total = 0.0;

    for y in 0..map_h {
        for x in 0..map_w {
            let mu_a = sum_a.window(x, y, ws) / n;
            let mu_b = sum_b.window(x, y, ws) / n;
            let var_a = sum_aa.window(x, y, ws) / n - mu_a * mu_a;
            let var_b = sum_bb.window(x, y, ws) / n - mu_b * mu_b;
            let cov = sum_ab.window(x, y, ws) / n - mu_a * mu_b;

            let numerator = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            let local = (numerator / denominator).clamp(-1.0, 1.0);

            total += local;
            pixels.push((255.0 - local * 255.0).round().clamp(0.0, 255.0) as u8);
        }
    }

    let score = total / (map_w * map_h) as f64;
    debug!(
        score,
        window = ws,
        width,
        height,
        "Computed SSIM"
    );

    Ok(SsimResult {
        score,
        diff_map: DiffMap {
            width: map_w as u32,
            height: map_h as u32,
            pixels,
        },
    })
}

/// Sample both sources at A's working size and compare them.
pub async fn compare_sources(
    a: &dyn RasterSource,
    b: &dyn RasterSource,
    options: &SsimOptions,
) -> Result<SsimResult> {
    let (width, height) = options.working_size(a.dimensions());
    let raster_a = a.sample(width, height).await?;
    let raster_b = b.sample(width, height).await?;
    compare_ssim(&raster_a, &raster_b, options)
}
