//! RGBA raster buffers and the sampling seam the engine reads pixels through.
//!
//! The engine never decodes media itself. Anything that can hand back an RGBA
//! buffer at a requested resolution implements [`RasterSource`]: an in-memory
//! [`Raster`], a decoded [`image::DynamicImage`] (with the `image-io` feature),
//! or a host-provided surface such as a canvas or a video frame grabber.

use async_trait::async_trait;

use crate::error::{Result, SignetError};

/// Bytes per pixel (RGBA8).
pub const CHANNELS: usize = 4;

/// Luminance weights applied to R, G and B.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Owned RGBA8 pixel buffer in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap an RGBA8 buffer, validating that it matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SignetError::InputError(format!(
                "raster dimensions must be non-zero (got {width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(SignetError::InputError(format!(
                "raster buffer holds {} bytes, expected {expected} for {width}x{height} RGBA",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build an opaque raster from 8-bit gray levels.
    pub fn from_gray(width: u32, height: u32, luma: &[u8]) -> Result<Self> {
        if luma.len() != width as usize * height as usize {
            return Err(SignetError::InputError(format!(
                "gray buffer holds {} samples, expected {} for {width}x{height}",
                luma.len(),
                width as usize * height as usize
            )));
        }
        let data = luma.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Self::new(width, height, data)
    }

    /// A raster where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        Self::new(width, height, rgba.repeat(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Per-pixel luminance, `0.299R + 0.587G + 0.114B`. Alpha is ignored.
    pub fn luminance(&self) -> Vec<f64> {
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| {
                px[0] as f64 * LUMA_WEIGHTS[0]
                    + px[1] as f64 * LUMA_WEIGHTS[1]
                    + px[2] as f64 * LUMA_WEIGHTS[2]
            })
            .collect()
    }

    /// Resample to `new_width` x `new_height` by box averaging every channel.
    ///
    /// Upscaling degenerates to nearest-neighbour. Output is deterministic.
    pub fn resample(&self, new_width: u32, new_height: u32) -> Result<Raster> {
        if new_width == 0 || new_height == 0 {
            return Err(SignetError::InputError(format!(
                "cannot resample to {new_width}x{new_height}"
            )));
        }
        if (new_width, new_height) == self.dimensions() {
            return Ok(self.clone());
        }

        let (width, height) = (self.width as usize, self.height as usize);
        let (out_w, out_h) = (new_width as usize, new_height as usize);
        let scale_x = width as f64 / out_w as f64;
        let scale_y = height as f64 / out_h as f64;
        let mut out = vec![0u8; out_w * out_h * CHANNELS];

        for ny in 0..out_h {
            let y0 = (ny as f64 * scale_y).floor() as usize;
            let y1 = (((ny + 1) as f64 * scale_y).ceil() as usize)
                .min(height)
                .max(y0 + 1);
            for nx in 0..out_w {
                let x0 = (nx as f64 * scale_x).floor() as usize;
                let x1 = (((nx + 1) as f64 * scale_x).ceil() as usize)
                    .min(width)
                    .max(x0 + 1);
                let mut sums = [0u32; CHANNELS];
                let mut count = 0u32;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        let idx = (sy * width + sx) * CHANNELS;
                        for (c, sum) in sums.iter_mut().enumerate() {
                            *sum += self.data[idx + c] as u32;
                        }
                        count += 1;
                    }
                }
                let dst = (ny * out_w + nx) * CHANNELS;
                for (c, sum) in sums.iter().enumerate() {
                    out[dst + c] = ((sum + count / 2) / count) as u8;
                }
            }
        }

        Raster::new(new_width, new_height, out)
    }
}

/// Anything that can produce an RGBA raster at a requested resolution.
///
/// Implementations may suspend (decode, fetch, seek). A source that cannot
/// deliver pixels, for example a surface denied by a cross-origin policy,
/// returns [`SignetError::UnavailableCapability`].
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Native size of the underlying image.
    fn dimensions(&self) -> (u32, u32);

    /// Sample the image scaled to exactly `width` x `height`.
    async fn sample(&self, width: u32, height: u32) -> Result<Raster>;

    /// Sample at native resolution.
    async fn native(&self) -> Result<Raster> {
        let (width, height) = self.dimensions();
        self.sample(width, height).await
    }
}

#[async_trait]
impl RasterSource for Raster {
    fn dimensions(&self) -> (u32, u32) {
        Raster::dimensions(self)
    }

    async fn sample(&self, width: u32, height: u32) -> Result<Raster> {
        self.resample(width, height)
    }
}

#[cfg(feature = "image-io")]
mod image_io {
    use async_trait::async_trait;
    use image::imageops::FilterType;
    use image::{DynamicImage, RgbaImage};

    use super::{Raster, RasterSource};
    use crate::error::{Result, SignetError};

    #[async_trait]
    impl RasterSource for DynamicImage {
        fn dimensions(&self) -> (u32, u32) {
            (self.width(), self.height())
        }

        async fn sample(&self, width: u32, height: u32) -> Result<Raster> {
            if width == 0 || height == 0 {
                return Err(SignetError::InputError(format!(
                    "cannot sample image at {width}x{height}"
                )));
            }
            let rgba = if (width, height) == (self.width(), self.height()) {
                self.to_rgba8()
            } else {
                self.resize_exact(width, height, FilterType::Triangle)
                    .to_rgba8()
            };
            Raster::try_from(rgba)
        }
    }

    impl TryFrom<RgbaImage> for Raster {
        type Error = SignetError;

        fn try_from(image: RgbaImage) -> Result<Self> {
            let (width, height) = image.dimensions();
            Raster::new(width, height, image.into_raw())
        }
    }

    /// Decode image bytes (JPEG, PNG, GIF or WebP).
    pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(data)?)
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

#[cfg(feature = "image-io")]
pub use image_io::{decode_image, is_supported_format};
