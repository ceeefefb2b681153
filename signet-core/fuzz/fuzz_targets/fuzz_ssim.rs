#![no_main]

//! Fuzz target for SSIM over arbitrary rasters
//!
//! The first bytes pick the dimensions and window size, the rest become
//! grayscale pixels. Comparison must either error cleanly or return a score
//! inside [-1, 1] with a diff map of the expected size.
//!
//! Run with: cargo +nightly fuzz run fuzz_ssim

use libfuzzer_sys::fuzz_target;
use signet_core::{compare_ssim, Raster, SsimOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let width = u32::from(data[0] % 48) + 1;
    let height = u32::from(data[1] % 48) + 1;
    let window_size = u32::from(data[2] % 12);
    let pixels = &data[3..];

    let len = (width * height) as usize;
    let luma_a: Vec<u8> = pixels.iter().copied().cycle().take(len).collect();
    let luma_b: Vec<u8> = pixels.iter().rev().copied().cycle().take(len).collect();

    let (Ok(a), Ok(b)) = (
        Raster::from_gray(width, height, &luma_a),
        Raster::from_gray(width, height, &luma_b),
    ) else {
        return;
    };

    let options = SsimOptions {
        window_size,
        ..SsimOptions::default()
    };
    if let Ok(result) = compare_ssim(&a, &b, &options) {
        assert!((-1.0..=1.0).contains(&result.score));
        assert!(result.diff_map.width() <= width);
        assert!(result.diff_map.height() <= height);
    }
});
