//! Robustness tests for the perceptual engine.
//!
//! These tests verify that fingerprints stay close after benign transforms
//! (compression, resizing, brightness shifts), move far apart after
//! structural ones, and that the full compare and audit paths agree.

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use signet_core::{
    collect_candidates, collect_references, compute_audit_score, decode_image, fingerprint_source,
    is_supported_format, ComparisonConfig, DeltaBand, FusionScorer, RasterSource, ScanMode,
};
use std::io::Cursor;

/// Maximum acceptable Hamming distance for "similar" images.
/// With 64-bit hash, 10 bits = ~15% difference.
const SIMILARITY_THRESHOLD: u32 = 10;

/// Left-to-right luminance ramp.
fn ramp_horizontal(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| {
        Luma([(30 + x * 190 / width) as u8])
    }))
}

/// Top-to-bottom luminance ramp.
fn ramp_vertical(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, y| {
        Luma([(30 + y * 190 / height) as u8])
    }))
}

/// Checkerboard with `cell`-pixel squares.
fn checkerboard(size: u32, cell: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Luma([220])
        } else {
            Luma([35])
        }
    }))
}

/// Compress an image to JPEG with the specified quality (1-100).
fn compress_jpeg(img: &DynamicImage, quality: u8) -> DynamicImage {
    let mut buffer = Cursor::new(Vec::new());

    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .expect("JPEG encoding failed");

    decode_image(&buffer.into_inner()).expect("JPEG decoding failed")
}

fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

async fn distances(a: &DynamicImage, b: &DynamicImage) -> (u32, u32) {
    let fa = fingerprint_source(a).await.expect("Failed to fingerprint a");
    let fb = fingerprint_source(b).await.expect("Failed to fingerprint b");
    (
        fa.p_hash.hamming_distance(&fb.p_hash).unwrap(),
        fa.d_hash.hamming_distance(&fb.d_hash).unwrap(),
    )
}

// ============================================================================
// Fingerprint Tests
// ============================================================================

#[tokio::test]
async fn test_fingerprint_jpeg_compression_85() {
    let original = ramp_horizontal(512, 512);
    let compressed = compress_jpeg(&original, 85);

    let (p, d) = distances(&original, &compressed).await;
    println!("JPEG 85% quality - pHash {}, dHash {}", p, d);

    assert!(p <= SIMILARITY_THRESHOLD, "pHash distance {p}");
    assert!(d <= SIMILARITY_THRESHOLD, "dHash distance {d}");
}

#[tokio::test]
async fn test_fingerprint_resize_50_percent() {
    let original = ramp_horizontal(512, 512);
    let resized = original.resize_exact(256, 256, image::imageops::FilterType::Lanczos3);

    let (p, d) = distances(&original, &resized).await;
    println!("Resize 50% - pHash {}, dHash {}", p, d);

    assert!(p <= SIMILARITY_THRESHOLD, "pHash distance {p}");
    assert!(d <= SIMILARITY_THRESHOLD, "dHash distance {d}");
}

#[tokio::test]
async fn test_fingerprint_survives_brightness_shift() {
    let original = ramp_horizontal(256, 256);
    let brighter = original.brighten(20);

    let (p, d) = distances(&original, &brighter).await;
    println!("Brightness +20 - pHash {}, dHash {}", p, d);

    assert!(p <= 2, "pHash distance {p}");
    assert!(d <= 2, "dHash distance {d}");
}

#[tokio::test]
async fn test_dhash_flips_on_rotation() {
    let original = ramp_horizontal(256, 256);
    let rotated = original.rotate180();

    let (_, d) = distances(&original, &rotated).await;
    println!("Rotate 180 - dHash {}", d);

    assert!(d > 48, "reversed gradient should flip most dHash bits ({d})");
}

#[tokio::test]
async fn test_decode_png_roundtrip() {
    let original = checkerboard(128, 16);
    let bytes = encode_png(&original);
    assert!(is_supported_format(&bytes));
    assert!(!is_supported_format(b"definitely not an image"));

    let decoded = decode_image(&bytes).unwrap();
    assert_eq!(GenericImageView::dimensions(&decoded), (128, 128));
    assert_eq!(distances(&original, &decoded).await, (0, 0));
}

// ============================================================================
// Fusion Tests
// ============================================================================

#[tokio::test]
async fn test_deep_structural_identity() {
    let original = checkerboard(300, 25);
    let scorer = FusionScorer::new(ComparisonConfig::new(ScanMode::DeepStructural));

    let score = scorer.compare(&original, &original, None).await.unwrap();
    assert!(score.delta < 1e-6, "delta {}", score.delta);
    assert_eq!(score.band, DeltaBand::Minimal);

    let ssim = score.ssim.expect("SSIM is computed in DeepStructural");
    // 300px is downsampled to 256, then every 5x5 window yields one pixel.
    assert_eq!(ssim.diff_map.width(), 252);
    assert_eq!(ssim.diff_map.height(), 252);
    assert!(ssim.diff_map.pixels().iter().all(|&p| p == 0));
}

#[tokio::test]
async fn test_deep_structural_ranks_edits() {
    let original = ramp_horizontal(256, 256);
    let recompressed = compress_jpeg(&original, 85);
    let unrelated = checkerboard(256, 32);
    let scorer = FusionScorer::new(ComparisonConfig::new(ScanMode::DeepStructural));

    let close = scorer.compare(&original, &recompressed, None).await.unwrap();
    let far = scorer.compare(&original, &unrelated, None).await.unwrap();
    println!("recompressed delta {:.1}, unrelated delta {:.1}", close.delta, far.delta);

    assert!(close.delta < far.delta);
    assert!(matches!(close.band, DeltaBand::Minimal | DeltaBand::Low));
    assert!(matches!(far.band, DeltaBand::Moderate | DeltaBand::High));
}

// ============================================================================
// Audit Tests
// ============================================================================

#[tokio::test]
async fn test_audit_finds_recompressed_frame() {
    let ramp_h = ramp_horizontal(512, 512);
    let checker = checkerboard(512, 64);
    let ramp_v = ramp_vertical(512, 512);
    let upload = compress_jpeg(&ramp_h, 85);

    let references = collect_references([
        ("ramp-h", &ramp_h as &dyn RasterSource),
        ("checker", &checker as &dyn RasterSource),
        ("ramp-v", &ramp_v as &dyn RasterSource),
    ])
    .await;
    let candidates = collect_candidates([("frame_0", &upload as &dyn RasterSource)]).await;

    let audit = compute_audit_score(&candidates, &references, None).unwrap();
    let flags: Vec<bool> = audit.frame_matches.iter().map(|m| m.is_match).collect();
    assert_eq!(flags, vec![true, false, false]);
    assert!((audit.signals.d_temporal - 2.0 / 3.0).abs() < 1e-9);
    assert!(audit.signals.d_visual < 0.1);
    assert_eq!(audit.best_match_label.as_deref(), Some("ramp-h"));
    assert_eq!(audit.best_match_candidate_id.as_deref(), Some("frame_0"));
}
