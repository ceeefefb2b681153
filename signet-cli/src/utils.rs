//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use image::DynamicImage;
use signet_core::{decode_image, AuditBand, DeltaBand};
use tracing::debug;

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let image = decode_image(&bytes)
        .with_context(|| format!("Failed to decode image: {}", path.display()))?;
    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        width = image.width(),
        height = image.height(),
        "Loaded image"
    );
    Ok(image)
}

/// Parse a `LABEL=IMAGE` reference argument.
///
/// A bare path is labeled with its file stem.
pub fn parse_reference(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((label, path)) => {
            let label = label.trim();
            if label.is_empty() || path.is_empty() {
                return Err(format!("expected LABEL=IMAGE, got {arg:?}"));
            }
            Ok((label.to_string(), PathBuf::from(path)))
        }
        None => {
            let path = PathBuf::from(arg);
            Ok((display_name(&path), path))
        }
    }
}

/// File stem, or the whole path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

pub fn color_delta_band(band: DeltaBand) -> ColoredString {
    let text = band.as_str();
    match band {
        DeltaBand::Minimal => text.green(),
        DeltaBand::Low => text.cyan(),
        DeltaBand::Moderate => text.yellow(),
        DeltaBand::High => text.red(),
    }
}

pub fn color_audit_band(band: AuditBand) -> ColoredString {
    let text = band.as_str();
    match band {
        AuditBand::VerifiedOriginal => text.green(),
        AuditBand::PlatformConsistent => text.cyan(),
        AuditBand::ModifiedContent => text.yellow(),
        AuditBand::DivergentSource => text.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("intro=shots/a.png").unwrap(),
            ("intro".to_string(), PathBuf::from("shots/a.png"))
        );
        assert_eq!(
            parse_reference("shots/closing.jpg").unwrap(),
            ("closing".to_string(), PathBuf::from("shots/closing.jpg"))
        );
        assert!(parse_reference("=a.png").is_err());
        assert!(parse_reference("intro=").is_err());
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("nonexistent_image.png")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read file"));
    }
}
