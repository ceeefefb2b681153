//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use signet_core::fingerprint_source;
use tracing::{info, warn};

use crate::utils::load_image;

/// Execute the fingerprint command.
pub async fn execute(path: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let image = load_image(&path)?;
    let fingerprint = fingerprint_source(&image)
        .await
        .context("Failed to fingerprint image")?;
    let low_information = fingerprint.is_low_information();

    info!(
        path = %path.display(),
        p_hash = %fingerprint.p_hash.to_hex(),
        d_hash = %fingerprint.d_hash.to_hex(),
        "Fingerprinted image"
    );
    if low_information {
        warn!(path = %path.display(), "Image is flat; fingerprint carries little information");
    }

    if json {
        let report = json!({
            "file": path.display().to_string(),
            "fingerprint": fingerprint,
            "lowInformation": low_information,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize fingerprint")?
        );
        return Ok(());
    }

    if !quiet {
        println!();
        println!("   {} {}", "File:".dimmed(), path.display());
        if let Some((width, height)) = fingerprint.source_size {
            println!("   {} {}x{}", "Size:".dimmed(), width, height);
        }
        println!(
            "   {} {}  {}",
            "pHash:".dimmed(),
            fingerprint.p_hash.to_hex().bold(),
            fingerprint.p_hash.to_bit_string().dimmed()
        );
        println!(
            "   {} {}  {}",
            "dHash:".dimmed(),
            fingerprint.d_hash.to_hex().bold(),
            fingerprint.d_hash.to_bit_string().dimmed()
        );
        if low_information {
            println!(
                "   {} {}",
                "Note:".dimmed(),
                "flat image, low-confidence fingerprint".yellow()
            );
        }
    }

    Ok(())
}
