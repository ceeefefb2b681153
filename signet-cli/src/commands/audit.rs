//! Audit command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use image::DynamicImage;
use signet_core::{
    collect_candidates, collect_references, compute_audit_score, AuditResult, RasterSource,
};
use tracing::warn;

use crate::utils::{color_audit_band, display_name, load_image};

/// Load every image that can be read; the rest are reported and left out.
fn load_labeled(items: Vec<(String, PathBuf)>) -> Vec<(String, DynamicImage)> {
    items
        .into_iter()
        .filter_map(|(label, path)| match load_image(&path) {
            Ok(image) => Some((label, image)),
            Err(e) => {
                warn!(%label, error = %format!("{e:#}"), "Skipping frame");
                eprintln!("{} {} ({e:#})", "Skipping:".yellow(), label);
                None
            }
        })
        .collect()
}

/// Execute the audit command.
pub async fn execute(
    references: Vec<(String, PathBuf)>,
    candidates: Vec<PathBuf>,
    audio: Option<f64>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let reference_images = load_labeled(references);
    let candidate_images = load_labeled(
        candidates
            .into_iter()
            .map(|path| (display_name(&path), path))
            .collect(),
    );

    let references = collect_references(
        reference_images
            .iter()
            .map(|(label, image)| (label.as_str(), image as &dyn RasterSource)),
    )
    .await;
    let candidates = collect_candidates(
        candidate_images
            .iter()
            .map(|(id, image)| (id.as_str(), image as &dyn RasterSource)),
    )
    .await;

    let result =
        compute_audit_score(&candidates, &references, audio).context("Audit failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize audit")?
        );
    } else if !quiet {
        print_audit(&result);
    }
    Ok(())
}

fn print_audit(result: &AuditResult) {
    println!();
    println!(
        "   {} {} / 1023  {}",
        "Score:".dimmed(),
        result.score,
        color_audit_band(result.band).bold()
    );
    println!("   {} {:.3}", "Confidence:".dimmed(), result.confidence);
    println!(
        "   {} visual {:.3}, temporal {:.3}{}",
        "Signals:".dimmed(),
        result.signals.d_visual,
        result.signals.d_temporal,
        result
            .signals
            .d_audio
            .map(|a| format!(", audio {a:.3}"))
            .unwrap_or_default()
    );
    if let Some(label) = &result.best_match_label {
        println!(
            "   {} {} <- {}",
            "Best match:".dimmed(),
            label,
            result.best_match_candidate_id.as_deref().unwrap_or("-")
        );
    }
    if result.low_confidence {
        println!(
            "   {} {}",
            "Note:".dimmed(),
            "flat frames present, matches are low-confidence".yellow()
        );
    }
    println!();
    for frame in &result.frame_matches {
        let marker = if frame.is_match {
            "MATCH".green()
        } else {
            "MISS ".red()
        };
        println!(
            "   {} {:<16} {:.3}  {}",
            marker,
            frame.label,
            frame.distance,
            frame.best_candidate_id.as_deref().unwrap_or("-").dimmed()
        );
    }
}
