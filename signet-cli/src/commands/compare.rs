//! Compare command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use signet_core::{EngineConfig, FusionScorer, Progress, ScanMode, TridentScore};
use tracing::{debug, info, warn};

use crate::utils::{color_delta_band, load_image};

pub struct CompareArgs {
    pub original: PathBuf,
    pub submitted: PathBuf,
    pub mode: Option<ScanMode>,
    pub diff_map: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Execute the compare command.
pub async fn execute(args: CompareArgs, config: &EngineConfig) -> Result<()> {
    // Flag wins over SIGNET_MODE
    let mode = args.mode.unwrap_or(config.mode);
    let scorer = FusionScorer::new(config.comparison_config().with_mode(mode));

    let original = load_image(&args.original)?;
    let submitted = load_image(&args.submitted)?;

    let progress = |p: Progress| debug!(stage = p.stage, percent = p.percent, "Progress");
    let score = scorer
        .compare(&original, &submitted, Some(&progress))
        .await
        .context("Comparison failed")?;

    if let Some(path) = &args.diff_map {
        match &score.ssim {
            Some(ssim) => {
                ssim.diff_map
                    .to_image()
                    .save(path)
                    .with_context(|| format!("Failed to write diff map: {}", path.display()))?;
                info!(path = %path.display(), "Wrote diff map");
            }
            None => warn!(%mode, "No SSIM diff map in this mode"),
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&score).context("Failed to serialize score")?
        );
    } else if !args.quiet {
        print_score(&score);
    }
    Ok(())
}

fn print_score(score: &TridentScore) {
    println!();
    println!(
        "   {} {:.1}  {}",
        "Delta:".dimmed(),
        score.delta,
        color_delta_band(score.band).bold()
    );
    println!("   {} {}", "Mode:".dimmed(), score.config.mode());
    println!(
        "   {} pHash {} / dHash {} bits  (weight {:.1}, +{:.1})",
        "Fingerprint:".dimmed(),
        score.hash.p_hash_distance,
        score.hash.d_hash_distance,
        score.breakdown.phash.weight,
        score.breakdown.phash.contribution
    );
    if let Some(ssim) = &score.ssim {
        println!(
            "   {} {:.4}  (weight {:.1}, +{:.1})",
            "SSIM:".dimmed(),
            ssim.score,
            score.breakdown.ssim.weight,
            score.breakdown.ssim.contribution
        );
    }
    if let Some(semantic) = &score.semantic {
        println!(
            "   {} classes {:.2}, overlap {:.2}  (+{:.1})",
            "Semantic:".dimmed(),
            semantic.comparison.semantic_score,
            semantic.comparison.feature_ratio,
            score.breakdown.semantic.contribution + score.breakdown.features.contribution
        );
    }
    if score.low_confidence {
        println!(
            "   {} {}",
            "Note:".dimmed(),
            "flat input, fingerprint is low-confidence".yellow()
        );
    }
}
