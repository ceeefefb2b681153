//! Engine configuration.
//!
//! [`ComparisonConfig`] is an immutable value: each scan mode maps to a fixed
//! weight vector and switching mode produces a new config with the whole vector
//! replaced. [`EngineConfig`] loads defaults from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SignetError;
use crate::frames::ExtractOptions;
use crate::ssim::SsimOptions;

/// Comparison depth. Exactly one mode is active per comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScanMode {
    /// Fingerprints only.
    QuickScan,
    /// Fingerprints and SSIM.
    #[default]
    DeepStructural,
    /// Fingerprints, SSIM and object detection.
    #[serde(rename = "SemanticAI")]
    SemanticAi,
}

impl ScanMode {
    pub const ALL: [ScanMode; 3] = [Self::QuickScan, Self::DeepStructural, Self::SemanticAi];

    /// Fixed weight table.
    pub const fn weights(self) -> ChannelWeights {
        match self {
            Self::QuickScan => ChannelWeights {
                phash: 1.0,
                ssim: 0.0,
                features: 0.0,
                semantic: 0.0,
            },
            Self::DeepStructural => ChannelWeights {
                phash: 0.3,
                ssim: 0.7,
                features: 0.0,
                semantic: 0.0,
            },
            Self::SemanticAi => ChannelWeights {
                phash: 0.1,
                ssim: 0.2,
                features: 0.2,
                semantic: 0.5,
            },
        }
    }

    pub const fn uses_ssim(self) -> bool {
        matches!(self, Self::DeepStructural | Self::SemanticAi)
    }

    pub const fn uses_semantic(self) -> bool {
        matches!(self, Self::SemanticAi)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuickScan => "QuickScan",
            Self::DeepStructural => "DeepStructural",
            Self::SemanticAi => "SemanticAI",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = SignetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" | "quickscan" | "quick-scan" => Ok(Self::QuickScan),
            "deep" | "deepstructural" | "deep-structural" => Ok(Self::DeepStructural),
            "semantic" | "semanticai" | "semantic-ai" => Ok(Self::SemanticAi),
            other => Err(SignetError::ConfigError(format!(
                "unknown scan mode {other:?} (expected quick, deep or semantic)"
            ))),
        }
    }
}

/// Weight per fusion channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelWeights {
    pub phash: f64,
    pub ssim: f64,
    pub features: f64,
    pub semantic: f64,
}

/// Immutable per-comparison configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonConfig {
    mode: ScanMode,
    weights: ChannelWeights,
    ssim: SsimOptions,
}

impl ComparisonConfig {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            weights: mode.weights(),
            ssim: SsimOptions::default(),
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn weights(&self) -> ChannelWeights {
        self.weights
    }

    pub fn ssim_options(&self) -> &SsimOptions {
        &self.ssim
    }

    /// Same settings under another mode; the weight vector is replaced wholesale.
    pub fn with_mode(self, mode: ScanMode) -> Self {
        Self {
            mode,
            weights: mode.weights(),
            ..self
        }
    }

    pub fn with_ssim_options(self, ssim: SsimOptions) -> Self {
        Self { ssim, ..self }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self::new(ScanMode::default())
    }
}

/// Engine defaults loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Scan mode (default: DeepStructural)
    pub mode: ScanMode,
    /// SSIM window size (default: 5)
    pub ssim_window: u32,
    /// Longest side SSIM inputs are downsampled to (default: 256)
    pub ssim_max_dimension: u32,
    /// Overall frame extraction deadline (default: 10s)
    pub frame_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ssim = SsimOptions::default();
        Self {
            mode: ScanMode::default(),
            ssim_window: ssim.window_size,
            ssim_max_dimension: ssim.max_dimension,
            frame_timeout: ExtractOptions::default().timeout,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `SIGNET_MODE`, `SIGNET_SSIM_WINDOW`, `SIGNET_SSIM_MAX_DIM` and
    /// `SIGNET_FRAME_TIMEOUT_SECS`. Missing or unparseable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mode = lookup("SIGNET_MODE")
            .and_then(|v| match v.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    warn!(error = %e, "Ignoring SIGNET_MODE");
                    None
                }
            })
            .unwrap_or(defaults.mode);

        let ssim_window = lookup("SIGNET_SSIM_WINDOW")
            .and_then(|v| v.parse().ok())
            .filter(|&w: &u32| w > 0)
            .unwrap_or(defaults.ssim_window);

        let ssim_max_dimension = lookup("SIGNET_SSIM_MAX_DIM")
            .and_then(|v| v.parse().ok())
            .filter(|&d: &u32| d >= ssim_window)
            .unwrap_or(defaults.ssim_max_dimension);

        let frame_timeout = lookup("SIGNET_FRAME_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.frame_timeout);

        Self {
            mode,
            ssim_window,
            ssim_max_dimension,
            frame_timeout,
        }
    }

    pub fn comparison_config(&self) -> ComparisonConfig {
        ComparisonConfig::new(self.mode).with_ssim_options(SsimOptions {
            window_size: self.ssim_window,
            max_dimension: self.ssim_max_dimension,
            ..SsimOptions::default()
        })
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            timeout: self.frame_timeout,
            ..ExtractOptions::default()
        }
    }
}
