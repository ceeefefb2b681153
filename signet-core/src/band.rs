//! Confidence bands.
//!
//! Both the fusion delta (0-1000) and the audit score (0-1023) are banded with
//! the same inclusive upper bounds: 30, 120 and 300. Anything above 300 lands
//! in the last band.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive upper bounds of the first three bands.
pub const BAND_THRESHOLDS: [f64; 3] = [30.0, 120.0, 300.0];

fn band_index(value: f64) -> usize {
    BAND_THRESHOLDS
        .iter()
        .position(|&limit| value <= limit)
        .unwrap_or(BAND_THRESHOLDS.len())
}

/// Severity of a fusion delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeltaBand {
    Minimal,
    Low,
    Moderate,
    High,
}

impl DeltaBand {
    pub fn from_delta(delta: f64) -> Self {
        match band_index(delta) {
            0 => Self::Minimal,
            1 => Self::Low,
            2 => Self::Moderate,
            _ => Self::High,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for DeltaBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a frame audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditBand {
    VerifiedOriginal,
    PlatformConsistent,
    ModifiedContent,
    DivergentSource,
}

impl AuditBand {
    pub fn from_score(score: u16) -> Self {
        match band_index(score as f64) {
            0 => Self::VerifiedOriginal,
            1 => Self::PlatformConsistent,
            2 => Self::ModifiedContent,
            _ => Self::DivergentSource,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifiedOriginal => "VERIFIED_ORIGINAL",
            Self::PlatformConsistent => "PLATFORM_CONSISTENT",
            Self::ModifiedContent => "MODIFIED_CONTENT",
            Self::DivergentSource => "DIVERGENT_SOURCE",
        }
    }
}

impl fmt::Display for AuditBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
