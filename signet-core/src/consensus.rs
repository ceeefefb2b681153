//! Multi-frame consensus matching.
//!
//! A sparse set of labeled reference frames (the expected skeleton of a video)
//! is aligned against a pool of candidate frames. Each reference keeps its
//! nearest candidate under a fixed dHash/pHash blend, and two signals come out:
//!
//! - `dVisual`: the single best distance across all references. It answers
//!   whether one strong alignment exists anywhere.
//! - `dTemporal`: the share of references left without a match. One strong
//!   match does not make up for a collapsed skeleton.
//!
//! An optional audio distance is blended in when the caller supplies one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::band::AuditBand;
use crate::error::{Result, SignetError};
use crate::fusion::Contribution;
use crate::hashing::{fingerprint_source, DualFingerprint};
use crate::raster::{Raster, RasterSource};

/// A reference is matched when its best fused distance is at or below this.
pub const VISUAL_MATCH_THRESHOLD: f64 = 0.25;

/// dHash share of the per-pair distance.
pub const D_HASH_WEIGHT: f64 = 0.6;
/// pHash share of the per-pair distance.
pub const P_HASH_WEIGHT: f64 = 0.4;

pub const VISUAL_WEIGHT: f64 = 0.65;
pub const TEMPORAL_WEIGHT: f64 = 0.35;

pub const AUDIO_VISUAL_WEIGHT: f64 = 0.45;
pub const AUDIO_WEIGHT: f64 = 0.35;
pub const AUDIO_TEMPORAL_WEIGHT: f64 = 0.20;

/// Top of the audit score scale.
pub const AUDIT_SCALE: u16 = 1023;

/// One labeled frame of the expected skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFrame {
    pub label: String,
    /// Declared importance in [0, 1]. Reported only; matching ignores it.
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub fingerprint: DualFingerprint,
    /// Free-form data for rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ReferenceFrame {
    pub fn new(label: impl Into<String>, fingerprint: DualFingerprint) -> Self {
        Self {
            label: label.into(),
            weight: 1.0,
            fingerprint,
            meta: None,
        }
    }

    /// Set the declared weight, clamped to [0, 1].
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = if weight.is_nan() {
            0.0
        } else {
            weight.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A frame from the asset under audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub fingerprint: DualFingerprint,
    #[serde(skip)]
    pub preview: Option<Raster>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, fingerprint: DualFingerprint) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            fingerprint,
            preview: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Distance signals, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSignals {
    pub d_visual: f64,
    pub d_temporal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_audio: Option<f64>,
}

/// Best alignment found for one reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMatchResult {
    pub label: String,
    /// None when no candidate came closer than the maximum distance.
    pub best_candidate_id: Option<String>,
    pub distance: f64,
    pub is_match: bool,
    /// Reference or best candidate fingerprints a flat frame.
    pub low_confidence: bool,
}

/// Weighted contribution of each signal to the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AuditBreakdown {
    pub visual: Contribution,
    pub temporal: Contribution,
    pub audio: Contribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    /// Quantized score on the 0-1023 scale.
    pub score: u16,
    pub band: AuditBand,
    /// `max(0, 1 - raw score)`.
    pub confidence: f64,
    pub signals: AuditSignals,
    pub breakdown: AuditBreakdown,
    pub frame_matches: Vec<FrameMatchResult>,
    pub matched_references: usize,
    pub best_match_label: Option<String>,
    pub best_match_meta: Option<Value>,
    pub best_match_candidate_id: Option<String>,
    /// Any frame match rests on a flat fingerprint.
    pub low_confidence: bool,
}

/// Fused distance between one candidate and one reference.
pub fn pair_distance(candidate: &DualFingerprint, reference: &DualFingerprint) -> Result<f64> {
    let d_hash = candidate.d_hash.normalized_distance(&reference.d_hash)?;
    let p_hash = candidate.p_hash.normalized_distance(&reference.p_hash)?;
    Ok(D_HASH_WEIGHT * d_hash + P_HASH_WEIGHT * p_hash)
}

fn best_match(reference: &ReferenceFrame, candidates: &[Candidate]) -> Result<FrameMatchResult> {
    let mut distance = 1.0;
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        let d = pair_distance(&candidate.fingerprint, &reference.fingerprint)?;
        if d < distance {
            distance = d;
            best = Some(candidate);
        }
    }
    let best_candidate_id = best.map(|c| c.id.clone());
    let is_match = best_candidate_id.is_some() && distance <= VISUAL_MATCH_THRESHOLD;
    let low_confidence = reference.fingerprint.is_low_information()
        || best.is_some_and(|c| c.fingerprint.is_low_information());
    debug!(
        label = %reference.label,
        best = best_candidate_id.as_deref().unwrap_or("-"),
        distance,
        is_match,
        low_confidence,
        "Reference matched"
    );
    Ok(FrameMatchResult {
        label: reference.label.clone(),
        best_candidate_id,
        distance,
        is_match,
        low_confidence,
    })
}

/// Align candidates against references and score the audit.
///
/// `audio_score` is an audio distance in [0, 1]; its presence alone selects the
/// three-signal blend. Empty inputs produce the worst score instead of an error.
pub fn compute_audit_score(
    candidates: &[Candidate],
    references: &[ReferenceFrame],
    audio_score: Option<f64>,
) -> Result<AuditResult> {
    if let Some(audio) = audio_score {
        if !audio.is_finite() || !(0.0..=1.0).contains(&audio) {
            return Err(SignetError::InputError(format!(
                "audio score must be within [0, 1], got {audio}"
            )));
        }
    }
    if candidates.is_empty() || references.is_empty() {
        warn!(
            candidates = candidates.len(),
            references = references.len(),
            "Audit has an empty frame set"
        );
    }

    let frame_matches = references
        .iter()
        .map(|reference| best_match(reference, candidates))
        .collect::<Result<Vec<_>>>()?;

    let mut d_visual = 1.0;
    let mut best: Option<usize> = None;
    for (index, result) in frame_matches.iter().enumerate() {
        if result.best_candidate_id.is_some() && result.distance < d_visual {
            d_visual = result.distance;
            best = Some(index);
        }
    }
    let best_match_label = best.map(|i| references[i].label.clone());
    let best_match_meta = best.and_then(|i| references[i].meta.clone());
    let best_match_candidate_id = best.and_then(|i| frame_matches[i].best_candidate_id.clone());
    let low_confidence = frame_matches.iter().any(|m| m.low_confidence);
    if low_confidence {
        warn!("Audit includes flat frames, fingerprint matches are low-confidence");
    }

    let matched_references = frame_matches.iter().filter(|m| m.is_match).count();
    let d_temporal = if references.is_empty() {
        1.0
    } else {
        1.0 - matched_references as f64 / references.len() as f64
    };

    let contribution = |weight: f64, signal: f64| Contribution {
        weight,
        contribution: weight * signal,
    };
    let breakdown = match audio_score {
        Some(d_audio) => AuditBreakdown {
            visual: contribution(AUDIO_VISUAL_WEIGHT, d_visual),
            temporal: contribution(AUDIO_TEMPORAL_WEIGHT, d_temporal),
            audio: contribution(AUDIO_WEIGHT, d_audio),
        },
        None => AuditBreakdown {
            visual: contribution(VISUAL_WEIGHT, d_visual),
            temporal: contribution(TEMPORAL_WEIGHT, d_temporal),
            audio: contribution(0.0, 0.0),
        },
    };
    let raw = breakdown.visual.contribution
        + breakdown.temporal.contribution
        + breakdown.audio.contribution;
    let scale = AUDIT_SCALE as f64;
    let score = (raw * scale).round().clamp(0.0, scale) as u16;
    let band = AuditBand::from_score(score);

    info!(
        score,
        %band,
        d_visual,
        d_temporal,
        d_audio = ?audio_score,
        matched = matched_references,
        references = references.len(),
        candidates = candidates.len(),
        "Audit complete"
    );

    Ok(AuditResult {
        score,
        band,
        confidence: (1.0 - raw).max(0.0),
        signals: AuditSignals {
            d_visual,
            d_temporal,
            d_audio: audio_score,
        },
        breakdown,
        frame_matches,
        matched_references,
        best_match_label,
        best_match_meta,
        best_match_candidate_id,
        low_confidence,
    })
}

/// Fingerprint labeled sources into reference frames.
///
/// Sources whose pixels cannot be obtained are logged and left out.
pub async fn collect_references<'a, S>(
    sources: impl IntoIterator<Item = (S, &'a dyn RasterSource)>,
) -> Vec<ReferenceFrame>
where
    S: Into<String>,
{
    let mut references = Vec::new();
    for (label, source) in sources {
        let label = label.into();
        match fingerprint_source(source).await {
            Ok(fingerprint) => references.push(ReferenceFrame::new(label, fingerprint)),
            Err(e) => warn!(%label, error = %e, "Skipping reference frame"),
        }
    }
    references
}

/// Fingerprint identified sources into candidates.
///
/// Sources whose pixels cannot be obtained are logged and left out.
pub async fn collect_candidates<'a, S>(
    sources: impl IntoIterator<Item = (S, &'a dyn RasterSource)>,
) -> Vec<Candidate>
where
    S: Into<String>,
{
    let mut candidates = Vec::new();
    for (id, source) in sources {
        let id = id.into();
        match fingerprint_source(source).await {
            Ok(fingerprint) => candidates.push(Candidate::new(id, fingerprint)),
            Err(e) => warn!(%id, error = %e, "Skipping candidate"),
        }
    }
    candidates
}
