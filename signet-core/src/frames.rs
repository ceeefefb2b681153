//! Frame extraction from a seekable video handle.
//!
//! A video has a single decode cursor, so [`VideoSource::frame_at`] takes
//! `&mut self` and frames are pulled strictly one after another. The whole
//! extraction runs under one deadline; frames decoded before it expires are
//! kept.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::consensus::Candidate;
use crate::error::{Result, SignetError};
use crate::hashing::{compute_fingerprint, SAMPLE_SIZE};
use crate::raster::Raster;

/// Default overall extraction deadline.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default preview raster size.
pub const PREVIEW_SIZE: (u32, u32) = (160, 90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Deadline for the whole extraction, not per frame.
    pub timeout: Duration,
    /// Size of the preview raster attached to each candidate; None skips it.
    pub preview_size: Option<(u32, u32)>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXTRACT_TIMEOUT,
            preview_size: Some(PREVIEW_SIZE),
        }
    }
}

/// A seekable video handle supplied by the host.
#[async_trait]
pub trait VideoSource: Send {
    /// Seek to `timestamp_secs` and decode the frame there.
    async fn frame_at(&mut self, timestamp_secs: f64) -> Result<Raster>;
}

/// A timestamp that produced no candidate.
#[derive(Debug)]
pub struct SkippedFrame {
    pub timestamp: f64,
    pub error: SignetError,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Candidates in timestamp request order.
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedFrame>,
    /// The deadline expired before every timestamp was reached.
    pub timed_out: bool,
}

/// Candidate id for a frame timestamp.
pub fn frame_id(timestamp_secs: f64) -> String {
    format!("frame_{timestamp_secs}")
}

fn candidate_from_frame(
    timestamp: f64,
    frame: &Raster,
    options: &ExtractOptions,
) -> Result<Candidate> {
    let sample = frame.resample(SAMPLE_SIZE, SAMPLE_SIZE)?;
    let mut fingerprint = compute_fingerprint(&sample)?;
    fingerprint.source_size = Some(frame.dimensions());
    let preview = options
        .preview_size
        .map(|(width, height)| frame.resample(width, height))
        .transpose()?;
    Ok(Candidate {
        id: frame_id(timestamp),
        timestamp: Some(timestamp),
        fingerprint,
        preview,
    })
}

/// Pull frames at `timestamps` and fingerprint them.
///
/// Frames that fail to decode are logged and skipped. When the deadline
/// passes, every timestamp not yet reached is recorded as a
/// [`SignetError::Timeout`] skip and the frames gathered so far are returned.
#[instrument(skip_all, fields(frames = timestamps.len(), timeout_ms = options.timeout.as_millis() as u64))]
pub async fn extract_frames(
    video: &mut dyn VideoSource,
    timestamps: &[f64],
    options: &ExtractOptions,
) -> ExtractionReport {
    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut report = ExtractionReport::default();

    for (index, &timestamp) in timestamps.iter().enumerate() {
        if !timestamp.is_finite() || timestamp < 0.0 {
            warn!(timestamp, "Skipping invalid timestamp");
            report.skipped.push(SkippedFrame {
                timestamp,
                error: SignetError::InputError(format!("invalid timestamp {timestamp}")),
            });
            continue;
        }

        let frame = match timeout_at(deadline, video.frame_at(timestamp)).await {
            Ok(frame) => frame,
            Err(_) => {
                let elapsed = started.elapsed();
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    remaining = timestamps.len() - index,
                    "Frame extraction deadline reached"
                );
                report.timed_out = true;
                report
                    .skipped
                    .extend(timestamps[index..].iter().map(|&timestamp| SkippedFrame {
                        timestamp,
                        error: SignetError::Timeout {
                            context: format!("frame at {timestamp}s"),
                            elapsed,
                        },
                    }));
                break;
            }
        };

        match frame.and_then(|frame| candidate_from_frame(timestamp, &frame, options)) {
            Ok(candidate) => {
                debug!(id = %candidate.id, "Extracted frame");
                report.candidates.push(candidate);
            }
            Err(e) => {
                warn!(timestamp, error = %e, "Skipping frame");
                report.skipped.push(SkippedFrame {
                    timestamp,
                    error: e,
                });
            }
        }
    }

    info!(
        extracted = report.candidates.len(),
        skipped = report.skipped.len(),
        timed_out = report.timed_out,
        "Frame extraction finished"
    );
    report
}
