//! Cooperative progress reporting.
//!
//! Callbacks run synchronously at fixed milestones. They cannot pause or
//! cancel the operation that invokes them.

use serde::Serialize;

/// A milestone reached by a long-running call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub stage: &'static str,
    pub percent: u8,
}

/// Borrowed progress callback.
pub type ProgressFn<'a> = &'a (dyn Fn(Progress) + Send + Sync);

pub(crate) fn report(sink: Option<ProgressFn<'_>>, stage: &'static str, percent: u8) {
    if let Some(sink) = sink {
        sink(Progress { stage, percent });
    }
}
