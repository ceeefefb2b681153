//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use std::error::Error as StdError;
use std::io;

use signet_core::SignetError;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage or configuration error.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (undecodable image, invalid input values).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Required capability unavailable (object detector).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Operation timed out.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TIMEOUT: i32 = 75;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        // The first cause we recognise decides the code
        let code = err.chain().find_map(classify).unwrap_or(GENERAL_ERROR);
        Self::error(code, format!("{err:#}"))
    }
}

fn classify(cause: &(dyn StdError + 'static)) -> Option<i32> {
    if let Some(err) = cause.downcast_ref::<SignetError>() {
        return Some(match err {
            SignetError::InputError(_)
            | SignetError::FingerprintMismatch { .. }
            | SignetError::ImageDecode(_) => DATA_ERROR,
            SignetError::UnavailableCapability(_) => UNAVAILABLE,
            SignetError::Timeout { .. } => TIMEOUT,
            SignetError::ConfigError(_) => USAGE_ERROR,
        });
    }
    match cause.downcast_ref::<io::Error>() {
        Some(err) if err.kind() == io::ErrorKind::NotFound => Some(INPUT_ERROR),
        _ => None,
    }
}
