use std::time::Duration;

use thiserror::Error;

use crate::hashing::FingerprintKind;

#[derive(Error, Debug)]
pub enum SignetError {
    #[error("Input error: {0}")]
    InputError(String),

    #[error("Fingerprint mismatch: cannot compare {left} against {right}")]
    FingerprintMismatch {
        left: FingerprintKind,
        right: FingerprintKind,
    },

    #[error("Capability unavailable: {0}")]
    UnavailableCapability(String),

    #[error("Timed out after {}ms: {context}", elapsed.as_millis())]
    Timeout { context: String, elapsed: Duration },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg(feature = "image-io")]
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SignetError>;
