//! Subcommand implementations.

pub mod audit;
pub mod compare;
pub mod fingerprint;
