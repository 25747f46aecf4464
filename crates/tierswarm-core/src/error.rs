// ABOUTME: Error type shared by the core crate.
// ABOUTME: Covers credential validation and parsing of tiers and safety levels.

use thiserror::Error;

/// Errors raised while configuring a session.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no API credentials configured")]
    NoCredentials,

    #[error("too many API credentials: {count} (at most {max})")]
    TooManyCredentials { count: usize, max: usize },

    #[error("unknown tier '{0}' (expected 2, 4, 8, minimum, medium or full)")]
    UnknownTier(String),

    #[error("unknown safety level '{0}' (expected read_only, confirmed or full_auto)")]
    UnknownSafetyLevel(String),
}
