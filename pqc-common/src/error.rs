//! Common error types for PepperQC

use thiserror::Error;

/// Common result type for PepperQC operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the PepperQC crates
///
/// The detection producers never fail on malformed *content* (bad samples,
/// orphan markers, invalid tiers are skipped or corrected). These variants
/// cover the boundaries around them: reading input files, decoding typed
/// records and loading configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding or encoding error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input of the wrong shape for the requested operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
