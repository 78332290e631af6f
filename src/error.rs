//! Error types for the parts of the engine that can actually fail.
//!
//! Corrupt save data is not an error: it is recovered inside `save`.

use thiserror::Error;

/// A key-value store refused a read or write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not be reached (e.g. localStorage disabled).
    #[error("storage is unavailable")]
    Unavailable,
    #[error("failed to write `{key}`: {message}")]
    Write { key: String, message: String },
    #[error("failed to remove `{key}`: {message}")]
    Remove { key: String, message: String },
    #[error("failed to encode `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Economy configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid economy config")]
    Parse(#[from] serde_json::Error),
    #[error("ticks_per_sec must be at least 1")]
    ZeroTickRate,
    #[error("scroll_bottom_threshold_px must be a non-negative number, got {0}")]
    InvalidScrollThreshold(f64),
    #[error("max_tick_gap_ms must be a finite non-negative number, got {0}")]
    InvalidTickGap(f64),
}
