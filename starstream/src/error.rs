//! Error types for the fetch and decode pipeline.
//!
//! Every per-quadrant failure is carried as a value so the aggregator can
//! contain it. Absence of a STREAM element and truncated or non-finite records
//! are not errors and never appear here.

use thiserror::Error;

/// Invalid quadrant bounds or partitioning parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuadrantError {
    #[error("{axis} bounds must be finite (got {min}..{max})")]
    NonFinite {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{axis} lower bound {min} must be below upper bound {max}")]
    Inverted {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{axis} bounds {min}..{max} outside valid range {low}..{high}")]
    OutOfRange {
        axis: &'static str,
        min: f64,
        max: f64,
        low: f64,
        high: f64,
    },
    #[error("Worker count must be at least 1")]
    ZeroWorkers,
}

/// Failure to pull a binary payload out of a VOTable response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    /// The document is not well-formed XML
    #[error("XML parse error: {0}")]
    Parse(String),
    /// The STREAM text is not valid base64
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Reason a single quadrant fetch produced no stars.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network failure, timeout, or non-success HTTP status
    #[error("Transport error: {0}")]
    Transport(String),
    /// Response declared a content type that is not XML
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),
    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid quadrant at index {index}: {source}")]
    Quadrant {
        index: usize,
        #[source]
        source: QuadrantError,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The aggregator could not be constructed.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Quadrant(#[from] QuadrantError),
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
