//! Custom error types for the interface finder.
//!
//! This module defines the primary error type, `FinderError`, used throughout the
//! crate. Using the `thiserror` crate, it provides a single place where every way
//! a scan can fail is named, from configuration issues to unresponsive devices.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically TOML parsing or a value
//!   with the wrong type in the configuration file or environment.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine but is
//!   logically wrong (e.g. `min_brightness` above `max_brightness`).
//! - **`InvalidPlan`** / **`InvalidFrame`**: Rejected inputs to the plan builder and
//!   the slice evaluator.
//! - **`Device`**: A stage or camera call failed. Device capabilities report errors
//!   as `anyhow::Error`; the controller attaches the name of the operation.
//! - **`Timeout`**: A bounded wait on a device expired (frame never became ready).
//! - **`ExposureUnreachable`**: The exposure regulator kept rejecting batches until
//!   the retry budget or the camera's exposure limit was exhausted.
//! - **`InvalidDecision`** / **`DecisionSource`**: The decision source answered with a
//!   choice that is not legal in the current phase, or could not answer at all.
//!
//! Device unresponsiveness is fatal: none of these variants is recovered inside the
//! find routine. Exposure mismatches below the retry budget never become errors.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, FinderError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Invalid scan plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Device error during {operation}: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timed out after {waited:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        waited: Duration,
    },

    #[error(
        "Exposure could not be brought into range after {attempts} attempts \
         (exposure {exposure:?}, last batch maximum {last_max})"
    )]
    ExposureUnreachable {
        attempts: u32,
        exposure: Duration,
        last_max: u16,
    },

    #[error("Decision '{decision}' is not allowed while {phase}")]
    InvalidDecision {
        decision: &'static str,
        phase: &'static str,
    },

    #[error("Decision source failed: {0}")]
    DecisionSource(String),
}

impl From<figment::Error> for FinderError {
    fn from(err: figment::Error) -> Self {
        FinderError::Config(Box::new(err))
    }
}

impl FinderError {
    /// Wrap a capability error with the name of the device operation that failed.
    pub fn device(operation: &'static str, source: anyhow::Error) -> Self {
        FinderError::Device { operation, source }
    }
}
