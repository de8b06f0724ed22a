//! Error taxonomy for the inference pipeline.
//!
//! Request-path errors map onto HTTP statuses at the API edge; load errors
//! are startup-only and are captured into the model registry instead of
//! being raised to a request.

use thiserror::Error;

/// Failures that can abort (or degrade) a single inference request.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Malformed or undecodable client payload. Surfaced as 400.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One or more required models are not loaded. Surfaced as 503.
    #[error("service not ready: {0}")]
    NotReady(String),

    /// Image codec failure on resize/crop/metadata. Surfaced as 500.
    #[error("image codec failed during {op}: {message}")]
    Decode { op: &'static str, message: String },

    /// Execution engine failure during detect or embed. Surfaced as 500.
    #[error("engine run failed: {0}")]
    Run(String),
}

impl InferenceError {
    pub fn decode(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            op,
            message: err.to_string(),
        }
    }
}

/// Startup-only model load failure. Captured into the owning [`ModelSlot`],
/// never propagated to a request.
///
/// [`ModelSlot`]: crate::engine::registry::ModelSlot
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LoadError(pub String);
