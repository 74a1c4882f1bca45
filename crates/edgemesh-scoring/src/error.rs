//! Sampling error types.

use thiserror::Error;

pub type SampleResult<T> = Result<T, SampleError>;

/// A single resource metric could not be sampled.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{metric} unavailable: {reason}")]
    Unavailable { metric: &'static str, reason: String },

    #[error("no round-trip time known for device: {0}")]
    UnknownRtt(String),
}

impl SampleError {
    pub fn unavailable(metric: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            metric,
            reason: reason.into(),
        }
    }
}
