//! Publisher error surface.

use std::time::Duration;
use thiserror::Error;

use audix_core::{ChainError, ValidationError};

/// Failure modes of the publish surfaces. Validation and chain
/// errors are terminal; storage, timeout and overload errors are
/// retryable from the caller's point of view.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Chain(ChainError),

    #[error("queue full, event dropped")]
    Overload,

    #[error("publisher is closed")]
    Closed,

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("durable append failed after {attempts} attempt(s): {message}")]
    Storage { attempts: u32, message: String },
}

impl PublishError {
    /// Flatten chain-level validation failures into the validation
    /// variant so callers match one way.
    pub fn from_chain(error: ChainError) -> Self {
        match error {
            ChainError::Validation(inner) => Self::Validation(inner),
            other => Self::Chain(other),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(v) => v.code(),
            Self::Chain(c) => c.code(),
            Self::Overload => "overload",
            Self::Closed => "closed",
            Self::Timeout(_) => "timeout",
            Self::Storage { .. } => "storage_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Overload | Self::Timeout(_) | Self::Storage { .. })
    }
}
