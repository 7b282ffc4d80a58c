//! Error types for Brickio
//!
//! This module defines the common error type used throughout the system.

use thiserror::Error;

/// Common result type for Brickio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Brickio
#[derive(Debug, Error)]
pub enum Error {
    // Lookup errors
    #[error("not found: {0}")]
    NotFound(String),

    // Placement errors
    #[error("no space")]
    NoSpace,

    #[error("brick size {brick} bytes is below the minimum of {min} bytes")]
    MinimumBrickSize { brick: u64, min: u64 },

    #[error("volume would need {bricks} bricks, limit is {max}")]
    MaxBricks { bricks: usize, max: usize },

    // Store errors
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // Remote errors, propagated verbatim from the executor
    #[error("{0}")]
    Executor(String),

    // Request validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a conflict error
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// Create a store error from any displayable cause
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Create a serialization error from any displayable cause
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create an executor error
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error means a cluster cannot satisfy a placement,
    /// so the search should move on to the next cluster
    #[must_use]
    pub const fn is_placement_exhausted(&self) -> bool {
        matches!(
            self,
            Self::NoSpace | Self::MinimumBrickSize { .. } | Self::MaxBricks { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::not_found("volume abc").is_not_found());
        assert!(!Error::NoSpace.is_not_found());
    }

    #[test]
    fn test_error_placement_exhausted() {
        assert!(Error::NoSpace.is_placement_exhausted());
        assert!(
            Error::MaxBricks {
                bricks: 40,
                max: 32
            }
            .is_placement_exhausted()
        );
        assert!(
            Error::MinimumBrickSize {
                brick: 1,
                min: 1024
            }
            .is_placement_exhausted()
        );
        assert!(!Error::conflict("name").is_placement_exhausted());
    }

    #[test]
    fn test_executor_error_is_verbatim() {
        assert_eq!(Error::executor("MOCK").to_string(), "MOCK");
    }
}
