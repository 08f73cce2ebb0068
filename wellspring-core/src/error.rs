//! Error types for the aquifer subsystem.
//!
//! Nothing here reaches external callers of the rating API: compute failures
//! are absorbed by the scheduler and a missing rating is simply `None`.

use std::io;

use thiserror::Error;
use wellspring_utils::CellKey;

use crate::config::ConfigError;
use crate::scheduler::FailureKind;

/// A recoverable failure while computing a cell's rating.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AquiferError {
    /// The terrain handle is not loaded, disposed, or has no backing data.
    #[error("cell {0} is unavailable")]
    CellUnavailable(CellKey),
    /// Smoothing found no usable neighbour and was deferred.
    #[error("cell {0} has no usable neighbours yet")]
    NeedsRetry(CellKey),
}

impl AquiferError {
    /// The failure-table category this error is filed under.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::CellUnavailable(_) => FailureKind::CellUnavailable,
            Self::NeedsRetry(_) => FailureKind::NeedsRetry,
        }
    }

    /// The cell the error refers to.
    #[must_use]
    pub const fn key(&self) -> CellKey {
        match self {
            Self::CellUnavailable(key) | Self::NeedsRetry(key) => *key,
        }
    }
}

/// An error decoding a persisted aquifer record.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The blob was truncated or otherwise unreadable.
    #[error("failed to read aquifer record: {0}")]
    Io(#[from] io::Error),
    /// The blob was written by a newer schema than this build knows.
    #[error("unknown aquifer schema version {0}")]
    UnknownSchema(u32),
    /// A stored rating lies outside `[0, 100]`.
    #[error("stored rating {0} is out of range")]
    RatingOutOfRange(i32),
}

/// An error constructing the aquifer service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The configuration failed validation.
    #[error("invalid aquifer config: {0}")]
    Config(#[from] ConfigError),
    /// The worker pool could not be created.
    #[error("failed to build aquifer worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
