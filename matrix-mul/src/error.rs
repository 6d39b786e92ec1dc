//! Error types for matrix-mul operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid worker count: {0}")]
    InvalidWorkerCount(usize),

    #[error("matrix dimension mismatch: A is {0}x{1}, B is {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),

    #[error("ragged matrix: row {row} has {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("buffer of {found} values does not fit a {rows}x{cols} matrix")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        found: usize,
    },

    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer from worker {id} failed: {source}")]
    Transfer {
        id: usize,
        #[source]
        source: TransferError,
    },

    #[error("worker {id} failed: {reason}")]
    WorkerFailed { id: usize, reason: String },

    #[error("malformed job: {0}")]
    Job(String),

    #[error("timeout waiting for workers")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while draining one channel.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("channel closed after {received} of {expected} bytes")]
    Short { expected: usize, received: usize },

    #[error("unexpected bytes after the {expected}-byte block")]
    Trailing { expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any worker was started.
    Configuration,
    /// A worker or its channel could not be created, or an OS call on a
    /// worker handle failed.
    ResourceCreation,
    /// A channel did not deliver its block.
    Transfer,
    /// A worker ran but did not finish cleanly.
    WorkerComputation,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidWorkerCount(_)
            | Error::DimensionMismatch(..)
            | Error::RaggedRows { .. }
            | Error::ShapeMismatch { .. } => ErrorKind::Configuration,
            // bare io errors come from waiting on or killing worker handles
            Error::Spawn { .. } | Error::Io(_) => ErrorKind::ResourceCreation,
            Error::Transfer { .. } | Error::Timeout => ErrorKind::Transfer,
            Error::WorkerFailed { .. } | Error::Job(_) => ErrorKind::WorkerComputation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::InvalidWorkerCount(0).kind(), ErrorKind::Configuration);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Transfer);
        assert_eq!(
            Error::Job("bad frame".to_string()).kind(),
            ErrorKind::WorkerComputation
        );
    }

    #[test]
    fn test_io_is_resource_failure() {
        let err = Error::from(std::io::Error::other("wait failed"));
        assert_eq!(err.kind(), ErrorKind::ResourceCreation);
    }
}
