//! Error types for the benchmark harness.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::FormatError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    MatrixMul(#[from] matrix_mul::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("resource usage unavailable: {0}")]
    Usage(#[source] std::io::Error),

    #[error("failed to start worker processes: {0}")]
    WorkerProgram(#[source] std::io::Error),

    #[error("telemetry request failed: {0}")]
    Telemetry(#[from] reqwest::Error),

    #[error("telemetry endpoint returned {0}")]
    TelemetryStatus(reqwest::StatusCode),
}
