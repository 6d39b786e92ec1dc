//! Benchmark harness around [`matrix_mul`].
//!
//! Reads two matrices from text files, multiplies them once with the
//! sequential baseline and once with the parallel coordinator, writes both
//! products, and summarises the run as a JSON [`report::RunReport`] that can
//! be uploaded to a telemetry endpoint.

pub mod config;
mod error;
pub mod io;
pub mod report;
pub mod runner;
pub mod telemetry;
pub mod usage;

pub use error::Error;
