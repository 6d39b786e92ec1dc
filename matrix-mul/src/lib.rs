//! Row-partitioned parallel matrix multiplication.
//!
//! `matrix-mul` computes `C = A × B` by splitting the rows of `C` into
//! contiguous partitions, one per worker. Each worker computes its block of
//! rows and sends it back to the [`Coordinator`] as raw bytes over its own
//! one-way channel; the coordinator drains every channel, copies each block
//! into place and reaps every worker.
//!
//! Workers are started through a [`Spawner`]:
//!
//! - [`TaskSpawner`] runs workers as tokio tasks sharing `Arc<Matrix>` inputs
//!   and sends blocks through in-memory pipes.
//! - [`ProcessSpawner`] runs one child process per partition. The child gets
//!   its share of the inputs as a framed job on stdin and writes its block to
//!   stdout. A binary that uses it must route the `worker` argument to
//!   [`worker::serve_stdio`].
//!
//! [`sequential::multiply`] is the single-threaded baseline; the parallel
//! result is bit-identical to it.
//!
//! # Example
//!
//! ```
//! use matrix_mul::{Matrix, multiply_parallel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), matrix_mul::Error> {
//!     let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
//!     let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]])?;
//!
//!     let c = multiply_parallel(a, b, 2).await?;
//!     assert_eq!(c.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
mod coordinator;
mod error;
pub mod job;
mod matrix;
mod partition;
pub mod sequential;
mod spawner;
pub mod worker;

pub use coordinator::{Coordinator, Multiplication, multiply_parallel};
pub use error::{Error, ErrorKind, TransferError};
pub use matrix::{Matrix, check_dimensions};
pub use partition::{Partition, partition};
pub use spawner::{ProcessSpawner, Spawner, TaskSpawner};
pub use worker::Worker;
