//! Parallel multiplication coordinator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, info, warn};

use crate::channel::Receiver;
use crate::error::TransferError;
use crate::job::Job;
use crate::matrix::check_dimensions;
use crate::partition::partition;
use crate::spawner::{Spawner, TaskSpawner};
use crate::worker::{Worker, WorkerExit};
use crate::{Error, Matrix, Partition};

/// How long a worker whose channel failed may take to exit before it is killed.
const FAILED_WORKER_GRACE: Duration = Duration::from_millis(500);

/// Outcome of [`Coordinator::multiply`].
#[derive(Debug, Clone)]
pub struct Multiplication {
    pub result: Matrix,
    pub partitions: Vec<Partition>,
    /// Wall-clock time from the first spawn to the last reap.
    pub elapsed: Duration,
}

/// Splits `A x B` by output rows across workers and reassembles the blocks.
///
/// One worker and one channel are created per partition. All channels are
/// drained concurrently, so workers may finish in any order; each block is
/// copied into the result only once it has arrived completely. Every worker
/// is reaped before `multiply` returns, on success and on failure.
///
/// # Example
///
/// ```no_run
/// use matrix_mul::{Coordinator, Matrix, ProcessSpawner};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
///     let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]])?;
///
///     let coordinator = Coordinator::new(2).with_spawner(ProcessSpawner::current_exe()?);
///     let product = coordinator.multiply(a, b).await?;
///     assert_eq!(product.result.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Coordinator {
    workers: usize,
    spawner: Arc<dyn Spawner>,
    timeout: Option<Duration>,
}

impl Coordinator {
    /// Creates a coordinator running `workers` tasks on the current runtime.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            spawner: Arc::new(TaskSpawner::default()),
            timeout: None,
        }
    }

    pub fn with_spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Gives up, killing every worker, if the blocks have not all arrived in time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn multiply(
        &self,
        a: impl Into<Arc<Matrix>>,
        b: impl Into<Arc<Matrix>>,
    ) -> Result<Multiplication, Error> {
        let a = a.into();
        let b = b.into();
        check_dimensions(&a, &b)?;
        let partitions = partition(a.rows(), self.workers)?;
        let cols = b.cols();

        let started = Instant::now();
        info!(
            workers = self.workers,
            rows = a.rows(),
            inner = a.cols(),
            cols,
            "starting parallel multiplication"
        );

        let workers = self.spawn_all(&partitions, &a, &b).await?;

        let mut receivers = Vec::with_capacity(workers.len());
        let mut exits = Vec::with_capacity(workers.len());
        for worker in workers {
            let (partition, receiver, exit) = worker.into_parts();
            receivers.push((partition, receiver));
            exits.push(exit);
        }

        let mut result = Matrix::zeros(a.rows(), cols);
        let drained = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, drain(receivers, cols, &mut result))
                .await
                .unwrap_or(Err(Error::Timeout)),
            None => drain(receivers, cols, &mut result).await,
        };

        match drained {
            Ok(()) => {
                reap(exits).await?;
                let elapsed = started.elapsed();
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "parallel multiplication finished"
                );
                Ok(Multiplication {
                    result,
                    partitions,
                    elapsed,
                })
            }
            Err(Error::Transfer { id, source }) => {
                warn!(id, error = %source, "channel failed, aborting multiplication");
                Err(abort_after_transfer(exits, id, source).await)
            }
            Err(err) => {
                warn!(error = %err, "aborting multiplication, killing workers");
                kill_all(exits).await;
                Err(err)
            }
        }
    }

    async fn spawn_all(
        &self,
        partitions: &[Partition],
        a: &Arc<Matrix>,
        b: &Arc<Matrix>,
    ) -> Result<Vec<Worker>, Error> {
        let mut workers: Vec<Worker> = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let job = Job::new(*partition, Arc::clone(a), Arc::clone(b));
            match self.spawner.spawn(job).await {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    warn!(id = partition.id, error = %err, "failed to start worker, cleaning up");
                    let exits = workers.into_iter().map(|w| w.into_parts().2).collect();
                    kill_all(exits).await;
                    return Err(err);
                }
            }
        }
        Ok(workers)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Multiplies `a x b` with `workers` tasks on the current runtime.
pub async fn multiply_parallel(
    a: impl Into<Arc<Matrix>>,
    b: impl Into<Arc<Matrix>>,
    workers: usize,
) -> Result<Matrix, Error> {
    let product = Coordinator::new(workers).multiply(a, b).await?;
    Ok(product.result)
}

/// Reads every channel to completion, in whatever order blocks arrive.
async fn drain(
    receivers: Vec<(Partition, Receiver)>,
    cols: usize,
    result: &mut Matrix,
) -> Result<(), Error> {
    let mut pending: FuturesUnordered<_> = receivers
        .into_iter()
        .map(|(partition, receiver)| async move {
            let block = receiver.recv_block(partition.block_len(cols)).await;
            (partition, block)
        })
        .collect();

    while let Some((partition, block)) = pending.next().await {
        let block = block.map_err(|source| Error::Transfer {
            id: partition.id,
            source,
        })?;
        result.copy_rows_from(partition.start_row, &block);
        debug!(id = partition.id, rows = partition.len(), "block assembled");
    }
    Ok(())
}

/// Waits for every worker; the first failure in partition order wins.
async fn reap(exits: Vec<WorkerExit>) -> Result<(), Error> {
    join_all(exits.into_iter().map(WorkerExit::wait))
        .await
        .into_iter()
        .collect()
}

async fn kill_all(exits: Vec<WorkerExit>) {
    join_all(exits.into_iter().map(WorkerExit::kill)).await;
}

/// Reaps everything after channel `id` failed and picks the error to report.
///
/// A worker that crashed also truncates its channel; its own failure is the
/// more useful error, so it takes precedence over the transfer error.
async fn abort_after_transfer(exits: Vec<WorkerExit>, id: usize, source: TransferError) -> Error {
    let mut failed = None;
    let mut rest = Vec::with_capacity(exits.len());
    for exit in exits {
        if exit.id() == id {
            failed = Some(exit);
        } else {
            rest.push(exit);
        }
    }

    let outcome = async {
        match failed {
            Some(exit) => exit.wait_or_kill(FAILED_WORKER_GRACE).await,
            None => Ok(()),
        }
    };
    let (outcome, ()) = tokio::join!(outcome, kill_all(rest));

    match outcome {
        Err(err @ Error::WorkerFailed { .. }) => err,
        _ => Error::Transfer { id, source },
    }
}
