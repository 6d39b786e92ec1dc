//! Worker units: the per-partition computation and the handles the
//! coordinator uses to drain and reap them.

use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::channel::{self, Receiver};
use crate::job::read_job;
use crate::{Error, Matrix, Partition};

/// Command-line argument that puts a host binary into worker mode.
pub const WORKER_ARG: &str = "worker";

/// Computes the rows of `a x b` covered by `partition`, row-major.
///
/// Each value is accumulated left to right over the inner dimension in `f32`,
/// the same order as [`crate::sequential::multiply`], so results are
/// bit-identical to the sequential baseline.
pub fn compute_block(a: &Matrix, b: &Matrix, partition: &Partition) -> Vec<f32> {
    let mut block = Vec::with_capacity(partition.block_len(b.cols()));
    for i in partition.rows() {
        push_row(a, b, i, &mut block);
    }
    block
}

/// Like [`compute_block`], but gives up with `None` once `cancel` is set.
///
/// The flag is checked before every row.
pub fn compute_block_until(
    a: &Matrix,
    b: &Matrix,
    partition: &Partition,
    cancel: &AtomicBool,
) -> Option<Vec<f32>> {
    let mut block = Vec::with_capacity(partition.block_len(b.cols()));
    for i in partition.rows() {
        if cancel.load(Ordering::Acquire) {
            return None;
        }
        push_row(a, b, i, &mut block);
    }
    Some(block)
}

fn push_row(a: &Matrix, b: &Matrix, i: usize, block: &mut Vec<f32>) {
    let cols = b.cols();
    let bv = b.as_slice();
    let row = a.row(i);
    for j in 0..cols {
        let mut sum = 0.0f32;
        for (k, &av) in row.iter().enumerate() {
            sum += av * bv[k * cols + j];
        }
        block.push(sum);
    }
}

/// Worker-process side: reads one job from `input`, computes it and writes
/// the block to `output`.
pub async fn serve<R, W>(mut input: R, mut output: W) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let frame = read_job(&mut input).await?;
    let local = Partition {
        id: frame.partition.id,
        start_row: 0,
        end_row: frame.partition.len(),
    };
    debug!(
        id = frame.partition.id,
        start_row = frame.partition.start_row,
        end_row = frame.partition.end_row,
        "computing block"
    );

    let block = compute_block(&frame.a_rows, &frame.b, &local);
    channel::send_block(&mut output, &block).await?;
    Ok(())
}

/// Runs [`serve`] over this process's stdin and stdout.
pub async fn serve_stdio() -> Result<(), Error> {
    serve(tokio::io::stdin(), tokio::io::stdout()).await
}

/// A running worker as seen by the coordinator.
#[derive(Debug)]
pub struct Worker {
    partition: Partition,
    receiver: Receiver,
    exit: WorkerExit,
}

impl Worker {
    /// A worker running as a task on the current runtime.
    pub fn task(
        partition: Partition,
        receiver: Receiver,
        handle: JoinHandle<Result<(), Error>>,
    ) -> Self {
        Self {
            partition,
            receiver,
            exit: WorkerExit {
                id: partition.id,
                kind: ExitKind::Task {
                    handle,
                    computation: None,
                },
            },
        }
    }

    /// Attaches blocking work that the task waits on.
    ///
    /// The work must stop soon after `cancel` is set; reaping the worker sets
    /// the flag and then waits for `handle`.
    pub fn with_computation(mut self, cancel: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        if let ExitKind::Task { computation, .. } = &mut self.exit.kind {
            *computation = Some(Computation { cancel, handle });
        }
        self
    }

    /// A worker running as a child process. `feeder` writes the job to its stdin.
    pub fn process(
        partition: Partition,
        receiver: Receiver,
        child: Child,
        feeder: JoinHandle<std::io::Result<()>>,
    ) -> Self {
        Self {
            partition,
            receiver,
            exit: WorkerExit {
                id: partition.id,
                kind: ExitKind::Process { child, feeder },
            },
        }
    }

    pub(crate) fn into_parts(self) -> (Partition, Receiver, WorkerExit) {
        (self.partition, self.receiver, self.exit)
    }
}

/// The part of a worker that must be reaped exactly once.
#[derive(Debug)]
pub(crate) struct WorkerExit {
    id: usize,
    kind: ExitKind,
}

#[derive(Debug)]
enum ExitKind {
    Task {
        handle: JoinHandle<Result<(), Error>>,
        computation: Option<Computation>,
    },
    Process {
        child: Child,
        feeder: JoinHandle<std::io::Result<()>>,
    },
}

/// Blocking work behind a task worker. `spawn_blocking` work cannot be
/// aborted, only asked to stop.
#[derive(Debug)]
struct Computation {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Computation {
    async fn stop(self, id: usize) -> Result<(), Error> {
        self.cancel.store(true, Ordering::Release);
        self.handle.await.map_err(|e| Error::WorkerFailed {
            id,
            reason: e.to_string(),
        })
    }
}

/// Stops the blocking work, if any, and merges its outcome into the task's.
async fn settle(
    id: usize,
    outcome: Result<(), Error>,
    computation: Option<Computation>,
) -> Result<(), Error> {
    let stopped = match computation {
        Some(computation) => computation.stop(id).await,
        None => Ok(()),
    };
    // a panic in the computation explains a task that gave up waiting for it
    match (outcome, stopped) {
        (Err(_), Err(panicked)) => Err(panicked),
        (outcome, _) => outcome,
    }
}

impl WorkerExit {
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker to finish and reports how it ended.
    pub(crate) async fn wait(self) -> Result<(), Error> {
        let id = self.id;
        match self.kind {
            ExitKind::Task {
                handle,
                computation,
            } => settle(id, task_result(id, handle.await), computation).await,
            ExitKind::Process { mut child, feeder } => {
                let status = child.wait().await?;
                match feeder.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(id, error = %e, "failed to send job to worker"),
                    Err(e) => warn!(id, error = %e, "job feeder task failed"),
                }
                check_status(id, status)
            }
        }
    }

    /// Like [`WorkerExit::wait`], but kills the worker if it has not
    /// finished within `grace`.
    pub(crate) async fn wait_or_kill(self, grace: Duration) -> Result<(), Error> {
        let id = self.id;
        match self.kind {
            ExitKind::Task {
                mut handle,
                computation,
            } => {
                let outcome = match tokio::time::timeout(grace, &mut handle).await {
                    Ok(joined) => task_result(id, joined),
                    Err(_) => {
                        handle.abort();
                        let _ = handle.await;
                        Err(Error::WorkerFailed {
                            id,
                            reason: "did not exit and was cancelled".to_string(),
                        })
                    }
                };
                settle(id, outcome, computation).await
            }
            ExitKind::Process { mut child, feeder } => {
                let status = match tokio::time::timeout(grace, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        child.start_kill()?;
                        child.wait().await?
                    }
                };
                feeder.abort();
                let _ = feeder.await;
                check_status(id, status)
            }
        }
    }

    /// Stops the worker and reaps it, ignoring how it ended.
    pub(crate) async fn kill(self) {
        let id = self.id;
        match self.kind {
            ExitKind::Task {
                handle,
                computation,
            } => {
                handle.abort();
                let _ = handle.await;
                if let Some(computation) = computation {
                    let _ = computation.stop(id).await;
                }
            }
            ExitKind::Process { mut child, feeder } => {
                if let Err(e) = child.kill().await {
                    warn!(id, error = %e, "failed to kill worker process");
                }
                feeder.abort();
                let _ = feeder.await;
            }
        }
        debug!(id, "worker reaped after kill");
    }
}

fn task_result(id: usize, joined: Result<Result<(), Error>, JoinError>) -> Result<(), Error> {
    let reason = match joined {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    Err(Error::WorkerFailed { id, reason })
}

fn check_status(id: usize, status: ExitStatus) -> Result<(), Error> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::WorkerFailed {
            id,
            reason: format!("process {}", status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::job::Job;
    use crate::sequential;

    #[test]
    fn test_compute_block_rows() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let b = Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap();
        let p = Partition {
            id: 1,
            start_row: 1,
            end_row: 3,
        };
        assert_eq!(compute_block(&a, &b, &p), vec![3.0, 8.0, 5.0, 12.0]);
    }

    #[test]
    fn test_compute_empty_partition() {
        let a = Matrix::identity(2);
        let p = Partition {
            id: 3,
            start_row: 2,
            end_row: 2,
        };
        assert!(compute_block(&a, &a, &p).is_empty());
    }

    #[test]
    fn test_compute_until_matches_and_cancels() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let p = Partition {
            id: 0,
            start_row: 0,
            end_row: 2,
        };
        let running = AtomicBool::new(false);
        assert_eq!(
            compute_block_until(&a, &a, &p, &running),
            Some(compute_block(&a, &a, &p))
        );

        let cancelled = AtomicBool::new(true);
        assert_eq!(compute_block_until(&a, &a, &p, &cancelled), None);
    }

    fn stalled_task() -> JoinHandle<Result<(), Error>> {
        tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok::<(), Error>(())
        })
    }

    #[tokio::test]
    async fn test_kill_waits_for_blocking_work() {
        let cancel = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (flag, done) = (Arc::clone(&cancel), Arc::clone(&finished));
        let computation = tokio::task::spawn_blocking(move || {
            while !flag.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            done.store(true, Ordering::Release);
        });

        let (_tx, rx) = channel::pipe(16);
        let partition = Partition {
            id: 4,
            start_row: 0,
            end_row: 1,
        };
        let worker = Worker::task(partition, rx, stalled_task()).with_computation(cancel, computation);
        let (_, _, exit) = worker.into_parts();

        exit.kill().await;
        assert!(finished.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_panicking_computation_is_reported() {
        let computation = tokio::task::spawn_blocking(|| panic!("row exploded"));
        let handle = tokio::spawn(async {
            Err::<(), Error>(Error::WorkerFailed {
                id: 1,
                reason: "computation stopped before finishing".to_string(),
            })
        });

        let (_tx, rx) = channel::pipe(16);
        let partition = Partition {
            id: 1,
            start_row: 0,
            end_row: 1,
        };
        let worker = Worker::task(partition, rx, handle)
            .with_computation(Arc::new(AtomicBool::new(false)), computation);
        let (_, _, exit) = worker.into_parts();

        match exit.wait().await {
            Err(Error::WorkerFailed { id, reason }) => {
                assert_eq!(id, 1);
                assert!(reason.contains("panicked"), "{reason}");
            }
            other => panic!("expected worker failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_serve_matches_sequential() {
        let a = Arc::new(Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap());
        let b = Arc::new(Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap());
        let partition = Partition {
            id: 0,
            start_row: 1,
            end_row: 2,
        };
        let input = Job::new(partition, Arc::clone(&a), Arc::clone(&b)).encode().unwrap();

        let mut output = Vec::new();
        serve(input.as_slice(), &mut output).await.unwrap();

        let expected = sequential::multiply(&a, &b).unwrap();
        assert_eq!(channel::decode_block(&output), expected.row(1));
    }

    #[tokio::test]
    async fn test_serve_rejects_garbage() {
        let mut output = Vec::new();
        let err = serve(&b"not a job"[..], &mut output).await.unwrap_err();
        assert!(matches!(err, Error::Job(_)));
        assert!(output.is_empty());
    }
}
