//! Ways of launching a worker bound to its channel.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

use crate::channel::{self, PIPE_CAPACITY, Receiver};
use crate::job::Job;
use crate::worker::{WORKER_ARG, Worker, compute_block_until};
use crate::Error;

/// Launches one worker for one job.
///
/// The returned [`Worker`] owns the read side of the worker's channel and a
/// handle that the coordinator reaps. Implementations must not leave a
/// half-started worker behind when they return an error.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, job: Job) -> Result<Worker, Error>;
}

/// Runs each worker as a task on the current tokio runtime.
///
/// Inputs are shared through the job's `Arc<Matrix>` handles and the block
/// travels through an in-memory pipe. The computation itself runs on the
/// blocking thread pool and stops at the next row once the worker is killed.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    capacity: usize,
}

impl TaskSpawner {
    /// Uses pipes that buffer at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for TaskSpawner {
    fn default() -> Self {
        Self::with_capacity(PIPE_CAPACITY)
    }
}

#[async_trait]
impl Spawner for TaskSpawner {
    async fn spawn(&self, job: Job) -> Result<Worker, Error> {
        let partition = job.partition;
        let id = partition.id;
        let (mut tx, rx) = channel::pipe(self.capacity);

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let (done_tx, done_rx) = oneshot::channel();
        let computation = tokio::task::spawn_blocking(move || {
            if let Some(block) = compute_block_until(&job.a, &job.b, &job.partition, &flag) {
                let _ = done_tx.send(block);
            }
        });

        let handle = tokio::spawn(async move {
            let block = done_rx.await.map_err(|_| Error::WorkerFailed {
                id,
                reason: "computation stopped before finishing".to_string(),
            })?;
            channel::send_block(&mut tx, &block).await?;
            Ok::<(), Error>(())
        });

        Ok(Worker::task(partition, rx, handle).with_computation(cancel, computation))
    }
}

/// Runs each worker as a child process.
///
/// The child receives its job as a frame on stdin and must write the block
/// to stdout; see [`crate::worker::serve_stdio`]. Its stderr is inherited.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-runs the current executable with the `worker` argument.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg(WORKER_ARG))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn spawn(&self, job: Job) -> Result<Worker, Error> {
        let partition = job.partition;
        let id = partition.id;
        let payload = job.encode()?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn { id, source })?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            // kill_on_drop reaps the child
            return Err(Error::Spawn {
                id,
                source: std::io::Error::other("worker stdio was not captured"),
            });
        };
        debug!(id, pid = ?child.id(), "spawned worker process");

        let feeder = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        Ok(Worker::process(partition, Receiver::new(stdout), child, feeder))
    }
}
