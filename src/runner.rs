//! The `run` and `generate` commands.

use std::sync::Arc;
use std::time::Instant;

use matrix_mul::{Coordinator, Error as MatMulError, Matrix, ProcessSpawner, TaskSpawner, check_dimensions, sequential};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::config::{Backend, GenerateArgs, RunArgs};
use crate::io::{read_matrix, write_matrix};
use crate::report::{RunReport, RunStats};
use crate::usage::ResourceUsage;
use crate::Error;

/// Result of [`run`]: both products and the report built from the timings.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub sequential: Matrix,
    pub parallel: Matrix,
    pub report: RunReport,
}

impl RunOutcome {
    /// Whether both products agree bit for bit.
    pub fn results_match(&self) -> bool {
        self.sequential.shape() == self.parallel.shape()
            && self
                .sequential
                .as_slice()
                .iter()
                .zip(self.parallel.as_slice())
                .all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

/// Multiplies the two input files sequentially and in parallel, writes both
/// products and reports the timings.
pub async fn run(args: &RunArgs) -> Result<RunOutcome, Error> {
    let a = read_matrix(&args.a).await?;
    let b = read_matrix(&args.b).await?;
    check_dimensions(&a, &b)?;
    if args.workers == 0 {
        return Err(MatMulError::InvalidWorkerCount(args.workers).into());
    }
    info!(
        a_rows = a.rows(),
        a_cols = a.cols(),
        b_cols = b.cols(),
        workers = args.workers,
        backend = args.backend.as_str(),
        "matrices loaded"
    );

    let coordinator = coordinator(args)?;

    let started = Instant::now();
    let seq = sequential::multiply(&a, &b)?;
    let seq_elapsed = started.elapsed();
    write_matrix(&args.seq_out, &seq).await?;

    let before = ResourceUsage::current().map_err(Error::Usage)?;
    let product = coordinator.multiply(Arc::new(a), Arc::new(b)).await?;
    let after = ResourceUsage::current().map_err(Error::Usage)?;
    write_matrix(&args.par_out, &product.result).await?;

    let stats = RunStats {
        rows: product.result.rows(),
        cols: product.result.cols(),
        workers: args.workers,
        backend: args.backend.as_str().to_string(),
        sequential: seq_elapsed,
        parallel: product.elapsed,
        usage: after.since(&before),
    };
    let outcome = RunOutcome {
        sequential: seq,
        parallel: product.result,
        report: RunReport::new(&stats, args.platform.clone()),
    };
    if !outcome.results_match() {
        warn!("parallel result differs from the sequential baseline");
    }
    Ok(outcome)
}

fn coordinator(args: &RunArgs) -> Result<Coordinator, Error> {
    let coordinator = match args.backend {
        Backend::Process => {
            let spawner = ProcessSpawner::current_exe().map_err(Error::WorkerProgram)?;
            Coordinator::new(args.workers).with_spawner(spawner)
        }
        Backend::Tasks => Coordinator::new(args.workers).with_spawner(TaskSpawner::default()),
    };
    Ok(match args.timeout() {
        Some(timeout) => coordinator.with_timeout(timeout),
        None => coordinator,
    })
}

/// Writes a random matrix with values in `[-1, 1)`.
pub async fn generate(args: &GenerateArgs) -> Result<Matrix, Error> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let matrix = Matrix::random(args.rows, args.cols, &mut rng);
    write_matrix(&args.out, &matrix).await?;
    info!(rows = args.rows, cols = args.cols, out = %args.out.display(), "matrix written");
    Ok(matrix)
}
