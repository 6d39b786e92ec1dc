//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "matmul-bench",
    version,
    about = "Compare sequential and multi-process matrix multiplication"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Multiply two matrix files sequentially and in parallel
    Run(RunArgs),

    /// Write a random matrix file
    Generate(GenerateArgs),

    /// Compute one partition from a job on stdin (used by the process backend)
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// One child process per partition
    Process,
    /// One runtime task per partition
    Tasks,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Process => "process",
            Backend::Tasks => "tasks",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Left matrix file
    pub a: PathBuf,

    /// Right matrix file
    pub b: PathBuf,

    /// Number of workers
    pub workers: usize,

    #[arg(long, value_enum, default_value = "process")]
    pub backend: Backend,

    /// Where to write the sequential result
    #[arg(long, default_value = "C_seq.txt")]
    pub seq_out: PathBuf,

    /// Where to write the parallel result
    #[arg(long, default_value = "C_par.txt")]
    pub par_out: PathBuf,

    /// Endpoint that receives the JSON run report
    #[arg(long, env = "MATMUL_TELEMETRY_URL")]
    pub telemetry_url: Option<String>,

    /// Platform label stored in the report
    #[arg(long, default_value = std::env::consts::OS)]
    pub platform: String,

    /// Abort the parallel run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RunArgs {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    pub rows: usize,

    pub cols: usize,

    /// Output file
    pub out: PathBuf,

    /// Seed for reproducible matrices
    #[arg(long)]
    pub seed: Option<u64>,
}
