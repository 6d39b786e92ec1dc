use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use matmul_bench::config::{Cli, Command, RunArgs};
use matmul_bench::runner;
use matmul_bench::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout is the block channel in worker mode, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Generate(args) => runner::generate(&args).await.map(|_| ()).map_err(Into::into),
        Command::Worker => matrix_mul::worker::serve_stdio().await.map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = runner::run(&args).await?;
    let report = &outcome.report;

    println!("Sequential: {:.3} s", report.time_seq_ms as f64 / 1000.0);
    println!(
        "Parallel({}): {:.3} s",
        report.num_processes,
        report.time_par_ms as f64 / 1000.0
    );
    match report.speedup {
        Some(speedup) => println!("Speedup: {:.3}x", speedup),
        None => println!("Speedup: n/a"),
    }
    println!(
        "CPU user(ms): {}  sys(ms): {}  peak RAM: {} KB",
        report.cpu_user_ms, report.cpu_sys_ms, report.max_rss_kb
    );
    println!("{}", report.to_json()?);

    if let Some(url) = &args.telemetry_url {
        telemetry::upload_report(url, report).await;
    }

    Ok(())
}

