//! lfqueue-bench — throughput harness for the tagged-pointer MPMC queue.
//!
//! ```bash
//! lfqueue-bench generate --output random_values_insert.bin --count 1000000
//! lfqueue-bench run --ops 1000000 --threads 8 --runs 3 --input random_values_insert.bin
//! lfqueue-bench run --queue seg --threads 8
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lfqueue::bench::config::{DEFAULT_ENQUEUE_ONE_IN, DEFAULT_OPS, DEFAULT_RUNS, DEFAULT_SEED};
use lfqueue::bench::{data, BenchConfig, Driver, QueueKind};
use lfqueue::error::BenchError;

#[derive(Parser, Debug)]
#[command(name = "lfqueue-bench")]
#[command(about = "Multithreaded throughput benchmark for the lock-free queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the randomized enqueue/dequeue mix.
    Run(RunArgs),
    /// Write a file of random u32 input values.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Total number of operations per run.
    #[arg(long, default_value_t = DEFAULT_OPS)]
    ops: u64,

    /// Worker threads (defaults to available parallelism).
    #[arg(long)]
    threads: Option<usize>,

    /// Number of runs to average over.
    #[arg(long, default_value_t = DEFAULT_RUNS)]
    runs: u32,

    /// One operation in N is an enqueue; the rest are dequeues.
    #[arg(long, default_value_t = DEFAULT_ENQUEUE_ONE_IN)]
    enqueue_one_in: u32,

    /// Seed for the per-thread operation mix and for generated input.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Queue under test: `ms` (tagged MS queue) or `seg` (crossbeam SegQueue).
    #[arg(long, default_value = "ms")]
    queue: QueueKind,

    /// Bounded exponential backoff on CAS failure (ms queue only).
    #[arg(long)]
    backoff: bool,

    /// Binary file of little-endian u32 values; generated from the seed if absent.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long, default_value = "random_values_insert.bin")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_OPS as usize)]
    count: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

fn run(args: RunArgs) -> Result<(), BenchError> {
    let mut builder = BenchConfig::builder()
        .ops(args.ops)
        .runs(args.runs)
        .enqueue_one_in(args.enqueue_one_in)
        .seed(args.seed)
        .queue(args.queue)
        .backoff(args.backoff);
    if let Some(threads) = args.threads {
        builder = builder.threads(threads);
    }
    if let Some(input) = args.input {
        builder = builder.input(input);
    }

    let driver = Driver::from_config(builder.build()?)?;
    let summary = driver.run()?;
    println!("{summary}");
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<(), BenchError> {
    let values = data::generate(args.count, args.seed);
    data::write_values(&args.output, &values)?;
    info!(path = %args.output.display(), count = args.count, "input file written");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Generate(args) => generate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lfqueue-bench failed");
            ExitCode::FAILURE
        }
    }
}
