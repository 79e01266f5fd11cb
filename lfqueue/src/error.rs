use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thread count must be positive")]
    ZeroThreads,
    #[error("run count must be positive")]
    ZeroRuns,
    #[error("enqueue ratio must be at least 1 (one enqueue in every N operations)")]
    ZeroEnqueueRatio,
    #[error("unknown queue kind `{0}`, expected `ms` or `seg`")]
    UnknownQueue(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} holds {found} values, {expected} required", .path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("input data set is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(
        "run {run}: {enqueued} enqueued != {dequeued} dequeued + {drained} left at quiescence"
    )]
    Conservation {
        run: u32,
        enqueued: u64,
        dequeued: u64,
        drained: u64,
    },
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),
}
