use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;

use crate::error::ConfigError;

pub const DEFAULT_OPS: u64 = 1_000_000;
pub const DEFAULT_RUNS: u32 = 2;
pub const DEFAULT_ENQUEUE_ONE_IN: u32 = 8;
pub const DEFAULT_SEED: u64 = 42;

// Values are taken cyclically, so the data set never needs to be larger than this.
const DATA_LEN_MAX: u64 = 1 << 22;

/// Which queue implementation the driver exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueKind {
    /// The tagged-pointer Michael & Scott queue.
    #[default]
    Ms,
    /// `crossbeam_queue::SegQueue`, for comparison.
    Seg,
}

impl FromStr for QueueKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ms" => Ok(QueueKind::Ms),
            "seg" => Ok(QueueKind::Seg),
            _ => Err(ConfigError::UnknownQueue(s.to_string())),
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Ms => f.write_str("ms"),
            QueueKind::Seg => f.write_str("seg"),
        }
    }
}

/// Immutable benchmark configuration, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    ops: u64,
    threads: usize,
    runs: u32,
    enqueue_one_in: u32,
    seed: u64,
    queue: QueueKind,
    backoff: bool,
    input: Option<PathBuf>,
}

impl BenchConfig {
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    pub fn ops(&self) -> u64 {
        self.ops
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Each operation is an enqueue with probability `1 / enqueue_one_in`,
    /// otherwise a dequeue.
    pub fn enqueue_one_in(&self) -> u32 {
        self.enqueue_one_in
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn backoff(&self) -> bool {
        self.backoff
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn data_len(&self) -> usize {
        self.ops.clamp(1, DATA_LEN_MAX) as usize
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfigBuilder::default().unchecked()
    }
}

#[derive(Debug, Clone)]
pub struct BenchConfigBuilder {
    ops: u64,
    threads: usize,
    runs: u32,
    enqueue_one_in: u32,
    seed: u64,
    queue: QueueKind,
    backoff: bool,
    input: Option<PathBuf>,
}

impl Default for BenchConfigBuilder {
    fn default() -> Self {
        Self {
            ops: DEFAULT_OPS,
            threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            runs: DEFAULT_RUNS,
            enqueue_one_in: DEFAULT_ENQUEUE_ONE_IN,
            seed: DEFAULT_SEED,
            queue: QueueKind::default(),
            backoff: false,
            input: None,
        }
    }
}

impl BenchConfigBuilder {
    pub fn ops(mut self, ops: u64) -> Self {
        self.ops = ops;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    pub fn enqueue_one_in(mut self, n: u32) -> Self {
        self.enqueue_one_in = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn queue(mut self, queue: QueueKind) -> Self {
        self.queue = queue;
        self
    }

    pub fn backoff(mut self, enabled: bool) -> Self {
        self.backoff = enabled;
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn build(self) -> Result<BenchConfig, ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }
        if self.enqueue_one_in == 0 {
            return Err(ConfigError::ZeroEnqueueRatio);
        }
        Ok(self.unchecked())
    }

    // Defaults always pass validation.
    fn unchecked(self) -> BenchConfig {
        BenchConfig {
            ops: self.ops,
            threads: self.threads,
            runs: self.runs,
            enqueue_one_in: self.enqueue_one_in,
            seed: self.seed,
            queue: self.queue,
            backoff: self.backoff,
            input: self.input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BenchConfig::default();
        assert_eq!(config.ops(), 1_000_000);
        assert_eq!(config.runs(), 2);
        assert_eq!(config.enqueue_one_in(), 8);
        assert_eq!(config.seed(), 42);
        assert_eq!(config.queue(), QueueKind::Ms);
        assert!(config.threads() >= 1);
        assert!(config.input().is_none());
    }

    #[test]
    fn rejects_degenerate_values() {
        assert_eq!(
            BenchConfig::builder().threads(0).build(),
            Err(ConfigError::ZeroThreads)
        );
        assert_eq!(
            BenchConfig::builder().runs(0).build(),
            Err(ConfigError::ZeroRuns)
        );
        assert_eq!(
            BenchConfig::builder().enqueue_one_in(0).build(),
            Err(ConfigError::ZeroEnqueueRatio)
        );
    }

    #[test]
    fn parses_queue_kind() {
        assert_eq!("ms".parse::<QueueKind>(), Ok(QueueKind::Ms));
        assert_eq!("SEG".parse::<QueueKind>(), Ok(QueueKind::Seg));
        assert_eq!(
            "boost".parse::<QueueKind>(),
            Err(ConfigError::UnknownQueue("boost".to_string()))
        );
        assert_eq!(QueueKind::Seg.to_string(), "seg");
    }

    #[test]
    fn data_len_is_capped_and_never_zero() {
        let small = BenchConfig::builder().ops(10).build().unwrap();
        assert_eq!(small.data_len(), 10);

        let none = BenchConfig::builder().ops(0).build().unwrap();
        assert_eq!(none.data_len(), 1);

        let huge = BenchConfig::builder().ops(u64::MAX).build().unwrap();
        assert_eq!(huge.data_len(), 1 << 22);
    }
}
