//! Throughput harness: an immutable [`BenchConfig`], the input data source and
//! the multithreaded [`Driver`] that runs a randomized enqueue/dequeue mix
//! against any [`MpmcQueue`](crate::MpmcQueue).
pub mod config;
pub mod data;
pub mod driver;

pub use config::{BenchConfig, BenchConfigBuilder, QueueKind};
pub use driver::{Driver, RunReport, Summary};
