use std::fmt;
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::config::{BenchConfig, QueueKind};
use super::data;
use crate::baseline::SegQueueBaseline;
use crate::error::{BenchError, DataError};
use crate::mpmc::MsQueue;
use crate::MpmcQueue;

/// Slice of one run handed to a single worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorkerPlan {
    ops: u64,
    // Index into the data set of this worker's first value.
    offset: u64,
    seed: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerTally {
    enqueued: u64,
    dequeued: u64,
}

/// Outcome of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub run: u32,
    pub elapsed: Duration,
    pub enqueued: u64,
    pub dequeued: u64,
    /// Elements still queued once every worker had joined.
    pub drained: u64,
}

impl RunReport {
    pub fn successful_ops(&self) -> u64 {
        self.enqueued + self.dequeued
    }

    /// Successful operations per second, in thousands.
    pub fn throughput_kops(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.successful_ops() as f64 / secs / 1000.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub queue: QueueKind,
    pub threads: usize,
    pub ops: u64,
    pub runs: Vec<RunReport>,
}

impl Summary {
    fn mean(&self, f: impl Fn(&RunReport) -> f64) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        self.runs.iter().map(f).sum::<f64>() / self.runs.len() as f64
    }

    pub fn avg_millis(&self) -> f64 {
        self.mean(|r| r.elapsed.as_secs_f64() * 1000.0)
    }

    pub fn avg_enqueued(&self) -> f64 {
        self.mean(|r| r.enqueued as f64)
    }

    pub fn avg_dequeued(&self) -> f64 {
        self.mean(|r| r.dequeued as f64)
    }

    pub fn avg_successful_ops(&self) -> f64 {
        self.mean(|r| r.successful_ops() as f64)
    }

    /// Average successful ops over average wall time, in K ops/s.
    pub fn avg_throughput_kops(&self) -> f64 {
        let ms = self.avg_millis();
        if ms > 0.0 {
            self.avg_successful_ops() / (ms / 1000.0) / 1000.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queue: {}", self.queue)?;
        writeln!(f, "Total ops: {}", self.ops)?;
        writeln!(f, "Threads: {}", self.threads)?;
        writeln!(f, "Runs: {}", self.runs.len())?;
        writeln!(f, "Average time per run (ms): {:.3}", self.avg_millis())?;
        writeln!(f, "Average successful ENQ ops per run: {:.1}", self.avg_enqueued())?;
        writeln!(f, "Average successful DEQ ops per run: {:.1}", self.avg_dequeued())?;
        writeln!(
            f,
            "Average total successful ops per run: {:.1}",
            self.avg_successful_ops()
        )?;
        write!(
            f,
            "Average throughput (K ops/sec): {:.3}",
            self.avg_throughput_kops()
        )
    }
}

/// Runs the randomized enqueue/dequeue mix against a fresh queue per run.
#[derive(Debug)]
pub struct Driver {
    config: BenchConfig,
    values: Vec<u32>,
}

impl Driver {
    pub fn new(config: BenchConfig, values: Vec<u32>) -> Result<Self, BenchError> {
        if values.is_empty() {
            return Err(DataError::Empty.into());
        }
        Ok(Self { config, values })
    }

    /// Loads the input file named by the config, or generates values from the
    /// config's seed when there is none.
    pub fn from_config(config: BenchConfig) -> Result<Self, BenchError> {
        let values = match config.input() {
            Some(path) => data::load_values(path, config.data_len())?,
            None => data::generate(config.data_len(), config.seed()),
        };
        Self::new(config, values)
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn run(&self) -> Result<Summary, BenchError> {
        info!(
            queue = %self.config.queue(),
            ops = self.config.ops(),
            threads = self.config.threads(),
            runs = self.config.runs(),
            "starting benchmark"
        );

        let runs = (1..=self.config.runs())
            .map(|run| self.run_once(run))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Summary {
            queue: self.config.queue(),
            threads: self.config.threads(),
            ops: self.config.ops(),
            runs,
        })
    }

    pub fn run_once(&self, run: u32) -> Result<RunReport, BenchError> {
        let report = match self.config.queue() {
            QueueKind::Ms => {
                let queue = MsQueue::builder().backoff(self.config.backoff()).build();
                self.run_on(run, queue)?
            }
            QueueKind::Seg => self.run_on(run, SegQueueBaseline::new())?,
        };

        info!(
            run,
            elapsed_ms = report.elapsed.as_millis() as u64,
            enqueued = report.enqueued,
            dequeued = report.dequeued,
            drained = report.drained,
            "run completed"
        );
        Ok(report)
    }

    fn run_on<Q: MpmcQueue<u32>>(&self, run: u32, mut queue: Q) -> Result<RunReport, BenchError> {
        let plans = self.plans(run);
        let threads = plans.len();
        let barrier = Barrier::new(threads + 1);
        debug!(run, threads, "spawning workers");

        let (elapsed, tallies) = thread::scope(|s| {
            let handles: Vec<_> = plans
                .iter()
                .map(|&plan| {
                    let queue = &queue;
                    let barrier = &barrier;
                    let values = self.values.as_slice();
                    let one_in = self.config.enqueue_one_in();
                    s.spawn(move || worker(queue, values, plan, one_in, barrier))
                })
                .collect();

            barrier.wait();
            let start = Instant::now();
            let tallies: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            (start.elapsed(), tallies)
        });

        let mut total = WorkerTally::default();
        for (index, tally) in tallies.into_iter().enumerate() {
            let tally = tally.map_err(|_| BenchError::WorkerPanicked(index))?;
            total.enqueued += tally.enqueued;
            total.dequeued += tally.dequeued;
        }

        let drained = queue.drain().len() as u64;
        if total.enqueued != total.dequeued + drained {
            return Err(BenchError::Conservation {
                run,
                enqueued: total.enqueued,
                dequeued: total.dequeued,
                drained,
            });
        }

        Ok(RunReport {
            run,
            elapsed,
            enqueued: total.enqueued,
            dequeued: total.dequeued,
            drained,
        })
    }

    // Splits the op count evenly; the first `ops % threads` workers take one
    // extra op. Each worker starts reading values where the previous one's
    // share of operations ends.
    fn plans(&self, run: u32) -> Vec<WorkerPlan> {
        let threads = self.config.threads() as u64;
        let per_thread = self.config.ops() / threads;
        let remainder = self.config.ops() % threads;
        let run_seed = self
            .config
            .seed()
            .wrapping_add(u64::from(run).wrapping_mul(threads));

        let mut offset = 0;
        (0..threads)
            .map(|i| {
                let ops = per_thread + u64::from(i < remainder);
                let plan = WorkerPlan {
                    ops,
                    offset,
                    seed: run_seed.wrapping_add(i),
                };
                offset += ops;
                plan
            })
            .collect()
    }
}

fn worker<Q: MpmcQueue<u32>>(
    queue: &Q,
    values: &[u32],
    plan: WorkerPlan,
    enqueue_one_in: u32,
    barrier: &Barrier,
) -> WorkerTally {
    let mut rng = StdRng::seed_from_u64(plan.seed);
    let len = values.len() as u64;
    let mut tally = WorkerTally::default();

    barrier.wait();
    for i in 0..plan.ops {
        if rng.gen_ratio(1, enqueue_one_in) {
            let value = values[((plan.offset + i) % len) as usize];
            if queue.push(value).is_ok() {
                tally.enqueued += 1;
            }
        } else if queue.pop().is_some() {
            tally.dequeued += 1;
        }
    }
    tally
}
