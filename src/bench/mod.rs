//! Multithreaded prime-counting benchmark.
//!
//! A fixed pool of worker threads claims candidates from a shared counter
//! and tests them by trial division. Worker 0 is the leader: it alone keeps
//! the elapsed time and ends the run once the duration budget is spent.

pub mod clock;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::BenchMode;
use clock::{CpuClock, ProcessCpuClock};
use worker::BenchRun;

pub use worker::{is_prime, FIRST_CANDIDATE, SEED_PRIMES};

/// Parameters of a benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BenchParams {
    pub threads: usize,
    pub duration_minutes: u64,
    pub mode: BenchMode,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            threads: 1,
            duration_minutes: 1,
            mode: BenchMode::Fast,
        }
    }
}

/// What `start` managed to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchStart {
    pub spawned: usize,
    pub spawn_errors: usize,
}

/// Point-in-time view of the engine, safe to take at any moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BenchmarkStatus {
    pub params: BenchParams,
    pub started: bool,
    pub running: bool,
    /// Prime counter including the seeded prime 2; 0 before any run
    pub primes: u64,
    pub elapsed_secs: u64,
    pub spawn_errors: usize,
}

impl BenchmarkStatus {
    /// Primes discovered by the workers themselves
    pub fn primes_found(&self) -> u64 {
        self.primes.saturating_sub(if self.started { SEED_PRIMES } else { 0 })
    }

    /// Seconds left in the budget while running
    pub fn remaining_secs(&self) -> u64 {
        self.params
            .duration_minutes
            .saturating_mul(60)
            .saturating_sub(self.elapsed_secs)
    }
}

/// Owns benchmark state; worker threads share it through `Arc`s
pub struct BenchmarkEngine {
    clock: Arc<dyn CpuClock>,
    params: Mutex<BenchParams>,
    current: Mutex<Option<Arc<BenchRun>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for BenchmarkEngine {
    fn default() -> Self {
        Self::new(BenchParams::default())
    }
}

impl BenchmarkEngine {
    pub fn new(params: BenchParams) -> Self {
        Self::with_clock(params, Arc::new(ProcessCpuClock))
    }

    pub fn with_clock(params: BenchParams, clock: Arc<dyn CpuClock>) -> Self {
        Self {
            clock,
            params: Mutex::new(params),
            current: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Parameters the next run will use
    pub fn params(&self) -> BenchParams {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the parameters shown before (and used by) the next run
    pub fn configure(&self, params: BenchParams) {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner) = params;
    }

    /// Start a run with the configured parameters
    pub fn start_configured(&self) -> Result<BenchStart> {
        self.start(self.params())
    }

    /// Reset counters and spawn `params.threads` workers.
    ///
    /// A worker that fails to spawn lowers the effective thread count; only a
    /// failure to spawn the leader aborts the run.
    pub fn start(&self, params: BenchParams) -> Result<BenchStart> {
        if params.threads == 0 {
            return Err(AppError::benchmark("thread count must be at least 1"));
        }

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|run| run.is_running()) {
            return Err(AppError::benchmark("a benchmark is already running"));
        }

        tracing::info!(
            threads = params.threads,
            duration_minutes = params.duration_minutes,
            mode = params.mode.label(),
            "Starting benchmark"
        );
        self.configure(params);
        let run = Arc::new(BenchRun::new(params, Arc::clone(&self.clock)));
        *current = Some(Arc::clone(&run));
        drop(current);

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.clear();

        for index in 0..params.threads {
            let worker_run = Arc::clone(&run);
            let leader = index == 0;
            let spawned = std::thread::Builder::new()
                .name(format!("hx-bench-{index}"))
                .spawn(move || worker::run(worker_run, leader));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) if leader => {
                    run.stop();
                    tracing::error!(error = %err, "Failed to spawn benchmark leader");
                    return Err(AppError::benchmark(format!(
                        "failed to spawn leader thread: {err}"
                    )));
                }
                Err(err) => {
                    run.spawn_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(worker = index, error = %err, "Failed to spawn benchmark worker");
                }
            }
        }

        Ok(BenchStart {
            spawned: handles.len(),
            spawn_errors: run.spawn_errors.load(Ordering::Relaxed),
        })
    }

    pub fn status(&self) -> BenchmarkStatus {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match current {
            Some(run) => BenchmarkStatus {
                params: run.params,
                started: true,
                running: run.is_running(),
                primes: run.primes(),
                elapsed_secs: run.elapsed_secs(),
                spawn_errors: run.spawn_errors.load(Ordering::Relaxed),
            },
            None => BenchmarkStatus {
                params: self.params(),
                started: false,
                running: false,
                primes: 0,
                elapsed_secs: 0,
                spawn_errors: 0,
            },
        }
    }

    /// Highest candidate claimed so far in the current run
    pub fn last_candidate(&self) -> Option<u64> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| run.last_candidate())
    }

    /// Block until every worker of the current run has exited
    pub fn wait(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Benchmark worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_before_start_reports_params_only() {
        let engine = BenchmarkEngine::new(BenchParams {
            threads: 3,
            duration_minutes: 5,
            mode: BenchMode::Slow,
        });
        let status = engine.status();
        assert!(!status.started);
        assert!(!status.running);
        assert_eq!(status.primes, 0);
        assert_eq!(status.primes_found(), 0);
        assert_eq!(status.params.threads, 3);
        assert_eq!(engine.last_candidate(), None);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let engine = BenchmarkEngine::default();
        let params = BenchParams {
            threads: 0,
            ..BenchParams::default()
        };
        assert!(engine.start(params).is_err());
        assert!(!engine.status().started);
    }

    #[test]
    fn remaining_time_saturates() {
        let status = BenchmarkStatus {
            params: BenchParams {
                threads: 1,
                duration_minutes: 1,
                mode: BenchMode::Fast,
            },
            started: true,
            running: true,
            primes: 10,
            elapsed_secs: 75,
            spawn_errors: 0,
        };
        assert_eq!(status.remaining_secs(), 0);
        assert_eq!(status.primes_found(), 9);

        let endless = BenchmarkStatus {
            params: BenchParams {
                duration_minutes: u64::MAX / 2,
                ..status.params
            },
            ..status
        };
        assert_eq!(endless.remaining_secs(), u64::MAX - 75);
    }
}
