use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::clock::CpuClock;
use super::BenchParams;
use crate::types::BenchMode;

/// Candidate counter value before the first claim
pub const FIRST_CANDIDATE: u64 = 2;
/// The prime 2 is counted up front; workers start testing at 3
pub const SEED_PRIMES: u64 = 1;

/// Shared state of one benchmark run.
///
/// The two counters have their own locks: claiming a candidate is hot and
/// must be exclusive, while recording a prime is rare and cheap. `elapsed`
/// and `running` have a single writer, the leader.
pub(crate) struct BenchRun {
    pub(crate) params: BenchParams,
    candidate: Mutex<u64>,
    primes: Mutex<u64>,
    elapsed_secs: AtomicU64,
    running: AtomicBool,
    pub(crate) spawn_errors: AtomicUsize,
    clock: Arc<dyn CpuClock>,
    started_at: Duration,
}

impl BenchRun {
    pub(crate) fn new(params: BenchParams, clock: Arc<dyn CpuClock>) -> Self {
        let started_at = clock.now();
        Self {
            params,
            candidate: Mutex::new(FIRST_CANDIDATE),
            primes: Mutex::new(SEED_PRIMES),
            elapsed_secs: AtomicU64::new(0),
            running: AtomicBool::new(true),
            spawn_errors: AtomicUsize::new(0),
            clock,
            started_at,
        }
    }

    /// Take the next untested candidate
    pub(crate) fn claim_candidate(&self) -> u64 {
        let mut num = self.candidate.lock().unwrap_or_else(PoisonError::into_inner);
        *num += 1;
        *num
    }

    fn record_prime(&self) {
        let mut primes = self.primes.lock().unwrap_or_else(PoisonError::into_inner);
        *primes += 1;
    }

    pub(crate) fn primes(&self) -> u64 {
        *self.primes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn last_candidate(&self) -> u64 {
        *self.candidate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::Relaxed)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn budget_secs(&self) -> u64 {
        self.params.duration_minutes.saturating_mul(60)
    }

    /// Leader only: CPU time since start, normalised by worker count
    fn sample_elapsed(&self) -> u64 {
        let busy = self.clock.now().saturating_sub(self.started_at);
        let threads = self.params.threads.max(1) as u32;
        let elapsed = (busy / threads).as_secs();
        self.elapsed_secs.store(elapsed, Ordering::Relaxed);
        elapsed
    }
}

/// Body of every worker thread
pub(crate) fn run(bench: Arc<BenchRun>, leader: bool) {
    let mode = bench.params.mode;

    while bench.is_running() {
        let num = bench.claim_candidate();
        if is_prime(num, mode) {
            bench.record_prime();
        }

        if leader && bench.sample_elapsed() >= bench.budget_secs() {
            bench.stop();
        }
    }

    if leader {
        tracing::info!(
            primes = bench.primes(),
            elapsed_secs = bench.elapsed_secs(),
            "Benchmark finished"
        );
    }
}

/// Trial division; slow mode deliberately tests every divisor below `num`
pub fn is_prime(num: u64, mode: BenchMode) -> bool {
    if num < 2 {
        return false;
    }
    match mode {
        BenchMode::Fast => (2..)
            .take_while(|i: &u64| i.saturating_mul(*i) <= num)
            .all(|i| num % i != 0),
        BenchMode::Slow => (2..num).all(|i| num % i != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::ManualClock;
    use std::collections::HashSet;

    const PRIMES_BELOW_100: [u64; 25] = [
        2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83,
        89, 97,
    ];

    fn params(threads: usize, mode: BenchMode) -> BenchParams {
        BenchParams {
            threads,
            duration_minutes: 1,
            mode,
        }
    }

    #[test]
    fn both_modes_agree_with_known_primes() {
        for mode in [BenchMode::Fast, BenchMode::Slow] {
            let found: Vec<u64> = (0..100).filter(|n| is_prime(*n, mode)).collect();
            assert_eq!(found, PRIMES_BELOW_100, "{mode:?}");
        }
    }

    #[test]
    fn fast_mode_rejects_squares_of_primes() {
        for p in [2u64, 3, 5, 7, 11, 101] {
            assert!(!is_prime(p * p, BenchMode::Fast), "{}", p * p);
        }
    }

    #[test]
    fn fresh_run_holds_only_the_seed() {
        let bench = BenchRun::new(params(4, BenchMode::Fast), Arc::new(ManualClock::new()));
        assert!(bench.is_running());
        assert_eq!(bench.primes(), SEED_PRIMES);
        assert_eq!(bench.last_candidate(), FIRST_CANDIDATE);
        assert_eq!(bench.elapsed_secs(), 0);
    }

    #[test]
    fn concurrent_claims_are_unique_and_contiguous() {
        const THREADS: usize = 8;
        const CLAIMS: usize = 5_000;

        let bench = Arc::new(BenchRun::new(
            params(THREADS, BenchMode::Fast),
            Arc::new(ManualClock::new()),
        ));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let bench = Arc::clone(&bench);
                std::thread::spawn(move || {
                    (0..CLAIMS).map(|_| bench.claim_candidate()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "candidate {value} claimed twice");
            }
        }

        let total = (THREADS * CLAIMS) as u64;
        assert_eq!(bench.last_candidate(), FIRST_CANDIDATE + total);
        let expected: HashSet<u64> = (FIRST_CANDIDATE + 1..=FIRST_CANDIDATE + total).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn leader_stops_once_budget_is_spent() {
        let clock = ManualClock::new();
        let bench = Arc::new(BenchRun::new(
            params(2, BenchMode::Fast),
            Arc::new(clock.clone()),
        ));

        // 2 workers x 60 s of CPU time = 60 s normalised
        clock.set(Duration::from_secs(120));
        run(Arc::clone(&bench), true);

        assert!(!bench.is_running());
        assert_eq!(bench.elapsed_secs(), 60);
        assert_eq!(bench.last_candidate(), FIRST_CANDIDATE + 1);
        // Candidate 3 is prime
        assert_eq!(bench.primes(), SEED_PRIMES + 1);
    }

    #[test]
    fn follower_never_writes_elapsed() {
        let clock = ManualClock::new();
        let bench = Arc::new(BenchRun::new(
            params(2, BenchMode::Slow),
            Arc::new(clock.clone()),
        ));
        clock.set(Duration::from_secs(1_000));

        let follower = {
            let bench = Arc::clone(&bench);
            std::thread::spawn(move || run(bench, false))
        };
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(bench.elapsed_secs(), 0);
        assert!(bench.is_running());

        bench.stop();
        follower.join().unwrap();
        assert!(bench.last_candidate() > FIRST_CANDIDATE);
    }
}
