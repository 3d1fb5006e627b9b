use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of accumulated processor time for the benchmark leader.
///
/// The leader divides the sample by the number of workers, so the clock must
/// report time summed over all threads of the process.
pub trait CpuClock: Send + Sync {
    fn now(&self) -> Duration;
}

/// CPU time consumed by the whole process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCpuClock;

#[cfg(unix)]
impl CpuClock for ProcessCpuClock {
    fn now(&self) -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec for the duration of the call
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
        if rc != 0 {
            return Duration::ZERO;
        }
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }
}

#[cfg(not(unix))]
impl CpuClock for ProcessCpuClock {
    fn now(&self) -> Duration {
        // No portable per-process CPU clock; wall time since first use
        use std::sync::OnceLock;
        use std::time::Instant;
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        EPOCH.get_or_init(Instant::now).elapsed()
    }
}

/// Clock driven by hand, for deterministic tests
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: Duration) {
        self.nanos.store(value.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl CpuClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}
