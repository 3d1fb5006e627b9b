//! Sequential read throughput of each cache level.
//!
//! Each level is measured over a buffer of half its size, so the working set
//! stays resident in that level and the ones below it.

use std::hint::black_box;
use std::time::{Duration, Instant};

use super::{Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

const SOURCE: &str = "cache bandwidth";

pub struct CacheBandwidthProbe {
    budget: Duration,
}

impl Default for CacheBandwidthProbe {
    fn default() -> Self {
        Self::with_budget(Duration::from_millis(20))
    }
}

impl CacheBandwidthProbe {
    /// Time spent reading per cache level
    pub fn with_budget(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Probe for CacheBandwidthProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CacheBandwidth
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        let facts = &state.facts;
        if facts.l1_size_kb == 0 {
            return Err(ProbeError::missing(SOURCE, "L1 cache size"));
        }

        tracing::debug!("Measuring cache bandwidth");
        let levels = [facts.l1_size_kb, facts.l2_size_kb, facts.l3_size_kb];
        let mut missing = 0;

        for (size_kb, [_, _, speed_field]) in levels.into_iter().zip(Field::CACHES) {
            if size_kb == 0 {
                missing += 1;
                continue;
            }
            let mb_per_s = measure(size_kb as usize * 1024 / 2, self.budget);
            state.labels.set(speed_field, format!("{mb_per_s:.2} MB/s"));
        }

        Ok(match missing {
            0 => ProbeOutcome::Complete,
            n => ProbeOutcome::Degraded(n),
        })
    }
}

/// Read a `bytes`-sized buffer repeatedly for `budget`; returns MB/s
pub fn measure(bytes: usize, budget: Duration) -> f64 {
    let words = (bytes / std::mem::size_of::<u64>()).max(1);
    let buffer: Vec<u64> = (0..words as u64).collect();

    // Warm the buffer into cache before timing
    black_box(sum(&buffer));

    let start = Instant::now();
    let mut passes = 0u64;
    loop {
        black_box(sum(black_box(&buffer)));
        passes += 1;
        if start.elapsed() >= budget {
            break;
        }
    }

    let secs = start.elapsed().as_secs_f64().max(f64::EPSILON);
    let total = passes as f64 * (words * std::mem::size_of::<u64>()) as f64;
    total / secs / 1_000_000.0
}

fn sum(buffer: &[u64]) -> u64 {
    buffer.iter().fold(0u64, |acc, v| acc.wrapping_add(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_l1_size() {
        let mut state = ProbeState::default();
        let err = CacheBandwidthProbe::default().run(&mut state).unwrap_err();
        assert!(matches!(err, ProbeError::MissingPrerequisite { .. }));
        assert!(!err.is_permanent());
    }

    #[test]
    fn writes_speeds_for_known_levels() {
        let mut state = ProbeState::default();
        state.facts.l1_size_kb = 32;
        state.facts.l2_size_kb = 256;

        let mut probe = CacheBandwidthProbe::with_budget(Duration::from_millis(1));
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Degraded(1)));

        let l1 = state.labels.get(Field::L1Speed).unwrap();
        assert!(l1.ends_with(" MB/s"), "{l1}");
        assert!(state.labels.is_set(Field::L2Speed));
        assert!(!state.labels.is_set(Field::L3Speed));
    }

    #[test]
    fn measurement_is_positive() {
        assert!(measure(4096, Duration::from_millis(1)) > 0.0);
    }
}
