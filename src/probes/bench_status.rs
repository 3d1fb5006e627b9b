use std::sync::Arc;

use super::{Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::bench::{BenchmarkEngine, BenchmarkStatus};
use crate::labels::Field;
use crate::state::ProbeState;
use crate::types::BenchMode;

/// Formats the benchmark engine's state into the Bench fields.
///
/// Reads engine state only; starting and stopping runs is up to the caller.
pub struct BenchmarkStatusProbe {
    engine: Arc<BenchmarkEngine>,
}

impl BenchmarkStatusProbe {
    pub fn new(engine: Arc<BenchmarkEngine>) -> Self {
        Self { engine }
    }
}

impl Probe for BenchmarkStatusProbe {
    fn id(&self) -> ProbeId {
        ProbeId::BenchmarkStatus
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Updating benchmark status");
        let params = self.engine.params();
        let status = self.engine.status();
        let labels = &mut state.labels;

        labels.set(Field::ParamDuration, format!("{} mins", params.duration_minutes));
        labels.set(Field::ParamThreads, params.threads.to_string());
        labels.set(Field::PrimeSlowRun, "Inactive");
        labels.set(Field::PrimeFastRun, "Inactive");

        if !status.started {
            labels.set(Field::PrimeSlowScore, "Not started");
            labels.set(Field::PrimeFastScore, "Not started");
            return Ok(ProbeOutcome::Complete);
        }

        let (score_field, run_field) = match status.params.mode {
            BenchMode::Fast => (Field::PrimeFastScore, Field::PrimeFastRun),
            BenchMode::Slow => (Field::PrimeSlowScore, Field::PrimeSlowRun),
        };
        if status.running {
            labels.set(run_field, "Active");
        }
        labels.set(score_field, score_text(&status));

        Ok(ProbeOutcome::Complete)
    }
}

/// "1,234,567 (3 minutes left)" while running, "1,234,567 in 2 minutes" after
pub fn score_text(status: &BenchmarkStatus) -> String {
    let timing = if status.running {
        time_left(status.params.duration_minutes, status.elapsed_secs)
    } else {
        time_taken(status.elapsed_secs)
    };
    format!("{} {}", group_thousands(status.primes), timing)
}

fn time_left(duration_minutes: u64, elapsed: u64) -> String {
    let remaining = duration_minutes.saturating_mul(60).saturating_sub(elapsed);
    let minutes_left = duration_minutes.saturating_sub(elapsed / 60);
    if remaining > 59 * 60 {
        format!("({} hours left)", minutes_left / 60)
    } else if remaining >= 60 {
        format!("({} minutes left)", minutes_left)
    } else {
        format!("({} seconds left)", remaining)
    }
}

fn time_taken(elapsed: u64) -> String {
    if elapsed >= 60 * 60 {
        format!("in {} hours", elapsed / 3600)
    } else if elapsed >= 60 {
        format!("in {} minutes", elapsed / 60)
    } else {
        format!("in {} seconds", elapsed)
    }
}

/// Decimal with a comma every three digits
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::BenchParams;

    fn status(running: bool, duration_minutes: u64, elapsed_secs: u64) -> BenchmarkStatus {
        BenchmarkStatus {
            params: BenchParams {
                threads: 2,
                duration_minutes,
                mode: BenchMode::Fast,
            },
            started: true,
            running,
            primes: 1_234_567,
            elapsed_secs,
            spawn_errors: 0,
        }
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn time_left_units() {
        assert_eq!(score_text(&status(true, 120, 0)), "1,234,567 (2 hours left)");
        assert_eq!(score_text(&status(true, 5, 90)), "1,234,567 (4 minutes left)");
        assert_eq!(score_text(&status(true, 1, 45)), "1,234,567 (15 seconds left)");
    }

    #[test]
    fn time_taken_units() {
        assert_eq!(score_text(&status(false, 1, 42)), "1,234,567 in 42 seconds");
        assert_eq!(score_text(&status(false, 5, 300)), "1,234,567 in 5 minutes");
        assert_eq!(score_text(&status(false, 90, 7200)), "1,234,567 in 2 hours");
    }

    #[test]
    fn huge_duration_does_not_overflow() {
        let text = score_text(&status(true, u64::MAX / 2, 10));
        assert!(text.ends_with("hours left)"), "{text}");
    }

    #[test]
    fn not_started_before_any_run() {
        let engine = Arc::new(BenchmarkEngine::new(BenchParams {
            threads: 4,
            duration_minutes: 3,
            mode: BenchMode::Slow,
        }));
        let mut probe = BenchmarkStatusProbe::new(engine);
        let mut state = ProbeState::default();
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));

        let labels = &state.labels;
        assert_eq!(labels.get(Field::ParamDuration), Some("3 mins"));
        assert_eq!(labels.get(Field::ParamThreads), Some("4"));
        assert_eq!(labels.get(Field::PrimeSlowRun), Some("Inactive"));
        assert_eq!(labels.get(Field::PrimeFastScore), Some("Not started"));
        assert_eq!(labels.get(Field::PrimeSlowScore), Some("Not started"));
    }
}
