use std::path::PathBuf;

use sysinfo::System;

use super::{read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

const SOURCE: &str = "cpu clock";

/// Current clock of the selected core.
///
/// cpufreq's `scaling_cur_freq` is preferred; sysinfo's frequency is used
/// where cpufreq is absent.
pub struct CpuClockProbe {
    cpu_root: PathBuf,
    sys: System,
}

impl Default for CpuClockProbe {
    fn default() -> Self {
        Self::with_root("/sys/devices/system/cpu")
    }
}

impl CpuClockProbe {
    pub fn with_root(cpu_root: impl Into<PathBuf>) -> Self {
        Self {
            cpu_root: cpu_root.into(),
            sys: System::new(),
        }
    }

    fn cpufreq_mhz(&self, core: usize) -> Option<f64> {
        let khz: f64 = read_trimmed(
            self.cpu_root
                .join(format!("cpu{core}"))
                .join("cpufreq/scaling_cur_freq"),
        )?
        .parse()
        .ok()?;
        Some(khz / 1000.0)
    }

    fn sysinfo_mhz(&mut self, core: usize) -> Option<f64> {
        self.sys.refresh_cpu_frequency();
        self.sys.cpus().get(core).map(|cpu| cpu.frequency() as f64)
    }
}

impl Probe for CpuClockProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CpuClock
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!(core = state.selected_core, "Reading CPU clock");
        let core = state.selected_core;
        let mhz = match self.cpufreq_mhz(core) {
            Some(mhz) => mhz,
            None => self.sysinfo_mhz(core).unwrap_or(0.0),
        };

        state.facts.cpu_freq_mhz = mhz;
        state
            .labels
            .set(Field::CoreSpeed, format!("{} MHz", mhz.round() as i64));

        if mhz <= 0.0 {
            return Err(ProbeError::implausible(
                SOURCE,
                format!("core {core} reports {mhz} MHz"),
            ));
        }
        Ok(ProbeOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_scaling_cur_freq_of_selected_core() {
        let dir = tempfile::tempdir().unwrap();
        let cpufreq = dir.path().join("cpu2/cpufreq");
        fs::create_dir_all(&cpufreq).unwrap();
        fs::write(cpufreq.join("scaling_cur_freq"), "3600000\n").unwrap();

        let mut probe = CpuClockProbe::with_root(dir.path());
        let mut state = ProbeState::new(2);
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
        assert_eq!(state.labels.get(Field::CoreSpeed), Some("3600 MHz"));
        assert_eq!(state.facts.cpu_freq_mhz, 3600.0);
    }

    #[test]
    fn zero_clock_is_implausible() {
        let dir = tempfile::tempdir().unwrap();
        let cpufreq = dir.path().join("cpu0/cpufreq");
        fs::create_dir_all(&cpufreq).unwrap();
        fs::write(cpufreq.join("scaling_cur_freq"), "0\n").unwrap();

        let mut probe = CpuClockProbe::with_root(dir.path());
        let mut state = ProbeState::default();
        let err = probe.run(&mut state).unwrap_err();
        assert!(matches!(err, ProbeError::DataImplausible { .. }));
        assert!(err.is_permanent());
    }
}
