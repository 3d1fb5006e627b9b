use sysinfo::{CpuRefreshKind, RefreshKind, System};

use super::{Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::labels::Field;
use crate::state::ProbeState;

/// Global CPU usage since the previous sample.
///
/// The first run only primes sysinfo's counters, so the field is left unset
/// until a second sample gives a non-zero delta.
pub struct CpuUsageProbe {
    sys: System,
}

impl Default for CpuUsageProbe {
    fn default() -> Self {
        Self {
            sys: System::new_with_specifics(
                RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()),
            ),
        }
    }
}

impl Probe for CpuUsageProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CpuUsage
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Calculating CPU usage");
        self.sys.refresh_cpu_usage();
        if let Some(text) = format_usage(self.sys.global_cpu_usage()) {
            state.labels.set(Field::Usage, text);
        }
        Ok(ProbeOutcome::Complete)
    }
}

/// "%6.2f %%", or nothing for an idle/unprimed sample
pub fn format_usage(percent: f32) -> Option<String> {
    (percent > 0.0).then(|| format!("{percent:>6.2} %"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_usage_is_not_written() {
        assert_eq!(format_usage(0.0), None);
        assert_eq!(format_usage(7.5).as_deref(), Some("  7.50 %"));
        assert_eq!(format_usage(100.0).as_deref(), Some("100.00 %"));
    }

    #[test]
    fn probe_never_fails() {
        let mut probe = CpuUsageProbe::default();
        let mut state = ProbeState::default();
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
    }
}
