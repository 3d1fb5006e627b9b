use std::path::PathBuf;

use super::{command_output, read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

const SOURCE: &str = "gpu temperature";

/// Graphics card temperatures.
///
/// The NVIDIA driver's `nvidia-smi` is asked first; open source drivers
/// expose `temp1_input` under the DRM card's hwmon directory.
pub struct GpuTemperatureProbe {
    drm_root: PathBuf,
    use_nvidia_smi: bool,
}

impl Default for GpuTemperatureProbe {
    fn default() -> Self {
        Self {
            drm_root: PathBuf::from("/sys/class/drm"),
            use_nvidia_smi: true,
        }
    }
}

impl GpuTemperatureProbe {
    /// Only read hwmon files below `drm_root`
    pub fn with_drm_root(drm_root: impl Into<PathBuf>) -> Self {
        Self {
            drm_root: drm_root.into(),
            use_nvidia_smi: false,
        }
    }

    fn nvidia_smi() -> Option<Vec<f64>> {
        let out = command_output(
            SOURCE,
            "nvidia-smi",
            &["--query-gpu=temperature.gpu", "--format=csv,noheader,nounits"],
        )
        .ok()?;
        let temps = parse_nvidia_smi(&out);
        (!temps.is_empty()).then_some(temps)
    }

    /// temp1_input of `cardN`, in °C
    fn drm_card(&self, card: usize) -> Option<f64> {
        let hwmon = self.drm_root.join(format!("card{card}/device/hwmon"));
        let mut dirs: Vec<_> = std::fs::read_dir(hwmon).ok()?.flatten().collect();
        dirs.sort_by_key(|e| e.file_name());
        dirs.iter().find_map(|entry| {
            let millideg: f64 = read_trimmed(entry.path().join("temp1_input"))?.parse().ok()?;
            Some(millideg / 1000.0)
        })
    }
}

impl Probe for GpuTemperatureProbe {
    fn id(&self) -> ProbeId {
        ProbeId::GpuTemperature
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Retrieving GPU temperature");
        let slots = Field::GPUS.len();

        let temps: Vec<Option<f64>> = match self.use_nvidia_smi.then(Self::nvidia_smi).flatten() {
            Some(temps) => temps.into_iter().map(Some).collect(),
            None => (0..slots).map(|card| self.drm_card(card)).collect(),
        };

        let mut written = 0;
        for (temp, [_, _, field]) in temps.into_iter().zip(Field::GPUS) {
            if let Some(celsius) = temp.filter(|t| *t > 0.0) {
                state.labels.set(field, format!("{celsius:.2}°C"));
                written += 1;
            }
        }

        if written == 0 {
            return Err(ProbeError::unavailable(SOURCE, "no temperature sensor found"));
        }
        Ok(ProbeOutcome::Complete)
    }
}

/// One temperature per line of `nvidia-smi` CSV output
pub fn parse_nvidia_smi(output: &str) -> Vec<f64> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
