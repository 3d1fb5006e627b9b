//! Unprivileged replacements for fields the primary probes left unset.

use std::path::PathBuf;

use sysinfo::Components;

use super::{command_output, read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

/// Codename -> socket, for processors whose firmware omits the package
const PACKAGES: &[(&str, &str)] = &[
    ("Pentium D (SmithField)", "LGA775"),
    ("Pentium D (Presler)", "LGA775"),
    ("Atom (Diamondville)", "BGA437"),
    ("Core 2 (Conroe)", "LGA775"),
    ("Core 2 (Wolfdale)", "LGA775"),
    ("Sandy Bridge", "LGA1155"),
    ("Ivy Bridge", "LGA1155"),
    ("Haswell", "LGA1150"),
    ("Skylake", "LGA1151"),
    ("Kaby Lake", "LGA1151"),
    ("Coffee Lake", "LGA1151"),
    ("Comet Lake", "LGA1200"),
    ("Alder Lake", "LGA1700"),
    ("Raptor Lake", "LGA1700"),
    ("Summit Ridge", "AM4"),
    ("Pinnacle Ridge", "AM4"),
    ("Matisse", "AM4"),
    ("Vermeer", "AM4"),
    ("Raphael", "AM5"),
    ("Granite Ridge", "AM5"),
];

/// DMI attribute files, in Motherboard field order
const DMI_FILES: [(&str, Field); 6] = [
    ("board_vendor", Field::Manufacturer),
    ("board_name", Field::BoardModel),
    ("board_version", Field::Revision),
    ("bios_vendor", Field::BiosBrand),
    ("bios_version", Field::BiosVersion),
    ("bios_date", Field::BiosDate),
];

pub struct CpuPackageFallback;

impl Probe for CpuPackageFallback {
    fn id(&self) -> ProbeId {
        ProbeId::CpuPackageFallback
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Finding CPU package in fallback mode");
        let codename = state
            .labels
            .get(Field::Codename)
            .ok_or_else(|| ProbeError::missing("cpu package", "codename"))?;

        let Some((_, socket)) = PACKAGES.iter().find(|(name, _)| *name == codename) else {
            tracing::warn!(
                specification = state.labels.get(Field::Specification).unwrap_or("unknown"),
                codename,
                "CPU socket not in package table"
            );
            return Err(ProbeError::unavailable("cpu package", format!("no socket for {codename}")));
        };

        state.labels.set(Field::Package, *socket);
        Ok(ProbeOutcome::Complete)
    }
}

/// Board and BIOS identity from the kernel's DMI attributes
pub struct MotherboardFallback {
    dmi_root: PathBuf,
}

impl Default for MotherboardFallback {
    fn default() -> Self {
        Self::with_root("/sys/class/dmi/id")
    }
}

impl MotherboardFallback {
    pub fn with_root(dmi_root: impl Into<PathBuf>) -> Self {
        Self {
            dmi_root: dmi_root.into(),
        }
    }
}

impl Probe for MotherboardFallback {
    fn id(&self) -> ProbeId {
        ProbeId::MotherboardFallback
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Retrieving motherboard information in fallback mode");
        let mut unreadable = 0;
        for (file, field) in DMI_FILES {
            match read_trimmed(self.dmi_root.join(file)) {
                Some(value) => {
                    state.labels.set(field, value);
                }
                None => unreadable += 1,
            }
        }

        match unreadable {
            0 => Ok(ProbeOutcome::Complete),
            n if n == DMI_FILES.len() => Err(ProbeError::unavailable(
                "motherboard",
                format!("{} unreadable", self.dmi_root.display()),
            )),
            n => Ok(ProbeOutcome::Degraded(n)),
        }
    }
}

/// CPU temperature from hwmon sensors, readable without root
#[derive(Default)]
pub struct CpuTempFallback;

impl Probe for CpuTempFallback {
    fn id(&self) -> ProbeId {
        ProbeId::CpuTempFallback
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Retrieving CPU temperature in fallback mode");
        let components = Components::new_with_refreshed_list();
        let readings: Vec<(String, f64)> = components
            .iter()
            .map(|c| (c.label().to_string(), c.temperature() as f64))
            .collect();

        let celsius = pick_cpu_temperature(&readings, state.selected_core)
            .ok_or_else(|| ProbeError::unavailable("cpu temperature", "no CPU sensor"))?;
        state.labels.set(Field::Temperature, format!("{celsius:.2}°C"));
        Ok(ProbeOutcome::Complete)
    }
}

/// The selected core's sensor, else a package-level one
pub fn pick_cpu_temperature(readings: &[(String, f64)], core: usize) -> Option<f64> {
    let core_label = format!("core {core}");
    let valid = || readings.iter().filter(|(_, t)| *t > 0.0);

    valid()
        .find(|(label, _)| label.to_lowercase().ends_with(&core_label))
        .or_else(|| {
            valid().find(|(label, _)| {
                let label = label.to_lowercase();
                ["package", "tctl", "tdie", "k10temp", "cpu"]
                    .iter()
                    .any(|key| label.contains(key))
            })
        })
        .map(|(_, t)| *t)
}

/// Core voltage from lm-sensors output
pub struct CpuVoltFallback;

impl Probe for CpuVoltFallback {
    fn id(&self) -> ProbeId {
        ProbeId::CpuVoltFallback
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Retrieving CPU voltage in fallback mode");
        let output = command_output("cpu voltage", "sensors", &[])?;
        let volts = parse_vcore(&output)
            .ok_or_else(|| ProbeError::unavailable("cpu voltage", "no Vcore line"))?;
        state.labels.set(Field::Voltage, format!("{volts:.3} V"));
        Ok(ProbeOutcome::Complete)
    }
}

/// "Vcore:  +1.22 V  (min = ...)" -> 1.22
pub fn parse_vcore(sensors: &str) -> Option<f64> {
    sensors
        .lines()
        .find(|line| line.to_lowercase().contains("vcore"))
        .and_then(|line| line.split_once(':'))
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|v| v.trim_start_matches('+').trim_end_matches('V').parse().ok())
        .filter(|v: &f64| *v > 0.0)
}

/// "x current (min-max)" from cpufreq limits and the bus clock
pub struct CpuMultiplierFallback {
    cpu_root: PathBuf,
    /// Computed on the first run; None inside means no range is available
    range: Option<Option<(f64, f64)>>,
    warned: bool,
}

impl Default for CpuMultiplierFallback {
    fn default() -> Self {
        Self::with_root("/sys/devices/system/cpu")
    }
}

impl CpuMultiplierFallback {
    pub fn with_root(cpu_root: impl Into<PathBuf>) -> Self {
        Self {
            cpu_root: cpu_root.into(),
            range: None,
            warned: false,
        }
    }

    fn read_range(&self, core: usize, bus_mhz: f64) -> Option<(f64, f64)> {
        let cpufreq = self.cpu_root.join(format!("cpu{core}/cpufreq"));
        let mhz = |file: &str| -> Option<f64> {
            let khz: f64 = read_trimmed(cpufreq.join(file))?.parse().ok()?;
            Some(khz / 1000.0)
        };
        let min = (mhz("cpuinfo_min_freq")? / bus_mhz).round();
        let max = (mhz("cpuinfo_max_freq")? / bus_mhz).round();
        (min > 0.0 && max > 0.0).then_some((min, max))
    }
}

impl Probe for CpuMultiplierFallback {
    fn id(&self) -> ProbeId {
        ProbeId::CpuMultiplierFallback
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        if !state.has_cpu_freq() {
            return Err(ProbeError::missing("cpu multiplier", "core clock"));
        }
        if !state.has_bus_freq() {
            return Err(ProbeError::missing("cpu multiplier", "bus clock"));
        }

        tracing::debug!("Calculating CPU multipliers in fallback mode");
        let bus = state.facts.bus_freq_mhz;
        let current = state.facts.cpu_freq_mhz / bus;
        let range = match self.range {
            Some(range) => range,
            None => {
                let range = self.read_range(state.selected_core, bus);
                self.range = Some(range);
                range
            }
        };

        let text = match range {
            Some((min, max)) => format!("x{current:.1} ({min:.0}-{max:.0})"),
            None => {
                if !self.warned {
                    tracing::warn!("Cannot get minimum and maximum CPU multipliers");
                    self.warned = true;
                }
                format!("x {current:.2}")
            }
        };
        state.labels.set(Field::Multiplier, text);
        Ok(ProbeOutcome::Complete)
    }
}
