//! Model-specific register readout through the `msr` kernel driver.
//!
//! Only Intel layouts are decoded. Each register is 8 bytes read at the
//! offset equal to its address in `/dev/cpu/N/msr`.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{is_root, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::{CpuVendor, ProbeState};

const SOURCE: &str = "cpu msr";

pub const MSR_PLATFORM_INFO: u64 = 0xCE;
pub const IA32_PERF_STATUS: u64 = 0x198;
pub const IA32_THERM_STATUS: u64 = 0x19C;
pub const MSR_TEMPERATURE_TARGET: u64 = 0x1A2;

/// Values decoded from one core's registers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MsrReadings {
    pub temperature_c: Option<u32>,
    pub voltage_v: Option<f64>,
    pub current_ratio: Option<u32>,
    pub min_ratio: Option<u32>,
    pub max_ratio: Option<u32>,
}

pub struct CpuMsrProbe {
    dev_root: PathBuf,
    require_root: bool,
    driver_loaded: bool,
}

impl Default for CpuMsrProbe {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from("/dev/cpu"),
            require_root: true,
            driver_loaded: false,
        }
    }
}

impl CpuMsrProbe {
    /// Read register files below `dev_root` without privilege checks
    pub fn with_dev_root(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
            require_root: false,
            driver_loaded: true,
        }
    }

    /// Try `modprobe msr` once per process
    fn load_driver(&mut self) {
        if self.driver_loaded {
            return;
        }
        self.driver_loaded = true;
        tracing::debug!("Loading 'msr' kernel module");
        match Command::new("modprobe").arg("msr").status() {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(%status, "Failed to load 'msr' kernel module"),
            Err(e) => tracing::warn!(error = %e, "Failed to load 'msr' kernel module"),
        }
    }
}

impl Probe for CpuMsrProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CpuMsr
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        if self.require_root && !is_root() {
            return Err(ProbeError::permission_denied(SOURCE));
        }
        match state.facts.cpu_vendor {
            CpuVendor::Intel => {}
            CpuVendor::Unknown => return Err(ProbeError::missing(SOURCE, "cpu vendor")),
            CpuVendor::Amd | CpuVendor::Other => {
                return Err(ProbeError::unavailable(
                SOURCE,
                    "register layout known for Intel processors only",
                ));
            }
        }

        tracing::debug!(core = state.selected_core, "Reading CPU MSR values");
        self.load_driver();
        let path = msr_path(&self.dev_root, state.selected_core);
        let file = File::open(&path)
            .map_err(|e| ProbeError::unavailable(SOURCE, format!("{}: {e}", path.display())))?;

        let (readings, unreadable) = read_all(&file);
        apply(state, &readings);

        Ok(match unreadable {
            0 => ProbeOutcome::Complete,
            n => ProbeOutcome::Degraded(n),
        })
    }
}

fn read_msr(file: &File, address: u64) -> Option<u64> {
    let mut buf = [0u8; 8];
    file.read_exact_at(&mut buf, address).ok()?;
    Some(u64::from_le_bytes(buf))
}

/// Decode every register, counting the ones that could not be read
fn read_all(file: &File) -> (MsrReadings, usize) {
    let platform = read_msr(file, MSR_PLATFORM_INFO);
    let perf = read_msr(file, IA32_PERF_STATUS);
    let therm = read_msr(file, IA32_THERM_STATUS);
    let target = read_msr(file, MSR_TEMPERATURE_TARGET);

    let unreadable = [platform, perf, therm, target]
        .iter()
        .filter(|r| r.is_none())
        .count();

    let readings = MsrReadings {
        temperature_c: target.zip(therm).and_then(|(t, s)| decode_temperature(t, s)),
        voltage_v: perf.and_then(decode_voltage),
        current_ratio: perf.map(decode_current_ratio).filter(|r| *r > 0),
        min_ratio: platform.map(|p| ((p >> 40) & 0xFF) as u32).filter(|r| *r > 0),
        max_ratio: platform.map(|p| ((p >> 8) & 0xFF) as u32).filter(|r| *r > 0),
    };
    (readings, unreadable)
}

/// TjMax minus the digital readout, when the readout is valid
pub fn decode_temperature(target: u64, status: u64) -> Option<u32> {
    let valid = status & (1 << 31) != 0;
    let tj_max = ((target >> 16) & 0xFF) as u32;
    let readout = ((status >> 16) & 0x7F) as u32;
    (valid && tj_max > readout).then(|| tj_max - readout)
}

/// Core voltage in units of 1/8192 V
pub fn decode_voltage(perf_status: u64) -> Option<f64> {
    let raw = (perf_status >> 32) & 0xFFFF;
    (raw > 0).then(|| raw as f64 / 8192.0)
}

pub fn decode_current_ratio(perf_status: u64) -> u32 {
    ((perf_status >> 8) & 0xFF) as u32
}

fn apply(state: &mut ProbeState, r: &MsrReadings) {
    if let Some(volt) = r.voltage_v {
        state.labels.set(Field::Voltage, format!("{volt:.3} V"));
    }
    if let Some(temp) = r.temperature_c {
        state.labels.set(Field::Temperature, format!("{temp}°C"));
    }

    if let Some(ratio) = r.current_ratio {
        if state.has_cpu_freq() {
            let bus = state.facts.cpu_freq_mhz / ratio as f64;
            state.facts.bus_freq_mhz = bus;
            state.labels.set(Field::BusSpeed, format!("{bus:.2} MHz"));
        }
    }

    if let (Some(min), Some(max)) = (r.min_ratio, r.max_ratio) {
        if state.has_bus_freq() && state.has_cpu_freq() {
            let current = state.facts.cpu_freq_mhz / state.facts.bus_freq_mhz;
            state.labels.set(
                Field::Multiplier,
                format!("x{current:.1} ({min}-{max})"),
            );
        }
    }
}

/// Path of the register file for a core below `root`
pub fn msr_path(root: &Path, core: usize) -> PathBuf {
    root.join(core.to_string()).join("msr")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_msr(file: &File, address: u64, value: u64) {
        file.write_all_at(&value.to_le_bytes(), address).unwrap();
    }

    #[test]
    fn decodes_thermal_status() {
        // TjMax 100, readout 38 -> 62°C
        let target = 100 << 16;
        let status = (1 << 31) | (38 << 16);
        assert_eq!(decode_temperature(target, status), Some(62));
        assert_eq!(decode_temperature(target, 38 << 16), None);
    }

    #[test]
    fn decodes_voltage() {
        let perf = 0x2000u64 << 32;
        assert_eq!(decode_voltage(perf), Some(1.0));
        assert_eq!(decode_voltage(0), None);
    }

    #[test]
    fn needs_root_by_default() {
        if is_root() {
            return;
        }
        let mut state = ProbeState::default();
        state.facts.cpu_vendor = CpuVendor::Intel;
        let err = CpuMsrProbe::default().run(&mut state).unwrap_err();
        assert_eq!(err, ProbeError::permission_denied(SOURCE));
    }

    #[test]
    fn fills_cpu_fields_from_register_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = msr_path(dir.path(), 0);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        write_msr(&file, MSR_PLATFORM_INFO, (8 << 40) | (36 << 8));
        write_msr(&file, IA32_PERF_STATUS, (0x2000 << 32) | (40 << 8));
        write_msr(&file, IA32_THERM_STATUS, (1 << 31) | (50 << 16));
        write_msr(&file, MSR_TEMPERATURE_TARGET, 100 << 16);

        let mut state = ProbeState::default();
        state.facts.cpu_vendor = CpuVendor::Intel;
        state.facts.cpu_freq_mhz = 4000.0;

        let mut probe = CpuMsrProbe::with_dev_root(dir.path());
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
        assert_eq!(state.labels.get(Field::Temperature), Some("50°C"));
        assert_eq!(state.labels.get(Field::Voltage), Some("1.000 V"));
        assert_eq!(state.labels.get(Field::BusSpeed), Some("100.00 MHz"));
        assert_eq!(state.labels.get(Field::Multiplier), Some("x40.0 (8-36)"));
        assert_eq!(state.facts.bus_freq_mhz, 100.0);
    }

    #[test]
    fn undetected_vendor_is_a_missing_prerequisite() {
        let mut state = ProbeState::default();
        let err = CpuMsrProbe::with_dev_root("/nonexistent").run(&mut state).unwrap_err();
        assert!(matches!(err, ProbeError::MissingPrerequisite { .. }));
        assert!(!err.is_permanent());
    }

    #[test]
    fn amd_is_unavailable() {
        let mut state = ProbeState::default();
        state.facts.cpu_vendor = CpuVendor::Amd;
        let err = CpuMsrProbe::with_dev_root("/nonexistent").run(&mut state).unwrap_err();
        assert!(matches!(err, ProbeError::SourceUnavailable { .. }));
    }
}
