pub mod bandwidth;
pub mod bench_status;
pub mod clock;
pub mod cpuid;
pub mod dmidecode;
pub mod fallback;
pub mod gpu;
#[cfg(target_os = "linux")]
pub mod msr;
#[cfg(target_os = "linux")]
pub mod pci;
pub mod system;
pub mod usage;

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::bench::BenchmarkEngine;
use crate::error::ProbeError;
use crate::state::ProbeState;
use crate::types::Category;

/// Stable identity of every probe, used as the skip-cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeId {
    Dmidecode,
    CpuidStatic,
    CpuClock,
    CpuMsr,
    SystemDynamic,
    CacheBandwidth,
    PciDevices,
    CpuUsage,
    SystemStatic,
    GpuTemperature,
    BenchmarkStatus,
    CpuPackageFallback,
    MotherboardFallback,
    CpuTempFallback,
    CpuVoltFallback,
    CpuMultiplierFallback,
}

impl ProbeId {
    pub const ALL: [ProbeId; 16] = [
        Self::Dmidecode,
        Self::CpuidStatic,
        Self::CpuClock,
        Self::CpuMsr,
        Self::SystemDynamic,
        Self::CacheBandwidth,
        Self::PciDevices,
        Self::CpuUsage,
        Self::SystemStatic,
        Self::GpuTemperature,
        Self::BenchmarkStatus,
        Self::CpuPackageFallback,
        Self::MotherboardFallback,
        Self::CpuTempFallback,
        Self::CpuVoltFallback,
        Self::CpuMultiplierFallback,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dmidecode => "dmidecode",
            Self::CpuidStatic => "cpuid static",
            Self::CpuClock => "cpu clock",
            Self::CpuMsr => "cpu msr",
            Self::SystemDynamic => "system dynamic",
            Self::CacheBandwidth => "cache bandwidth",
            Self::PciDevices => "pci devices",
            Self::CpuUsage => "cpu usage",
            Self::SystemStatic => "system static",
            Self::GpuTemperature => "gpu temperature",
            Self::BenchmarkStatus => "benchmark status",
            Self::CpuPackageFallback => "cpu package fallback",
            Self::MotherboardFallback => "motherboard fallback",
            Self::CpuTempFallback => "cpu temperature fallback",
            Self::CpuVoltFallback => "cpu voltage fallback",
            Self::CpuMultiplierFallback => "cpu multiplier fallback",
        }
    }

    /// Category a partial refresh of this probe is allowed to write
    pub fn category(&self) -> Category {
        match self {
            Self::Dmidecode | Self::CpuidStatic | Self::CpuPackageFallback => Category::Cpu,
            Self::CpuClock | Self::CpuMsr | Self::CpuUsage => Category::Cpu,
            Self::CpuTempFallback | Self::CpuVoltFallback | Self::CpuMultiplierFallback => {
                Category::Cpu
            }
            Self::SystemDynamic | Self::SystemStatic => Category::System,
            Self::CacheBandwidth => Category::Caches,
            Self::PciDevices | Self::GpuTemperature => Category::Graphics,
            Self::MotherboardFallback => Category::Motherboard,
            Self::BenchmarkStatus => Category::Bench,
        }
    }
}

/// Successful probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// All fields the probe is responsible for were written
    Complete,
    /// Some sub-sources failed; the count joins the pass error total
    Degraded(usize),
}

impl ProbeOutcome {
    pub fn error_count(&self) -> usize {
        match self {
            Self::Complete => 0,
            Self::Degraded(n) => *n,
        }
    }
}

pub type ProbeResult = Result<ProbeOutcome, ProbeError>;

/// A data source that writes zero or more fields into the shared state
pub trait Probe: Send {
    fn id(&self) -> ProbeId;

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult;
}

/// The probes available on this platform, keyed by identity.
///
/// A missing entry means the capability was not built in for this target;
/// the orchestrator skips it silently.
#[derive(Default)]
pub struct ProbeSet {
    probes: HashMap<ProbeId, Box<dyn Probe>>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The real sources for the running system
    pub fn platform(bench: Arc<BenchmarkEngine>) -> Self {
        #[cfg_attr(not(target_os = "linux"), allow(unused_mut))]
        let mut set = Self::new()
            .with(cpuid::CpuidStaticProbe::default())
            .with(clock::CpuClockProbe::default())
            .with(system::SystemDynamicProbe::default())
            .with(system::SystemStaticProbe)
            .with(usage::CpuUsageProbe::default())
            .with(bandwidth::CacheBandwidthProbe::default())
            .with(gpu::GpuTemperatureProbe::default())
            .with(bench_status::BenchmarkStatusProbe::new(bench))
            .with(fallback::CpuPackageFallback)
            .with(fallback::CpuTempFallback::default())
            .with(fallback::CpuVoltFallback);

        #[cfg(target_os = "linux")]
        {
            set = set
                .with(dmidecode::DmidecodeProbe)
                .with(msr::CpuMsrProbe::default())
                .with(pci::PciDevicesProbe::default())
                .with(fallback::MotherboardFallback::default())
                .with(fallback::CpuMultiplierFallback::default());
        }

        set
    }

    pub fn with(mut self, probe: impl Probe + 'static) -> Self {
        self.insert(Box::new(probe));
        self
    }

    pub fn insert(&mut self, probe: Box<dyn Probe>) {
        self.probes.insert(probe.id(), probe);
    }

    pub fn get_mut(&mut self, id: ProbeId) -> Option<&mut (dyn Probe + 'static)> {
        self.probes.get_mut(&id).map(|p| p.as_mut())
    }

    pub fn contains(&self, id: ProbeId) -> bool {
        self.probes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

// -- Shared helpers for probe implementations --

/// Whether the process runs with root privileges
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Run a command and return its stdout, or why it could not be used
pub fn command_output(source: &str, program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .env("LC_ALL", "C")
        .output()
        .map_err(|e| ProbeError::unavailable(source, format!("{program}: {e}")))?;

    if !output.status.success() {
        return Err(ProbeError::unavailable(
            source,
            format!("{program} exited with {}", output.status),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Read a small pseudo-file and trim trailing whitespace
pub fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Print as decimal, adding hexadecimal when the value exceeds 9
pub fn dec_hex(value: u32) -> String {
    if value > 9 {
        format!("{} ({:X})", value, value)
    } else {
        value.to_string()
    }
}
