use crate::labels::LabelTable;

/// CPU vendor, as recognised from the vendor string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuVendor {
    Intel,
    Amd,
    Other,
    #[default]
    Unknown,
}

/// Numeric facts probes share with each other.
///
/// These are intermediate values (for instance the bus clock a multiplier is
/// derived from); they are not displayed directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HardwareFacts {
    pub cpu_vendor: CpuVendor,
    pub cpu_family: Option<u32>,
    pub cpu_model: Option<u32>,
    pub cpu_ext_family: Option<u32>,
    pub cpu_ext_model: Option<u32>,
    /// Logical CPUs seen by the OS
    pub cpu_count: usize,
    /// Current clock of the selected core, MHz
    pub cpu_freq_mhz: f64,
    /// External/base clock, MHz
    pub bus_freq_mhz: f64,
    /// Cache sizes in KiB
    pub l1_size_kb: u32,
    pub l2_size_kb: u32,
    pub l3_size_kb: u32,
    pub gpu_count: usize,
    pub dimm_count: usize,
}

/// Everything a probe may read or write during a pass
#[derive(Debug, Clone, Default)]
pub struct ProbeState {
    pub labels: LabelTable,
    pub facts: HardwareFacts,
    /// Core whose clock/temperature/voltage are reported
    pub selected_core: usize,
}

impl ProbeState {
    pub fn new(selected_core: usize) -> Self {
        Self {
            selected_core,
            ..Self::default()
        }
    }

    /// Bus clock is known and positive
    pub fn has_bus_freq(&self) -> bool {
        self.facts.bus_freq_mhz > 0.0
    }

    pub fn has_cpu_freq(&self) -> bool {
        self.facts.cpu_freq_mhz > 0.0
    }
}
