//! Chipset and graphics adapters from the PCI bus in sysfs.

use std::path::{Path, PathBuf};

use super::{read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

const SOURCE: &str = "pci devices";

const PCI_IDS_PATHS: [&str; 3] = [
    "/usr/share/hwdata/pci.ids",
    "/usr/share/misc/pci.ids",
    "/usr/share/pci.ids",
];

/// Short vendor names shown for graphics cards
const GPU_VENDORS: [&str; 3] = ["AMD", "Intel", "NVIDIA"];

const CLASS_BRIDGE_ISA: u32 = 0x0601;
const BASE_CLASS_DISPLAY: u32 = 0x03;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    /// Class code without the programming interface byte
    pub class: u32,
    pub vendor_id: u16,
    pub device_id: u16,
    pub driver: Option<String>,
}

impl PciDevice {
    fn read(dir: &Path) -> Option<Self> {
        let hex = |name: &str| -> Option<u32> {
            let raw = read_trimmed(dir.join(name))?;
            u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
        };
        let driver = std::fs::read_link(dir.join("driver"))
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

        Some(Self {
            class: hex("class")? >> 8,
            vendor_id: hex("vendor")? as u16,
            device_id: hex("device")? as u16,
            driver,
        })
    }

    pub fn is_isa_bridge(&self) -> bool {
        self.class == CLASS_BRIDGE_ISA
    }

    pub fn is_display(&self) -> bool {
        self.class >> 8 == BASE_CLASS_DISPLAY
    }
}

/// Vendor and device names from a `pci.ids` database
#[derive(Debug, Default)]
pub struct PciNames {
    text: Option<String>,
}

impl PciNames {
    pub fn load(paths: &[PathBuf]) -> Self {
        let text = paths.iter().find_map(|p| std::fs::read_to_string(p).ok());
        if text.is_none() {
            tracing::debug!("No pci.ids database found, using numeric IDs");
        }
        Self { text }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// (vendor name, device name), falling back to the numeric IDs
    pub fn lookup(&self, vendor_id: u16, device_id: u16) -> (String, String) {
        let fallback = (
            format!("Vendor {vendor_id:04x}"),
            format!("Device {device_id:04x}"),
        );
        let Some(text) = self.text.as_deref() else {
            return fallback;
        };

        let vendor_key = format!("{vendor_id:04x}");
        let device_key = format!("{device_id:04x}");
        let mut vendor_name = None;

        for line in text.lines() {
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            match vendor_name {
                None => {
                    if let Some(name) = line.strip_prefix(vendor_key.as_str()) {
                        if name.starts_with("  ") {
                            vendor_name = Some(name.trim().to_string());
                        }
                    }
                }
                Some(ref vendor) => {
                    // Device lines have one tab; the vendor block ends at the
                    // next unindented line
                    if !line.starts_with('\t') {
                        return (vendor.clone(), fallback.1);
                    }
                    if let Some(name) = line
                        .strip_prefix('\t')
                        .and_then(|l| l.strip_prefix(device_key.as_str()))
                    {
                        return (vendor.clone(), name.trim().to_string());
                    }
                }
            }
        }
        (vendor_name.unwrap_or(fallback.0), fallback.1)
    }
}

/// "NVIDIA" for "NVIDIA Corporation", or the full name when unknown
pub fn short_gpu_vendor(vendor: &str) -> &str {
    GPU_VENDORS
        .iter()
        .find(|short| vendor.contains(*short))
        .copied()
        .unwrap_or(vendor)
}

pub struct PciDevicesProbe {
    devices_dir: PathBuf,
    ids_paths: Vec<PathBuf>,
}

impl Default for PciDevicesProbe {
    fn default() -> Self {
        Self::with_paths(
            "/sys/bus/pci/devices",
            PCI_IDS_PATHS.iter().map(PathBuf::from).collect(),
        )
    }
}

impl PciDevicesProbe {
    pub fn with_paths(devices_dir: impl Into<PathBuf>, ids_paths: Vec<PathBuf>) -> Self {
        Self {
            devices_dir: devices_dir.into(),
            ids_paths,
        }
    }

    fn scan(&self) -> Result<Vec<PciDevice>, ProbeError> {
        let entries = std::fs::read_dir(&self.devices_dir).map_err(|e| {
            ProbeError::unavailable(SOURCE, format!("{}: {e}", self.devices_dir.display()))
        })?;
        let mut dirs: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        dirs.sort();
        Ok(dirs.iter().filter_map(|d| PciDevice::read(d)).collect())
    }
}

impl Probe for PciDevicesProbe {
    fn id(&self) -> ProbeId {
        ProbeId::PciDevices
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Finding devices");
        let devices = self.scan()?;
        let names = PciNames::load(&self.ids_paths);
        let labels = &mut state.labels;
        let mut chipset = false;
        let mut gpus = 0;

        for dev in &devices {
            if dev.is_isa_bridge() {
                let (vendor, model) = names.lookup(dev.vendor_id, dev.device_id);
                labels.set(Field::ChipVendor, vendor);
                labels.set(Field::ChipModel, model);
                chipset = true;
            }

            if dev.is_display() && gpus < Field::GPUS.len() {
                let (vendor, model) = names.lookup(dev.vendor_id, dev.device_id);
                let short = short_gpu_vendor(&vendor);
                let [vendor_field, model_field, _] = Field::GPUS[gpus];
                let vendor_text = match &dev.driver {
                    Some(driver) => format!("{short} ({driver} driver)"),
                    None => short.to_string(),
                };
                labels.set(vendor_field, vendor_text);
                labels.set(model_field, model);
                gpus += 1;
            }
        }
        state.facts.gpu_count = gpus;

        if !chipset {
            tracing::warn!("Failed to find chipset vendor and model");
        }
        if gpus == 0 {
            tracing::warn!("Failed to find graphic card vendor and model");
        }
        Ok(match usize::from(!chipset) + usize::from(gpus == 0) {
            0 => ProbeOutcome::Complete,
            n => ProbeOutcome::Degraded(n),
        })
    }
}
