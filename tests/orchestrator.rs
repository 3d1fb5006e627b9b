use std::sync::{Arc, Mutex};
use std::time::Duration;

use hx_300::error::ProbeError;
use hx_300::labels::Field;
use hx_300::orchestrator::Orchestrator;
use hx_300::probes::bandwidth::CacheBandwidthProbe;
use hx_300::probes::{Probe, ProbeId, ProbeOutcome, ProbeResult, ProbeSet};
use hx_300::state::{CpuVendor, ProbeState};
use hx_300::types::Category;

type CallLog = Arc<Mutex<Vec<ProbeId>>>;

/// Probe that writes canned values, optionally failing afterwards
struct Canned {
    id: ProbeId,
    writes: Vec<(Field, String)>,
    error: Option<ProbeError>,
    l1_size_kb: Option<u32>,
    vendor: Option<CpuVendor>,
    calls: CallLog,
}

impl Canned {
    fn new(calls: &CallLog, id: ProbeId) -> Self {
        Self {
            id,
            writes: Vec::new(),
            error: None,
            l1_size_kb: None,
            vendor: None,
            calls: Arc::clone(calls),
        }
    }

    fn writes(mut self, field: Field, value: &str) -> Self {
        self.writes.push((field, value.to_string()));
        self
    }

    fn fails(mut self, error: ProbeError) -> Self {
        self.error = Some(error);
        self
    }
}

impl Probe for Canned {
    fn id(&self) -> ProbeId {
        self.id
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        self.calls.lock().unwrap().push(self.id);
        if let Some(kb) = self.l1_size_kb {
            state.facts.l1_size_kb = kb;
        }
        if let Some(vendor) = self.vendor {
            state.facts.cpu_vendor = vendor;
        }
        for (field, value) in &self.writes {
            state.labels.set(*field, value.clone());
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(ProbeOutcome::Complete),
        }
    }
}

fn calls() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn partial_pass_leaves_other_categories_untouched() {
    let log = calls();
    let probes = ProbeSet::new()
        .with(
            Canned::new(&log, ProbeId::SystemStatic)
                .writes(Field::Kernel, "Linux 6.6.1")
                .writes(Field::Hostname, "rig"),
        )
        .with(
            Canned::new(&log, ProbeId::CpuClock)
                .writes(Field::CoreSpeed, "3400 MHz")
                // Outside CPU: must be dropped during refresh(Cpu)
                .writes(Field::Uptime, "0 days, 0 hours, 0 minutes, 1 seconds"),
        );
    let mut orch = Orchestrator::new(probes, 0);
    orch.fill_labels();

    let before: Vec<_> = Category::ALL
        .iter()
        .filter(|c| **c != Category::Cpu)
        .map(|c| orch.labels().snapshot(*c))
        .collect();

    orch.refresh(Category::Cpu).unwrap();

    let after: Vec<_> = Category::ALL
        .iter()
        .filter(|c| **c != Category::Cpu)
        .map(|c| orch.labels().snapshot(*c))
        .collect();
    assert_eq!(before, after);
    assert_eq!(orch.labels().get(Field::CoreSpeed), Some("3400 MHz"));
}

#[test]
fn full_pass_is_idempotent_for_static_fields() {
    let log = calls();
    let probes = ProbeSet::new()
        .with(
            Canned::new(&log, ProbeId::CpuidStatic)
                .writes(Field::Vendor, "Intel")
                .writes(Field::Codename, "Kaby Lake"),
        )
        .with(Canned::new(&log, ProbeId::Dmidecode).writes(Field::Package, "LGA1151"))
        .with(Canned::new(&log, ProbeId::CpuPackageFallback).writes(Field::Package, "wrong"));
    let mut orch = Orchestrator::new(probes, 0);

    orch.fill_labels();
    let first: Vec<_> = Category::ALL.iter().map(|c| orch.labels().snapshot(*c)).collect();
    orch.fill_labels();
    let second: Vec<_> = Category::ALL.iter().map(|c| orch.labels().snapshot(*c)).collect();

    assert_eq!(first, second);
    assert_eq!(orch.labels().get(Field::Package), Some("LGA1151"));
}

#[test]
fn fallback_fills_field_after_privileged_probe_is_disabled() {
    let log = calls();
    let probes = ProbeSet::new()
        .with(Canned::new(&log, ProbeId::CpuMsr).fails(ProbeError::permission_denied("msr")))
        .with(Canned::new(&log, ProbeId::CpuTempFallback).writes(Field::Temperature, "41.00°C"));
    let mut orch = Orchestrator::new(probes, 0);

    let report = orch.fill_labels();
    assert_eq!(report.error_count(), 1);
    assert_eq!(orch.labels().get(Field::Temperature), Some("41.00°C"));
    assert!(orch.skip_cache().is_disabled(ProbeId::CpuMsr));

    for _ in 0..3 {
        orch.refresh(Category::Cpu).unwrap();
    }

    let msr_calls = log
        .lock()
        .unwrap()
        .iter()
        .filter(|id| **id == ProbeId::CpuMsr)
        .count();
    assert_eq!(msr_calls, 1);
    assert_eq!(orch.labels().get(Field::Temperature), Some("41.00°C"));
}

#[test]
fn board_fallback_runs_when_dmidecode_fails() {
    let log = calls();
    let mut fallback = Canned::new(&log, ProbeId::MotherboardFallback);
    for (field, value) in [
        (Field::Manufacturer, "ASUSTeK COMPUTER INC."),
        (Field::BoardModel, "PRIME B450M-A"),
        (Field::BiosBrand, "American Megatrends Inc."),
    ] {
        fallback = fallback.writes(field, value);
    }
    let probes = ProbeSet::new()
        .with(Canned::new(&log, ProbeId::Dmidecode).fails(ProbeError::permission_denied("dmidecode")))
        .with(fallback);
    let mut orch = Orchestrator::new(probes, 0);

    let report = orch.fill_labels();

    assert_eq!(report.error_count(), 1);
    assert_eq!(orch.labels().get(Field::BoardModel), Some("PRIME B450M-A"));
    assert_eq!(
        *log.lock().unwrap(),
        vec![ProbeId::Dmidecode, ProbeId::MotherboardFallback]
    );
}

#[test]
fn transient_failures_are_retried() {
    let log = calls();
    let probes = ProbeSet::new().with(
        Canned::new(&log, ProbeId::GpuTemperature)
            .fails(ProbeError::transient("gpu temperature", "sensor busy")),
    );
    let mut orch = Orchestrator::new(probes, 0);

    orch.refresh(Category::Graphics).unwrap();
    let report = orch.refresh(Category::Graphics).unwrap();

    assert_eq!(report.error_count(), 1);
    assert!(!orch.skip_cache().is_disabled(ProbeId::GpuTemperature));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn cache_refresh_before_full_pass_is_recoverable() {
    let log = calls();
    let mut cpuid = Canned::new(&log, ProbeId::CpuidStatic);
    cpuid.l1_size_kb = Some(32);
    let probes = ProbeSet::new()
        .with(cpuid)
        .with(CacheBandwidthProbe::with_budget(Duration::from_millis(1)));
    let mut orch = Orchestrator::new(probes, 0);

    let report = orch.refresh(Category::Caches).unwrap();
    assert_eq!(report.error_count(), 1);
    assert!(matches!(
        report.failures[0].error,
        Some(ProbeError::MissingPrerequisite { .. })
    ));
    assert!(!orch.skip_cache().is_disabled(ProbeId::CacheBandwidth));
    assert!(!orch.labels().is_set(Field::L1Speed));

    orch.fill_labels();
    let speed = orch.labels().get(Field::L1Speed).unwrap();
    assert!(speed.ends_with(" MB/s"), "{speed}");
}

#[cfg(target_os = "linux")]
#[test]
fn msr_survives_cpu_refresh_before_full_pass() {
    use hx_300::probes::msr::{
        msr_path, CpuMsrProbe, IA32_THERM_STATUS, MSR_TEMPERATURE_TARGET,
    };
    use std::os::unix::fs::FileExt;

    let dir = tempfile::tempdir().unwrap();
    let path = msr_path(dir.path(), 0);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = std::fs::File::create(&path).unwrap();
    file.write_all_at(&(100u64 << 16).to_le_bytes(), MSR_TEMPERATURE_TARGET)
        .unwrap();
    file.write_all_at(&((1u64 << 31) | (50 << 16)).to_le_bytes(), IA32_THERM_STATUS)
        .unwrap();

    let log = calls();
    let mut cpuid = Canned::new(&log, ProbeId::CpuidStatic);
    cpuid.vendor = Some(CpuVendor::Intel);
    let probes = ProbeSet::new()
        .with(cpuid)
        .with(CpuMsrProbe::with_dev_root(dir.path()));
    let mut orch = Orchestrator::new(probes, 0);

    let report = orch.refresh(Category::Cpu).unwrap();
    assert!(matches!(
        report.failures[0].error,
        Some(ProbeError::MissingPrerequisite { .. })
    ));
    assert!(!orch.skip_cache().is_disabled(ProbeId::CpuMsr));

    orch.fill_labels();
    assert_eq!(orch.labels().get(Field::Temperature), Some("50°C"));
    assert!(!orch.skip_cache().is_disabled(ProbeId::CpuMsr));
}

#[test]
fn unknown_category_names_are_errors() {
    let mut orch = Orchestrator::new(ProbeSet::new(), 0);
    assert!(orch.refresh_named("caches").is_ok());
    assert!(orch.refresh_named("motherboard").is_err());
    assert!(orch.refresh_named("sound").is_err());
}
