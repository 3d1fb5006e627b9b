//! Acquisition pipeline: ordered primary probes, then fallbacks.
//!
//! A FULL pass runs once at startup; PARTIAL passes re-run the live probes of
//! one category on every UI tick. Probe failures are counted and reported,
//! never fatal: partial data is always preferable to no data.

use std::collections::HashSet;

use crate::dispatch::{Dispatch, SkipCache};
use crate::error::{AppError, ProbeError, Result};
use crate::labels::{Field, LabelTable};
use crate::probes::{ProbeId, ProbeSet};
use crate::state::ProbeState;
use crate::types::Category;

/// Primary probes of a FULL pass, in dependency order.
/// `true` routes the probe through the skip-cache.
const PRIMARY: [(ProbeId, bool); 7] = [
    (ProbeId::Dmidecode, false),
    (ProbeId::CpuidStatic, false),
    (ProbeId::CpuClock, true),
    (ProbeId::CpuMsr, true),
    (ProbeId::SystemDynamic, true),
    (ProbeId::CacheBandwidth, true),
    (ProbeId::PciDevices, false),
];

/// Probes that consume primary output
const POST_PROCESS: [(ProbeId, bool); 4] = [
    (ProbeId::CpuUsage, true),
    (ProbeId::SystemStatic, false),
    (ProbeId::GpuTemperature, true),
    (ProbeId::BenchmarkStatus, true),
];

/// Motherboard fields that must all be present to skip the fallback
const BOARD_FIELDS: [Field; 6] = [
    Field::Manufacturer,
    Field::BoardModel,
    Field::Revision,
    Field::BiosBrand,
    Field::BiosVersion,
    Field::BiosDate,
];

/// Placeholder package strings some firmware reports
const PACKAGE_PLACEHOLDERS: [&str; 2] = ["CPU", "Microprocessor"];

/// Memoized probes of a FULL pass; a PARTIAL pass re-runs those of its category
fn live_probes() -> impl Iterator<Item = ProbeId> {
    PRIMARY
        .into_iter()
        .chain(POST_PROCESS)
        .filter_map(|(id, memoized)| memoized.then_some(id))
}

/// A probe that did not complete during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub probe: ProbeId,
    /// None when the probe was skipped because it is disabled
    pub error: Option<ProbeError>,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            Some(err) => write!(f, "{}", err),
            None => write!(f, "{}: disabled after earlier failure", self.probe.name()),
        }
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    errors: usize,
    pub failures: Vec<ProbeFailure>,
}

impl PassReport {
    /// Running sum of probe error codes
    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    fn record(&mut self, id: ProbeId, dispatch: Dispatch) {
        self.errors += dispatch.error_count();
        match dispatch {
            Dispatch::Ran(Err(error)) => self.failures.push(ProbeFailure {
                probe: id,
                error: Some(error),
            }),
            Dispatch::Skipped => self.failures.push(ProbeFailure {
                probe: id,
                error: None,
            }),
            Dispatch::Ran(Ok(_)) => {}
        }
    }
}

/// Owns the result table, the skip-cache and the probes
pub struct Orchestrator {
    state: ProbeState,
    skip_cache: SkipCache,
    probes: ProbeSet,
    /// Live fields a dynamic fallback filled; it keeps them fresh afterwards
    fallback_owned: HashSet<Field>,
}

impl Orchestrator {
    pub fn new(probes: ProbeSet, selected_core: usize) -> Self {
        Self {
            state: ProbeState::new(selected_core),
            skip_cache: SkipCache::new(),
            probes,
            fallback_owned: HashSet::new(),
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.state.labels
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    pub fn skip_cache(&self) -> &SkipCache {
        &self.skip_cache
    }

    /// FULL pass: every primary probe, then static and dynamic fallbacks
    pub fn fill_labels(&mut self) -> PassReport {
        let mut report = PassReport::default();
        tracing::debug!("Starting full acquisition pass");

        for (id, memoized) in PRIMARY.into_iter().chain(POST_PROCESS) {
            self.invoke(id, memoized, &mut report);
        }

        self.fallback_static(&mut report);
        self.fallback_dynamic(&mut report);

        tracing::info!(
            errors = report.error_count(),
            fields = self.state.labels.count_set(),
            "Full acquisition pass complete"
        );
        report
    }

    /// PARTIAL pass for one category; writes elsewhere are dropped
    pub fn refresh(&mut self, category: Category) -> Result<PassReport> {
        if !category.is_refreshable() {
            return Err(AppError::unknown_category(category.label()));
        }
        let ids: Vec<ProbeId> = live_probes().filter(|id| id.category() == category).collect();

        let mut report = PassReport::default();
        self.state.labels.restrict_to(category);

        for id in ids {
            self.invoke(id, true, &mut report);
        }
        if category == Category::Cpu {
            self.fallback_dynamic(&mut report);
        }

        self.state.labels.clear_scope();
        tracing::trace!(%category, errors = report.error_count(), "Refresh pass complete");
        Ok(report)
    }

    /// Parse a category name and refresh it
    pub fn refresh_named(&mut self, name: &str) -> Result<PassReport> {
        let category: Category = name.parse()?;
        self.refresh(category)
    }

    fn invoke(&mut self, id: ProbeId, memoized: bool, report: &mut PassReport) {
        let Some(probe) = self.probes.get_mut(id) else {
            return;
        };

        let dispatch = if memoized {
            self.skip_cache.dispatch(probe, &mut self.state)
        } else {
            Dispatch::Ran(probe.run(&mut self.state))
        };

        if let Some(err) = dispatch.error() {
            if err.is_expected() {
                tracing::warn!(probe = id.name(), "{}", err);
            } else {
                tracing::error!(probe = id.name(), "{}", err);
            }
        }
        report.record(id, dispatch);
    }

    /// Fallbacks for static facts, invoked once when validation fails
    fn fallback_static(&mut self, report: &mut PassReport) {
        let labels = &self.state.labels;

        let package_invalid = match labels.get(Field::Package) {
            None => true,
            Some(package) => PACKAGE_PLACEHOLDERS.iter().any(|p| package.contains(p)),
        };
        let board_incomplete = BOARD_FIELDS.iter().any(|f| !labels.is_set(*f));

        if package_invalid {
            self.invoke(ProbeId::CpuPackageFallback, false, report);
        }
        if board_incomplete {
            self.invoke(ProbeId::MotherboardFallback, false, report);
        }
    }

    /// Regular-user fallbacks for live fields still unset
    fn fallback_dynamic(&mut self, report: &mut PassReport) {
        let checks = [
            (Field::Temperature, ProbeId::CpuTempFallback),
            (Field::Voltage, ProbeId::CpuVoltFallback),
            (Field::Multiplier, ProbeId::CpuMultiplierFallback),
        ];

        for (field, id) in checks {
            let unset = !self.state.labels.is_set(field);
            if unset || self.fallback_owned.contains(&field) {
                self.invoke(id, true, report);
                if unset && self.state.labels.is_set(field) {
                    self.fallback_owned.insert(field);
                }
            }
        }
    }
}
