//! Skip-cache: never re-run a probe that has already failed for good.
//!
//! Privileged or optional sources (root-only tools, missing kernel modules,
//! absent devices) fail the same way every call. Once such a probe reports a
//! permanent failure its entry is disabled for the rest of the process and
//! later dispatches return the cached failure without invoking it.

use crate::error::ProbeError;
use crate::probes::{Probe, ProbeId, ProbeResult};
use crate::state::ProbeState;

/// Per-identity dispatch record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEntry {
    pub id: ProbeId,
    pub has_run: bool,
    pub disabled: bool,
}

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The probe was invoked
    Ran(ProbeResult),
    /// The probe is disabled and was not invoked
    Skipped,
}

impl Dispatch {
    pub fn error_count(&self) -> usize {
        match self {
            Self::Ran(Ok(outcome)) => outcome.error_count(),
            Self::Ran(Err(_)) | Self::Skipped => 1,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            Self::Ran(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// Registry of dispatch entries, owned by one orchestrator
#[derive(Debug, Clone)]
pub struct SkipCache {
    entries: Vec<DispatchEntry>,
}

impl Default for SkipCache {
    fn default() -> Self {
        Self {
            entries: Vec::with_capacity(Self::CAPACITY),
        }
    }
}

impl SkipCache {
    /// One entry per probe identity
    pub const CAPACITY: usize = ProbeId::COUNT;

    pub fn new() -> Self {
        Self::default()
    }

    /// Run `probe` unless its identity has been disabled.
    pub fn dispatch(&mut self, probe: &mut dyn Probe, state: &mut ProbeState) -> Dispatch {
        let id = probe.id();
        let slot = self.slot(id);

        if self.entries[slot].disabled {
            tracing::trace!(probe = id.name(), "Skipping disabled probe");
            return Dispatch::Skipped;
        }

        let result = probe.run(state);
        let entry = &mut self.entries[slot];
        entry.has_run = true;

        if let Err(ref err) = result {
            if err.is_permanent() {
                entry.disabled = true;
                tracing::debug!(probe = id.name(), error = %err, "Probe disabled for this session");
            }
        }

        Dispatch::Ran(result)
    }

    pub fn entry(&self, id: ProbeId) -> Option<&DispatchEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_disabled(&self, id: ProbeId) -> bool {
        self.entry(id).is_some_and(|e| e.disabled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry for `id`, created on first sight
    fn slot(&mut self, id: ProbeId) -> usize {
        if let Some(i) = self.entries.iter().position(|e| e.id == id) {
            return i;
        }

        assert!(
            self.entries.len() < Self::CAPACITY,
            "skip-cache capacity {} exceeded by {:?}",
            Self::CAPACITY,
            id
        );
        self.entries.push(DispatchEntry {
            id,
            has_run: false,
            disabled: false,
        });
        self.entries.len() - 1
    }
}
