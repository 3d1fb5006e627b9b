//! SMBIOS tables through the `dmidecode` tool (root only).

use super::{command_output, is_root, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

const SOURCE: &str = "dmidecode";

/// One `Handle` record: its title line and `Key: Value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmiRecord {
    pub title: String,
    pub values: Vec<(String, String)>,
}

impl DmiRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !is_placeholder(v))
    }
}

/// Values vendors leave in unpopulated SMBIOS strings
fn is_placeholder(value: &str) -> bool {
    matches!(
        value,
        "" | "Not Specified" | "Unknown" | "To Be Filled By O.E.M." | "Default string"
    )
}

pub struct DmidecodeProbe;

impl DmidecodeProbe {
    fn query(types: &str) -> Result<Vec<DmiRecord>, ProbeError> {
        let text = command_output(SOURCE, "dmidecode", &["-t", types])?;
        Ok(parse_records(&text))
    }
}

impl Probe for DmidecodeProbe {
    fn id(&self) -> ProbeId {
        ProbeId::Dmidecode
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        if !is_root() {
            return Err(ProbeError::permission_denied(SOURCE));
        }

        tracing::debug!("Calling dmidecode");
        let processor = Self::query("4")?;
        let mut errors = 0;

        errors += usize::from(!fill_processor(state, &processor));
        errors += match Self::query("0,2") {
            Ok(records) => usize::from(!fill_motherboard(state, &records)),
            Err(e) => {
                tracing::warn!(error = %e, "dmidecode motherboard query failed");
                1
            }
        };
        errors += match Self::query("17") {
            Ok(records) => usize::from(fill_memory(state, &records) == 0),
            Err(e) => {
                tracing::warn!(error = %e, "dmidecode memory query failed");
                1
            }
        };

        Ok(match errors {
            0 => ProbeOutcome::Complete,
            n => ProbeOutcome::Degraded(n),
        })
    }
}

/// Split `dmidecode` output into records
pub fn parse_records(text: &str) -> Vec<DmiRecord> {
    let mut records = Vec::new();
    let mut current: Option<DmiRecord> = None;
    let mut expect_title = false;

    for line in text.lines() {
        if line.starts_with("Handle ") {
            records.extend(current.take());
            current = Some(DmiRecord::default());
            expect_title = true;
            continue;
        }
        let Some(record) = current.as_mut() else {
            continue;
        };
        if expect_title {
            record.title = line.trim().to_string();
            expect_title = false;
            continue;
        }
        // Values are indented by one tab; list items by two
        if let Some(entry) = line.strip_prefix('\t') {
            if entry.starts_with('\t') {
                continue;
            }
            if let Some((key, value)) = entry.split_once(':') {
                record
                    .values
                    .push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }
    records.extend(current);
    records
}

fn find<'a>(records: &'a [DmiRecord], title: &str) -> Option<&'a DmiRecord> {
    records.iter().find(|r| r.title == title)
}

/// Package and bus clock; false when no processor record was found
pub fn fill_processor(state: &mut ProbeState, records: &[DmiRecord]) -> bool {
    let Some(cpu) = find(records, "Processor Information") else {
        return false;
    };

    if let Some(socket) = cpu.get("Upgrade") {
        state.labels.set(Field::Package, socket.trim_start_matches("Socket "));
    }
    if let Some(clock) = cpu.get("External Clock") {
        let mhz: f64 = clock
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0.0);
        if mhz > 0.0 {
            state.facts.bus_freq_mhz = mhz;
            state.labels.set(Field::BusSpeed, format!("{mhz:.2} MHz"));
        }
    }
    true
}

/// Board and BIOS identity; false when neither record was found
pub fn fill_motherboard(state: &mut ProbeState, records: &[DmiRecord]) -> bool {
    let board = find(records, "Base Board Information");
    let bios = find(records, "BIOS Information");

    let pairs = [
        (board, "Manufacturer", Field::Manufacturer),
        (board, "Product Name", Field::BoardModel),
        (board, "Version", Field::Revision),
        (bios, "Vendor", Field::BiosBrand),
        (bios, "Version", Field::BiosVersion),
        (bios, "Release Date", Field::BiosDate),
    ];
    for (record, key, field) in pairs {
        if let Some(value) = record.and_then(|r| r.get(key)) {
            state.labels.set(field, value);
        }
    }
    board.is_some() || bios.is_some()
}

/// One bank line per populated DIMM; returns the number of DIMMs
pub fn fill_memory(state: &mut ProbeState, records: &[DmiRecord]) -> usize {
    let dimms = records
        .iter()
        .filter(|r| r.title == "Memory Device")
        .filter(|r| r.get("Size").is_some_and(|s| !s.starts_with("No Module")));

    let mut count = 0;
    for (dimm, field) in dimms.zip(Field::BANKS) {
        state.labels.set(field, describe_dimm(dimm));
        count += 1;
    }
    state.facts.dimm_count = count;
    count
}

/// "Kingston 99U5471 8 GB DDR3 @ 1600 MT/s (DIMM_A1)"
fn describe_dimm(dimm: &DmiRecord) -> String {
    let mut parts: Vec<&str> = ["Manufacturer", "Part Number", "Size", "Type"]
        .iter()
        .filter_map(|key| dimm.get(key))
        .collect();
    let speed = dimm.get("Configured Memory Speed").or_else(|| dimm.get("Speed"));
    if let Some(speed) = speed {
        parts.push("@");
        parts.push(speed);
    }
    let mut line = parts.join(" ");
    if let Some(locator) = dimm.get("Locator") {
        line.push_str(&format!(" ({locator})"));
    }
    line
}
