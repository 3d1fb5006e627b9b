//! Static CPU identification: vendor, signature, features and caches.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sysinfo::System;

use super::{dec_hex, read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::{CpuVendor, ProbeState};

const SOURCE: &str = "cpuid";

/// Vendor strings and their display names
const VENDORS: [(&str, &str, CpuVendor); 10] = [
    ("GenuineIntel", "Intel", CpuVendor::Intel),
    ("AuthenticAMD", "AMD", CpuVendor::Amd),
    ("CyrixInstead", "Cyrix", CpuVendor::Other),
    ("NexGenDriven", "NexGen", CpuVendor::Other),
    ("GenuineTMx86", "Transmeta", CpuVendor::Other),
    ("UMC UMC UMC ", "UMC", CpuVendor::Other),
    ("CentaurHauls", "Centaur", CpuVendor::Other),
    ("RiseRiseRise", "Rise", CpuVendor::Other),
    ("SiS SiS SiS ", "SiS", CpuVendor::Other),
    ("Geode by NSC", "National Semiconductor", CpuVendor::Other),
];

/// (vendor, displayed family, full model) -> (codename, process in nm)
const CODENAMES: &[(CpuVendor, u32, u32, &str, u32)] = &[
    (CpuVendor::Intel, 15, 0x04, "Pentium D (SmithField)", 90),
    (CpuVendor::Intel, 15, 0x06, "Pentium D (Presler)", 65),
    (CpuVendor::Intel, 6, 0x0F, "Core 2 (Conroe)", 65),
    (CpuVendor::Intel, 6, 0x17, "Core 2 (Wolfdale)", 45),
    (CpuVendor::Intel, 6, 0x1C, "Atom (Diamondville)", 45),
    (CpuVendor::Intel, 6, 0x1A, "Nehalem", 45),
    (CpuVendor::Intel, 6, 0x1E, "Nehalem", 45),
    (CpuVendor::Intel, 6, 0x25, "Westmere", 32),
    (CpuVendor::Intel, 6, 0x2C, "Westmere", 32),
    (CpuVendor::Intel, 6, 0x2A, "Sandy Bridge", 32),
    (CpuVendor::Intel, 6, 0x2D, "Sandy Bridge-E", 32),
    (CpuVendor::Intel, 6, 0x3A, "Ivy Bridge", 22),
    (CpuVendor::Intel, 6, 0x3E, "Ivy Bridge-E", 22),
    (CpuVendor::Intel, 6, 0x3C, "Haswell", 22),
    (CpuVendor::Intel, 6, 0x45, "Haswell", 22),
    (CpuVendor::Intel, 6, 0x46, "Haswell", 22),
    (CpuVendor::Intel, 6, 0x3F, "Haswell-E", 22),
    (CpuVendor::Intel, 6, 0x3D, "Broadwell", 14),
    (CpuVendor::Intel, 6, 0x47, "Broadwell", 14),
    (CpuVendor::Intel, 6, 0x4E, "Skylake", 14),
    (CpuVendor::Intel, 6, 0x5E, "Skylake", 14),
    (CpuVendor::Intel, 6, 0x8E, "Kaby Lake", 14),
    (CpuVendor::Intel, 6, 0x9E, "Coffee Lake", 14),
    (CpuVendor::Intel, 6, 0xA5, "Comet Lake", 14),
    (CpuVendor::Intel, 6, 0x7E, "Ice Lake", 10),
    (CpuVendor::Intel, 6, 0x8C, "Tiger Lake", 10),
    (CpuVendor::Intel, 6, 0x97, "Alder Lake", 10),
    (CpuVendor::Intel, 6, 0x9A, "Alder Lake", 10),
    (CpuVendor::Intel, 6, 0xB7, "Raptor Lake", 10),
    (CpuVendor::Intel, 6, 0xBA, "Raptor Lake", 10),
    (CpuVendor::Amd, 0x15, 0x02, "Vishera", 32),
    (CpuVendor::Amd, 0x15, 0x13, "Richland", 32),
    (CpuVendor::Amd, 0x15, 0x30, "Kaveri", 28),
    (CpuVendor::Amd, 0x15, 0x60, "Carrizo", 28),
    (CpuVendor::Amd, 0x17, 0x01, "Summit Ridge", 14),
    (CpuVendor::Amd, 0x17, 0x08, "Pinnacle Ridge", 12),
    (CpuVendor::Amd, 0x17, 0x11, "Raven Ridge", 14),
    (CpuVendor::Amd, 0x17, 0x71, "Matisse", 7),
    (CpuVendor::Amd, 0x19, 0x21, "Vermeer", 7),
    (CpuVendor::Amd, 0x19, 0x50, "Cezanne", 7),
    (CpuVendor::Amd, 0x19, 0x61, "Raphael", 5),
    (CpuVendor::Amd, 0x1A, 0x44, "Granite Ridge", 4),
];

/// Feature flags in display order, with the text each one appends
const INSTRUCTIONS: [(&str, &str); 15] = [
    ("mmx", "MMX"),
    ("mmxext", "(+)"),
    ("3dnow", ", 3DNOW!"),
    ("3dnowext", "(+)"),
    ("sse", ", SSE (1"),
    ("sse2", ", 2"),
    ("ssse3", ", 3S"),
    ("sse4_1", ", 4.1"),
    ("sse4_2", ", 4.2"),
    ("sse4a", ", 4A"),
    ("sse", ")"),
    ("aes", ", AES"),
    ("avx", ", AVX"),
    ("vmx", ", VT-x"),
    ("svm", ", AMD-V"),
];

/// Identification data from the first processor entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuIdentity {
    pub vendor_str: String,
    pub brand: String,
    pub family: u32,
    pub model: u32,
    pub stepping: Option<u32>,
    pub flags: HashSet<String>,
    pub cores: usize,
    pub threads: usize,
    pub logical_total: usize,
    pub packages: usize,
}

impl CpuIdentity {
    /// Base family as encoded in the signature
    pub fn base_family(&self) -> u32 {
        self.family.min(0xF)
    }

    /// Low nibble of the model number
    pub fn base_model(&self) -> u32 {
        self.model & 0xF
    }

    fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// One cache as described by sysfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub level: u8,
    /// "Data", "Instruction" or "Unified"
    pub kind: String,
    pub size_kb: u32,
    pub ways: u32,
    pub line_size: u32,
}

pub struct CpuidStaticProbe {
    cpuinfo_path: PathBuf,
    cache_dir: PathBuf,
}

impl Default for CpuidStaticProbe {
    fn default() -> Self {
        Self::with_paths("/proc/cpuinfo", "/sys/devices/system/cpu/cpu0/cache")
    }
}

impl CpuidStaticProbe {
    pub fn with_paths(cpuinfo: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cpuinfo_path: cpuinfo.into(),
            cache_dir: cache_dir.into(),
        }
    }

    fn identify(&self) -> Result<CpuIdentity, ProbeError> {
        if let Ok(text) = std::fs::read_to_string(&self.cpuinfo_path) {
            if let Some(id) = parse_cpuinfo(&text) {
                return Ok(id);
            }
        }

        // No procfs: identify through sysinfo
        let mut sys = System::new();
        sys.refresh_cpu_all();
        let cpu = sys
            .cpus()
            .first()
            .ok_or_else(|| ProbeError::unavailable(SOURCE, "no processor reported"))?;
        Ok(CpuIdentity {
            vendor_str: cpu.vendor_id().to_string(),
            brand: cpu.brand().to_string(),
            cores: sys.physical_core_count().unwrap_or(0),
            threads: sys.cpus().len(),
            logical_total: sys.cpus().len(),
            packages: 1,
            ..CpuIdentity::default()
        })
    }
}

impl Probe for CpuidStaticProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CpuidStatic
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Identifying CPU");
        let cpu = self.identify()?;
        let labels = &mut state.labels;
        let facts = &mut state.facts;

        let (vendor_name, vendor) = improve_vendor(&cpu.vendor_str);
        labels.set(Field::Vendor, vendor_name);
        labels.set(Field::Specification, collapse_spaces(&cpu.brand));
        facts.cpu_vendor = vendor;
        facts.cpu_count = cpu.logical_total.max(cpu.threads);

        if cpu.family > 0 {
            facts.cpu_family = Some(cpu.base_family());
            facts.cpu_ext_family = Some(cpu.family);
            facts.cpu_model = Some(cpu.base_model());
            facts.cpu_ext_model = Some(cpu.model);
            labels.set(Field::Family, dec_hex(cpu.base_family()));
            labels.set(Field::ExtFamily, dec_hex(cpu.family));
            labels.set(Field::Model, dec_hex(cpu.base_model()));
            labels.set(Field::ExtModel, dec_hex(cpu.model));

            match lookup_codename(vendor, cpu.family, cpu.model) {
                Some((codename, process)) => {
                    labels.set(Field::Codename, codename);
                    labels.set(Field::Technology, format!("{} nm", process));
                }
                None => tracing::warn!(
                    brand = %cpu.brand,
                    family = cpu.family,
                    model = cpu.model,
                    "CPU not in codename table"
                ),
            }
        }
        if let Some(stepping) = cpu.stepping {
            labels.set(Field::Stepping, dec_hex(stepping));
        }
        if cpu.cores > 0 {
            labels.set(Field::Cores, cpu.cores.to_string());
        }
        if cpu.threads > 0 {
            labels.set(Field::Threads, cpu.threads.to_string());
        }
        if cpu.packages > 0 {
            labels.set(Field::Sockets, cpu.packages.to_string());
        }
        let instructions = instruction_summary(&cpu, vendor);
        if !instructions.is_empty() {
            labels.set(Field::Instructions, instructions);
        }

        let caches = read_caches(&self.cache_dir);
        fill_caches(state, &caches, cpu.cores.max(1));

        if caches.is_empty() {
            Ok(ProbeOutcome::Degraded(1))
        } else {
            Ok(ProbeOutcome::Complete)
        }
    }
}

/// Parse the first processor block of `/proc/cpuinfo`
pub fn parse_cpuinfo(text: &str) -> Option<CpuIdentity> {
    let mut id = CpuIdentity::default();
    let mut physical_ids = HashSet::new();
    let mut processors = 0usize;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "processor" => processors += 1,
            "physical id" => {
                physical_ids.insert(value.to_string());
            }
            _ if processors > 1 => {}
            "vendor_id" => id.vendor_str = value.to_string(),
            "model name" => id.brand = value.to_string(),
            "cpu family" => id.family = value.parse().unwrap_or(0),
            "model" => id.model = value.parse().unwrap_or(0),
            "stepping" => id.stepping = value.parse().ok(),
            "cpu cores" => id.cores = value.parse().unwrap_or(0),
            "siblings" => id.threads = value.parse().unwrap_or(0),
            "flags" => id.flags = value.split_whitespace().map(str::to_string).collect(),
            _ => {}
        }
    }

    if processors == 0 || id.vendor_str.is_empty() {
        return None;
    }

    id.logical_total = processors;
    id.packages = physical_ids.len().max(1);
    if id.threads == 0 {
        id.threads = processors / id.packages;
    }
    if id.cores == 0 {
        id.cores = id.threads;
    }
    Some(id)
}

/// Display name and vendor class for a CPUID vendor string
pub fn improve_vendor(vendor_str: &str) -> (String, CpuVendor) {
    VENDORS
        .iter()
        .find(|(standard, _, _)| *standard == vendor_str)
        .map(|(_, improved, id)| (improved.to_string(), *id))
        .unwrap_or_else(|| (vendor_str.to_string(), CpuVendor::Unknown))
}

pub fn lookup_codename(vendor: CpuVendor, family: u32, model: u32) -> Option<(&'static str, u32)> {
    CODENAMES
        .iter()
        .find(|(v, f, m, _, _)| *v == vendor && *f == family && *m == model)
        .map(|(_, _, _, codename, process)| (*codename, *process))
}

/// Collapse runs of whitespace in the brand string
pub fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "MMX(+), SSE (1, 2, 3S, 4.1, 4.2), AES, AVX, VT-x, HT, Intel 64"
pub fn instruction_summary(cpu: &CpuIdentity, vendor: CpuVendor) -> String {
    let mut out = String::new();
    for (flag, text) in INSTRUCTIONS {
        if cpu.has(flag) {
            out.push_str(text);
        }
    }

    if cpu.cores > 0 && cpu.cores < cpu.threads {
        out.push_str(", HT");
    }
    if cpu.has("lm") {
        out.push_str(match vendor {
            CpuVendor::Intel => ", Intel 64",
            CpuVendor::Amd => ", AMD64",
            _ => ", 64-bit",
        });
    }

    out.trim_start_matches(", ").to_string()
}

/// Read `index*` cache descriptions from a sysfs cache directory
pub fn read_caches(dir: &Path) -> Vec<CacheInfo> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut caches: Vec<CacheInfo> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("index"))
        .filter_map(|e| {
            let path = e.path();
            let level = read_trimmed(path.join("level"))?.parse().ok()?;
            let size = read_trimmed(path.join("size"))?;
            Some(CacheInfo {
                level,
                kind: read_trimmed(path.join("type")).unwrap_or_else(|| "Unified".into()),
                size_kb: parse_size_kb(&size)?,
                ways: read_trimmed(path.join("ways_of_associativity"))
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                line_size: read_trimmed(path.join("coherency_line_size"))
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            })
        })
        .collect();

    caches.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.kind.cmp(&b.kind)));
    caches
}

/// "32K" / "1024K" / "8M" -> KiB
fn parse_size_kb(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(n) = s.strip_suffix('K') {
        n.parse().ok()
    } else if let Some(n) = s.strip_suffix('M') {
        n.parse::<u32>().ok().map(|m| m * 1024)
    } else {
        s.parse::<u32>().ok().map(|b| b / 1024)
    }
}

fn descriptor(cache: &CacheInfo) -> String {
    format!(
        "{:>2}-way set associative, {:>2}-byte line size",
        cache.ways, cache.line_size
    )
}

fn fill_caches(state: &mut ProbeState, caches: &[CacheInfo], cores: usize) {
    let labels = &mut state.labels;
    let facts = &mut state.facts;

    for cache in caches {
        let per_core = format!("{} x {:>4} KB, {:>2}-way", cores, cache.size_kb, cache.ways);
        match (cache.level, cache.kind.as_str()) {
            (1, "Data") => {
                labels.set(Field::Level1D, per_core);
            }
            (1, "Instruction") => {
                facts.l1_size_kb = cache.size_kb;
                labels.set(Field::Level1I, per_core.clone());
                labels.set(Field::L1Size, per_core);
                labels.set(Field::L1Descriptor, descriptor(cache));
            }
            (2, _) => {
                facts.l2_size_kb = cache.size_kb;
                labels.set(Field::Level2, per_core.clone());
                labels.set(Field::L2Size, per_core);
                labels.set(Field::L2Descriptor, descriptor(cache));
            }
            (3, _) => {
                facts.l3_size_kb = cache.size_kb;
                let shared = format!("{:>9} KB, {:>2}-way", cache.size_kb, cache.ways);
                labels.set(Field::Level3, shared.clone());
                labels.set(Field::L3Size, shared);
                labels.set(Field::L3Descriptor, descriptor(cache));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CPUINFO: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 158
model name\t: Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
stepping\t: 10
physical id\t: 0
siblings\t: 12
cpu cores\t: 6
flags\t\t: fpu vme mmx sse sse2 ssse3 sse4_1 sse4_2 aes avx vmx lm

processor\t: 1
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 158
model name\t: ignored
physical id\t: 0
";

    #[test]
    fn parses_first_processor_block() {
        let cpu = parse_cpuinfo(CPUINFO).unwrap();
        assert_eq!(cpu.vendor_str, "GenuineIntel");
        assert_eq!(cpu.brand, "Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz");
        assert_eq!(cpu.family, 6);
        assert_eq!(cpu.model, 158);
        assert_eq!(cpu.base_model(), 14);
        assert_eq!(cpu.stepping, Some(10));
        assert_eq!((cpu.cores, cpu.threads), (6, 12));
        assert_eq!(cpu.logical_total, 2);
        assert_eq!(cpu.packages, 1);
    }

    #[test]
    fn empty_cpuinfo_is_rejected() {
        assert!(parse_cpuinfo("").is_none());
    }

    #[test]
    fn summarises_instruction_sets() {
        let cpu = parse_cpuinfo(CPUINFO).unwrap();
        assert_eq!(
            instruction_summary(&cpu, CpuVendor::Intel),
            "MMX, SSE (1, 2, 3S, 4.1, 4.2), AES, AVX, VT-x, HT, Intel 64"
        );
    }

    #[test]
    fn improves_known_vendors_only() {
        assert_eq!(improve_vendor("AuthenticAMD"), ("AMD".into(), CpuVendor::Amd));
        assert_eq!(
            improve_vendor("HygonGenuine"),
            ("HygonGenuine".into(), CpuVendor::Unknown)
        );
    }

    #[test]
    fn codename_lookup() {
        assert_eq!(lookup_codename(CpuVendor::Intel, 6, 0x9E), Some(("Coffee Lake", 14)));
        assert_eq!(lookup_codename(CpuVendor::Amd, 6, 0x9E), None);
    }

    #[test]
    fn reads_sysfs_caches() {
        let dir = tempfile::tempdir().unwrap();
        let write_index = |name: &str, level: &str, kind: &str, size: &str, ways: &str| {
            let idx = dir.path().join(name);
            fs::create_dir_all(&idx).unwrap();
            fs::write(idx.join("level"), level).unwrap();
            fs::write(idx.join("type"), kind).unwrap();
            fs::write(idx.join("size"), size).unwrap();
            fs::write(idx.join("ways_of_associativity"), ways).unwrap();
            fs::write(idx.join("coherency_line_size"), "64\n").unwrap();
        };
        write_index("index0", "1\n", "Data\n", "32K\n", "8\n");
        write_index("index1", "1\n", "Instruction\n", "32K\n", "8\n");
        write_index("index2", "2\n", "Unified\n", "256K\n", "4\n");
        write_index("index3", "3\n", "Unified\n", "12M\n", "16\n");

        let cpuinfo = dir.path().join("cpuinfo");
        fs::write(&cpuinfo, CPUINFO).unwrap();
        let mut probe = CpuidStaticProbe::with_paths(&cpuinfo, dir.path());
        let mut state = ProbeState::default();

        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
        assert_eq!(state.facts.l1_size_kb, 32);
        assert_eq!(state.facts.l3_size_kb, 12 * 1024);
        assert_eq!(state.labels.get(Field::Level1D), Some("6 x   32 KB,  8-way"));
        assert_eq!(
            state.labels.get(Field::L2Descriptor),
            Some(" 4-way set associative, 64-byte line size")
        );
        assert_eq!(state.labels.get(Field::Codename), Some("Coffee Lake"));
        assert_eq!(state.labels.get(Field::Technology), Some("14 nm"));
        assert_eq!(state.labels.get(Field::ExtModel), Some("158 (9E)"));
        assert_eq!(state.labels.get(Field::Vendor), Some("Intel"));
    }
}
