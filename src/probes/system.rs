//! Operating system identity and live memory/uptime figures.

use std::path::PathBuf;

use sysinfo::System;

use super::{command_output, read_trimmed, Probe, ProbeId, ProbeOutcome, ProbeResult};
use crate::error::ProbeError;
use crate::labels::Field;
use crate::state::ProbeState;

/// Kernel, hostname, distribution and compiler; read once per FULL pass
pub struct SystemStaticProbe;

impl Probe for SystemStaticProbe {
    fn id(&self) -> ProbeId {
        ProbeId::SystemStatic
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Identifying running system");
        let labels = &mut state.labels;
        let mut errors = 0;

        match uname() {
            Some((sysname, release)) => {
                labels.set(Field::Kernel, format!("{sysname} {release}"));
            }
            None => match System::kernel_version() {
                Some(release) => {
                    labels.set(Field::Kernel, format!("{} {release}", std::env::consts::OS));
                }
                None => errors += 1,
            },
        }

        match System::host_name() {
            Some(host) => {
                labels.set(Field::Hostname, host);
            }
            None => errors += 1,
        }

        let distribution = std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|text| pretty_name(&text))
            .or_else(System::long_os_version);
        match distribution {
            Some(name) => {
                labels.set(Field::Distribution, name);
            }
            None => errors += 1,
        }

        match command_output("compiler", "cc", &["--version"]) {
            Ok(out) => {
                if let Some(first) = out.lines().next() {
                    labels.set_trimmed(Field::Compiler, first);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "No C compiler found");
                errors += 1;
            }
        }

        if errors == 4 {
            return Err(ProbeError::unavailable("system static", "no system identity source"));
        }
        Ok(match errors {
            0 => ProbeOutcome::Complete,
            n => ProbeOutcome::Degraded(n),
        })
    }
}

#[cfg(unix)]
fn uname() -> Option<(String, String)> {
    use std::ffi::CStr;

    // SAFETY: utsname is plain old data; zeroed is a valid initial value
    let mut name: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: name is a valid, writable utsname
    if unsafe { libc::uname(&mut name) } != 0 {
        return None;
    }
    // SAFETY: uname NUL-terminates every field on success
    let field = |raw: &[libc::c_char]| {
        let value = unsafe { CStr::from_ptr(raw.as_ptr()) };
        value.to_string_lossy().into_owned()
    };
    Some((field(&name.sysname), field(&name.release)))
}

#[cfg(not(unix))]
fn uname() -> Option<(String, String)> {
    None
}

/// `PRETTY_NAME` from an os-release file
pub fn pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Memory figures in MB (10^6 bytes), the way the System tab prints them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub buffers: u64,
    pub cached: u64,
    pub free: u64,
    pub swap_used: u64,
    pub total: u64,
    pub swap_total: u64,
}

impl MemoryUsage {
    /// Parse `/proc/meminfo` (values in kB)
    pub fn from_meminfo(text: &str) -> Option<Self> {
        let value = |key: &str| -> Option<u64> {
            text.lines()
                .find_map(|line| line.strip_prefix(key)?.strip_prefix(':'))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|n| n.parse().ok())
        };

        let total = value("MemTotal")?;
        let free = value("MemFree")?;
        let buffers = value("Buffers").unwrap_or(0);
        let cached = value("Cached").unwrap_or(0) + value("SReclaimable").unwrap_or(0);
        let swap_total = value("SwapTotal").unwrap_or(0);
        let swap_free = value("SwapFree").unwrap_or(0);
        let used = total.saturating_sub(free + buffers + cached);

        Some(Self {
            used: used / 1000,
            buffers: buffers / 1000,
            cached: cached / 1000,
            free: free / 1000,
            swap_used: swap_total.saturating_sub(swap_free) / 1000,
            total: total / 1000,
            swap_total: swap_total / 1000,
        })
    }

    /// sysinfo figures; no buffers/cached split available
    pub fn from_sysinfo(sys: &System) -> Self {
        const MB: u64 = 1_000_000;
        Self {
            used: sys.used_memory() / MB,
            buffers: 0,
            cached: 0,
            free: sys.free_memory() / MB,
            swap_used: sys.used_swap() / MB,
            total: sys.total_memory() / MB,
            swap_total: sys.total_swap() / MB,
        }
    }
}

fn mem_line(value: u64, total: u64) -> String {
    format!("{value:>5} MB / {total:>5} MB")
}

/// "D days, H hours, M minutes, S seconds"
pub fn format_uptime(secs: u64) -> String {
    format!(
        "{} days, {} hours, {} minutes, {} seconds",
        secs / 86_400,
        secs % 86_400 / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

/// Memory usage and uptime, refreshed with the System tab
pub struct SystemDynamicProbe {
    meminfo_path: PathBuf,
    sys: System,
}

impl Default for SystemDynamicProbe {
    fn default() -> Self {
        Self::with_meminfo("/proc/meminfo")
    }
}

impl SystemDynamicProbe {
    pub fn with_meminfo(path: impl Into<PathBuf>) -> Self {
        Self {
            meminfo_path: path.into(),
            sys: System::new(),
        }
    }

    fn memory(&mut self) -> Result<MemoryUsage, ProbeError> {
        if let Some(usage) = std::fs::read_to_string(&self.meminfo_path)
            .ok()
            .and_then(|text| MemoryUsage::from_meminfo(&text))
        {
            return Ok(usage);
        }
        self.sys.refresh_memory();
        let usage = MemoryUsage::from_sysinfo(&self.sys);
        if usage.total == 0 {
            return Err(ProbeError::transient("system dynamic", "memory totals unreadable"));
        }
        Ok(usage)
    }
}

impl Probe for SystemDynamicProbe {
    fn id(&self) -> ProbeId {
        ProbeId::SystemDynamic
    }

    fn run(&mut self, state: &mut ProbeState) -> ProbeResult {
        tracing::debug!("Reading memory usage and uptime");
        let mem = self.memory()?;
        let labels = &mut state.labels;

        labels.set(Field::MemUsed, mem_line(mem.used, mem.total));
        labels.set(Field::MemBuffers, mem_line(mem.buffers, mem.total));
        labels.set(Field::MemCached, mem_line(mem.cached, mem.total));
        labels.set(Field::MemFree, mem_line(mem.free, mem.total));
        labels.set(Field::Swap, mem_line(mem.swap_used, mem.swap_total));

        let uptime = read_trimmed("/proc/uptime")
            .and_then(|s| s.split_whitespace().next()?.parse::<f64>().ok())
            .map(|s| s as u64)
            .unwrap_or_else(System::uptime);
        labels.set(Field::Uptime, format_uptime(uptime));

        Ok(ProbeOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         4000000 kB
MemAvailable:   10000000 kB
Buffers:          500000 kB
Cached:          3000000 kB
SReclaimable:     500000 kB
SwapTotal:       2000000 kB
SwapFree:        1500000 kB
";

    #[test]
    fn meminfo_breakdown() {
        let mem = MemoryUsage::from_meminfo(MEMINFO).unwrap();
        assert_eq!(mem.total, 16_000);
        assert_eq!(mem.free, 4_000);
        assert_eq!(mem.buffers, 500);
        assert_eq!(mem.cached, 3_500);
        assert_eq!(mem.used, 8_000);
        assert_eq!(mem.swap_used, 500);
    }

    #[test]
    fn incomplete_meminfo_is_rejected() {
        assert!(MemoryUsage::from_meminfo("Buffers: 10 kB\n").is_none());
    }

    #[test]
    fn uptime_breakdown() {
        assert_eq!(format_uptime(0), "0 days, 0 hours, 0 minutes, 0 seconds");
        assert_eq!(
            format_uptime(2 * 86_400 + 3 * 3600 + 4 * 60 + 5),
            "2 days, 3 hours, 4 minutes, 5 seconds"
        );
    }

    #[test]
    fn memory_lines_are_padded() {
        assert_eq!(mem_line(512, 16_000), "  512 MB / 16000 MB");
    }

    #[test]
    fn pretty_name_is_unquoted() {
        let text = "NAME=\"Debian\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n";
        assert_eq!(pretty_name(text).as_deref(), Some("Debian GNU/Linux 12 (bookworm)"));
        assert_eq!(pretty_name("NAME=x\n"), None);
    }

    #[test]
    fn dynamic_probe_fills_system_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, MEMINFO).unwrap();

        let mut probe = SystemDynamicProbe::with_meminfo(&path);
        let mut state = ProbeState::default();
        assert_eq!(probe.run(&mut state), Ok(ProbeOutcome::Complete));
        assert_eq!(state.labels.get(Field::MemUsed), Some(" 8000 MB / 16000 MB"));
        assert_eq!(state.labels.get(Field::Swap), Some("  500 MB /  2000 MB"));
        assert!(state.labels.is_set(Field::Uptime));
    }
}
