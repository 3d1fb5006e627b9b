use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;

/// The 7 field categories, one per UI tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Cpu = 1,
    Caches = 2,
    Motherboard = 3,
    Memory = 4,
    System = 5,
    Graphics = 6,
    Bench = 7,
}

impl Category {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Cpu),
            2 => Some(Self::Caches),
            3 => Some(Self::Motherboard),
            4 => Some(Self::Memory),
            5 => Some(Self::System),
            6 => Some(Self::Graphics),
            7 => Some(Self::Bench),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Caches => "Caches",
            Self::Motherboard => "Motherboard",
            Self::Memory => "Memory",
            Self::System => "System",
            Self::Graphics => "Graphics",
            Self::Bench => "Bench",
        }
    }

    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Categories that have a partial refresh pass
    pub fn is_refreshable(&self) -> bool {
        !matches!(self, Self::Motherboard | Self::Memory)
    }

    pub const ALL: [Category; 7] = [
        Self::Cpu,
        Self::Caches,
        Self::Motherboard,
        Self::Memory,
        Self::System,
        Self::Graphics,
        Self::Bench,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::unknown_category(s))
    }
}

/// Primality test used by the benchmark workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BenchMode {
    /// Trial division up to the square root
    #[default]
    Fast,
    /// Trial division up to the candidate itself
    Slow,
}

impl BenchMode {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Fast => Self::Slow,
            Self::Slow => Self::Fast,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fast => "Fast",
            Self::Slow => "Slow",
        }
    }
}
