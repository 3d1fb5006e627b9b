//! Runtime configuration, validated from the command line.

use std::path::PathBuf;
use std::time::Duration;

use crate::bench::BenchParams;
use crate::cli::{Cli, DumpFormat};
use crate::error::{AppError, Result};
use crate::types::BenchMode;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub selected_core: usize,
    pub refresh_interval: Duration,
    pub bench: BenchParams,
    pub log_dir: PathBuf,
    pub verbose: bool,
    /// Some when the table is printed once instead of running the UI
    pub dump: Option<DumpFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selected_core: 0,
            refresh_interval: Duration::from_secs(1),
            bench: BenchParams::default(),
            log_dir: default_log_dir(),
            verbose: false,
            dump: None,
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Self {
            selected_core: cli.core,
            refresh_interval: Duration::from_secs(cli.refresh),
            bench: BenchParams {
                threads: cli.threads,
                duration_minutes: cli.duration,
                mode: if cli.slow { BenchMode::Slow } else { BenchMode::Fast },
            },
            log_dir: cli.log_dir.clone().unwrap_or_else(default_log_dir),
            verbose: cli.verbose,
            dump: cli.dump.then_some(cli.format),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bench.threads == 0 {
            return Err(AppError::config("benchmark needs at least 1 thread"));
        }
        if self.refresh_interval < Duration::from_secs(1) {
            return Err(AppError::config("refresh interval must be at least 1 second"));
        }
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        if self.selected_core >= cores {
            return Err(AppError::config(format!(
                "core {} does not exist ({} available)",
                self.selected_core, cores
            )));
        }
        Ok(())
    }
}

pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("hx300")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Config> {
        let cli = Cli::try_parse_from(std::iter::once("hx300").chain(args.iter().copied()))
            .expect("arguments parse");
        Config::from_cli(&cli)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.selected_core, 0);
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
        assert_eq!(config.bench, BenchParams::default());
        assert_eq!(config.dump, None);
    }

    #[test]
    fn benchmark_and_dump_flags() {
        let config = parse(&["--threads", "1", "--duration", "5", "--slow", "--dump", "--format", "json"])
            .unwrap();
        assert_eq!(config.bench.duration_minutes, 5);
        assert_eq!(config.bench.mode, BenchMode::Slow);
        assert_eq!(config.dump, Some(DumpFormat::Json));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(parse(&["--threads", "0"]), Err(AppError::Config { .. })));
        assert!(matches!(parse(&["--refresh", "0"]), Err(AppError::Config { .. })));
        assert!(matches!(parse(&["--core", "100000"]), Err(AppError::Config { .. })));
    }
}
