use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// HX-300 Hardware Inventory: processor, board, memory and GPU facts
#[derive(Parser, Debug)]
#[command(name = "hx300")]
#[command(author, version, about = "HX-300 Hardware Inventory")]
#[command(long_about = "HX-300 gathers processor, cache, motherboard, memory, system and \n\
    graphics information from kernel interfaces and optional tools, and shows \n\
    it in an interactive terminal view. It also runs a multithreaded \n\
    prime-number benchmark.\n\n\
    Some sources (dmidecode, CPU MSRs) need root; without it, unprivileged \n\
    fallbacks are used. Use --dump to print the table once and exit.")]
pub struct Cli {
    /// Core whose clock, temperature and voltage are reported
    #[arg(short, long, default_value_t = 0)]
    pub core: usize,

    /// Seconds between refreshes of the active tab
    #[arg(short, long, default_value_t = 1)]
    pub refresh: u64,

    /// Benchmark worker threads
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// Benchmark duration in minutes
    #[arg(short, long, default_value_t = 1)]
    pub duration: u64,

    /// Benchmark in slow mode (trial division up to the number itself)
    #[arg(long)]
    pub slow: bool,

    /// Run one full pass, print the table and exit
    #[arg(long)]
    pub dump: bool,

    /// Output format for --dump
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    pub format: DumpFormat,

    /// Log probe activity at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for the log file in interactive mode
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// How `--dump` prints the table
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    #[default]
    Text,
    Json,
}
