pub mod app;
pub mod bench;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod labels;
pub mod logging;
pub mod orchestrator;
pub mod probes;
pub mod state;
pub mod types;
pub mod ui;
