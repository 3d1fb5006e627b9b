use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use hx_300::app::App;
use hx_300::bench::BenchmarkEngine;
use hx_300::cli::{Cli, DumpFormat};
use hx_300::config::Config;
use hx_300::error::{AppError, Result};
use hx_300::export::TableExport;
use hx_300::logging::{init_logging, LogTarget};
use hx_300::orchestrator::Orchestrator;
use hx_300::probes::ProbeSet;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    if let Some(format) = config.dump {
        return dump(&config, format);
    }
    if !std::io::stdout().is_terminal() {
        return Err(AppError::display("stdout is not a terminal; use --dump for plain output"));
    }

    let guard = init_logging(&LogTarget::File(config.log_dir.clone()), config.verbose)?;
    tracing::info!(log = ?guard.path, version = env!("CARGO_PKG_VERSION"), "Starting hx300");

    // Install panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    // Run the app
    let mut terminal = ratatui::init();
    let mut app = App::new(config);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    ratatui::restore();

    if let Err(e) = &result {
        tracing::error!(error = %e, "Exited with error");
    }
    result
}

/// One full pass, printed to stdout
fn dump(config: &Config, format: DumpFormat) -> Result<()> {
    let _guard = init_logging(&LogTarget::Stderr, config.verbose)?;

    let bench = Arc::new(BenchmarkEngine::new(config.bench));
    let mut orchestrator = Orchestrator::new(ProbeSet::platform(bench), config.selected_core);
    let report = orchestrator.fill_labels();

    let export = TableExport::new(orchestrator.labels(), &report);
    match format {
        DumpFormat::Text => print!("{}", export.to_text()),
        DumpFormat::Json => println!("{}", export.to_json()?),
    }
    Ok(())
}
