use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use std::sync::Arc;
use tokio::time::interval;

use crate::bench::{BenchParams, BenchmarkEngine};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, PassReport};
use crate::probes::ProbeSet;
use crate::types::Category;
use crate::ui;

/// Main application state
pub struct App {
    pub config: Config,
    /// Tab shown and refreshed on every tick
    pub current_tab: Category,
    pub should_quit: bool,
    pub show_help: bool,
    /// Whether terminal is too small
    pub too_small: bool,
    pub orchestrator: Orchestrator,
    pub bench: Arc<BenchmarkEngine>,
    /// Report of the most recent pass
    pub last_report: PassReport,
    /// One-line feedback shown in the header (benchmark errors etc.)
    pub status_message: Option<String>,
    max_threads: usize,
}

impl App {
    pub fn new(config: Config) -> Self {
        let bench = Arc::new(BenchmarkEngine::new(config.bench));
        let probes = ProbeSet::platform(Arc::clone(&bench));
        Self::with_probes(config, probes, bench)
    }

    pub fn with_probes(config: Config, probes: ProbeSet, bench: Arc<BenchmarkEngine>) -> Self {
        let max_threads = std::thread::available_parallelism()
            .map_or(1, |n| n.get())
            .max(config.bench.threads);
        Self {
            orchestrator: Orchestrator::new(probes, config.selected_core),
            config,
            current_tab: Category::Cpu,
            should_quit: false,
            show_help: false,
            too_small: false,
            bench,
            last_report: PassReport::default(),
            status_message: None,
            max_threads,
        }
    }

    /// Run the main event loop
    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        // Initial full pass before the first frame
        self.last_report = self.orchestrator.fill_labels();

        let mut refresh_tick = interval(self.config.refresh_interval);
        let mut event_stream = crossterm::event::EventStream::new();

        loop {
            let size = terminal.size()?;
            self.too_small = !ui::fits(size);
            terminal.draw(|frame| ui::render(frame, self))?;

            if self.should_quit {
                return Ok(());
            }

            tokio::select! {
                _ = refresh_tick.tick() => {
                    self.refresh_current();
                }
                event = event_stream.next() => {
                    if let Some(Ok(evt)) = event {
                        self.handle_event(evt);
                    }
                }
            }
        }
    }

    /// Partial pass for the active tab; static tabs are left alone
    pub fn refresh_current(&mut self) {
        if !self.current_tab.is_refreshable() {
            return;
        }
        match self.orchestrator.refresh(self.current_tab) {
            Ok(report) => self.last_report = report,
            Err(e) => tracing::error!(error = %e, "Refresh failed"),
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return;
            }
            self.handle_key(key);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Ctrl+C always quits immediately
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        // Help overlay takes priority
        if self.show_help {
            match key.code {
                KeyCode::Char('?') | KeyCode::Esc => self.show_help = false,
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char(c @ '1'..='7') => {
                if let Some(tab) = Category::from_number(c as u8 - b'0') {
                    self.current_tab = tab;
                    self.refresh_current();
                }
            }
            KeyCode::Tab | KeyCode::Right => self.cycle_tab(1),
            KeyCode::BackTab | KeyCode::Left => self.cycle_tab(Category::ALL.len() - 1),
            KeyCode::Char('b') => self.start_benchmark(),
            KeyCode::Char('t') => self.update_params(|p| p.mode = p.mode.toggle()),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let max = self.max_threads;
                self.update_params(|p| p.threads = (p.threads + 1).min(max));
            }
            KeyCode::Char('-') => self.update_params(|p| p.threads = p.threads.saturating_sub(1).max(1)),
            _ => {}
        }
    }

    fn cycle_tab(&mut self, step: usize) {
        let count = Category::ALL.len();
        let index = (self.current_tab.number() as usize - 1 + step) % count;
        self.current_tab = Category::ALL[index];
        self.refresh_current();
    }

    fn start_benchmark(&mut self) {
        match self.bench.start_configured() {
            Ok(started) if started.spawn_errors > 0 => {
                self.status_message = Some(format!(
                    "Benchmark running on {} threads ({} failed to start)",
                    started.spawned, started.spawn_errors
                ));
            }
            Ok(started) => {
                self.status_message =
                    Some(format!("Benchmark running on {} threads", started.spawned));
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.refresh_bench();
    }

    /// Change benchmark parameters; ignored while a run is active
    fn update_params(&mut self, change: impl FnOnce(&mut BenchParams)) {
        if self.bench.status().running {
            self.status_message = Some("Benchmark parameters are locked while running".into());
            return;
        }
        let mut params = self.bench.params();
        change(&mut params);
        self.bench.configure(params);
        self.status_message = None;
        self.refresh_bench();
    }

    fn refresh_bench(&mut self) {
        if let Err(e) = self.orchestrator.refresh(Category::Bench) {
            tracing::error!(error = %e, "Benchmark status refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Field;
    use crate::probes::bench_status::BenchmarkStatusProbe;
    use crate::types::BenchMode;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn app() -> App {
        let config = Config::default();
        let bench = Arc::new(BenchmarkEngine::new(config.bench));
        let probes = ProbeSet::new().with(BenchmarkStatusProbe::new(Arc::clone(&bench)));
        App::with_probes(config, probes, bench)
    }

    #[test]
    fn number_keys_switch_tabs() {
        let mut app = app();
        app.handle_event(press(KeyCode::Char('7')));
        assert_eq!(app.current_tab, Category::Bench);
        app.handle_event(press(KeyCode::Char('9')));
        assert_eq!(app.current_tab, Category::Bench);
        app.handle_event(press(KeyCode::Right));
        assert_eq!(app.current_tab, Category::Cpu);
        app.handle_event(press(KeyCode::Left));
        assert_eq!(app.current_tab, Category::Bench);
    }

    #[test]
    fn help_overlay_swallows_keys() {
        let mut app = app();
        app.handle_event(press(KeyCode::Char('?')));
        assert!(app.show_help);
        app.handle_event(press(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.handle_event(press(KeyCode::Esc));
        assert!(!app.show_help);
        app.handle_event(press(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn benchmark_keys_update_params_and_fields() {
        let mut app = app();
        app.handle_event(press(KeyCode::Char('t')));
        app.handle_event(press(KeyCode::Char('-')));
        assert_eq!(app.bench.params().mode, BenchMode::Slow);
        assert_eq!(app.bench.params().threads, 1);
        assert_eq!(app.orchestrator.labels().get(Field::ParamThreads), Some("1"));
        assert_eq!(
            app.orchestrator.labels().get(Field::PrimeSlowScore),
            Some("Not started")
        );
    }

    #[test]
    fn static_tabs_are_not_refreshed() {
        let mut app = app();
        app.current_tab = Category::Memory;
        app.refresh_current();
        assert!(app.last_report.is_clean());
    }
}
