pub mod app;
pub mod ui;
pub mod widgets;

use crate::calibration::BaselineSummary;
use crate::config::Config;
use crate::detector::Assessment;
use crate::ignore::IgnoreList;
use crate::monitor::{AlertSink, Monitor, Pacing, RunSummary};
use crate::registry::EmitterRegistry;
use crate::scan::{ScanError, ScanProvider};
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, LevelFilter};
use ratatui::prelude::*;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use app::{App, BaselineRow, EventEntry, EventKind};

/// Events sent from the monitor loop to the TUI
#[derive(Debug, Clone)]
pub enum TuiEvent {
    CalibrationProgress {
        emitters: usize,
        observations: usize,
        remaining: Duration,
    },
    Calibrated {
        summary: BaselineSummary,
        baselines: Vec<BaselineRow>,
    },
    Assessed(Assessment),
    ScanFailed(String),
    MonitorStopped(RunSummary),
}

/// Forwards engine results to the UI as owned copies
pub struct ChannelSink {
    tx: mpsc::Sender<TuiEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TuiEvent>) -> Self {
        ChannelSink { tx }
    }

    // Runs on the blocking monitor thread; a closed channel means the UI is gone
    fn send(&self, event: TuiEvent) {
        if let Err(e) = self.tx.blocking_send(event) {
            debug!("Dashboard closed, dropping event: {}", e);
        }
    }
}

impl AlertSink for ChannelSink {
    fn calibration_progress(&mut self, emitters: usize, observations: usize, remaining: Duration) {
        self.send(TuiEvent::CalibrationProgress {
            emitters,
            observations,
            remaining,
        });
    }

    fn calibration_finished(&mut self, summary: &BaselineSummary, registry: &EmitterRegistry) {
        self.send(TuiEvent::Calibrated {
            summary: summary.clone(),
            baselines: registry.iter().map(BaselineRow::from).collect(),
        });
    }

    fn assessment(&mut self, assessment: &Assessment) {
        self.send(TuiEvent::Assessed(assessment.clone()));
    }

    fn scan_failed(&mut self, error: &ScanError) {
        self.send(TuiEvent::ScanFailed(error.to_string()));
    }
}

/// Setup terminal for TUI mode
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the dashboard with the monitor loop on a blocking task
pub async fn run_tui<P>(
    config: Config,
    scanner: P,
    ignore: IgnoreList,
    pacing: Pacing,
    source: String,
    running: Arc<AtomicBool>,
) -> Result<()>
where
    P: ScanProvider + Send + 'static,
{
    // Disable logging to prevent interference with TUI display
    log::set_max_level(LevelFilter::Off);

    let (event_tx, event_rx) = mpsc::channel::<TuiEvent>(1000);

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let settings = config.engine_settings();
    let mut app = App::new(
        event_rx,
        source,
        settings.calibration_window,
        settings.scoring.threshold,
        config.display.max_bars,
    );

    // The loop blocks on scans and sleeps, so it gets its own thread
    let monitor_running = running.clone();
    let interval = config.scan_interval();
    let monitor_handle = tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink::new(event_tx);
        let mut monitor = Monitor::new(settings, scanner, ignore, interval, pacing, monitor_running);
        let summary = monitor.run(&mut sink);
        sink.send(TuiEvent::MonitorStopped(summary));
    });

    let mut terminal = setup_terminal()?;

    let tick_rate = Duration::from_millis(50);
    let result = run_event_loop(&mut terminal, &mut app, tick_rate).await;

    // Cleanup
    running.store(false, Ordering::SeqCst);
    restore_terminal(&mut terminal)?;

    // The loop only notices the flag between cycles
    if tokio::time::timeout(interval + Duration::from_secs(5), monitor_handle)
        .await
        .is_err()
    {
        eprintln!("Monitor loop did not stop in time");
    }

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if crossterm::event::poll(tick_rate)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => {
                            app.running = false;
                        }
                        KeyCode::Char('?') => {
                            app.show_help = !app.show_help;
                        }
                        KeyCode::Tab | KeyCode::Right => {
                            app.next_panel();
                        }
                        KeyCode::BackTab | KeyCode::Left => {
                            app.prev_panel();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.scroll_down();
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.scroll_up();
                        }
                        KeyCode::Esc => {
                            app.show_help = false;
                        }
                        _ => {}
                    }
                }
            }
        }

        // Drain results published by the monitor loop
        while let Ok(tui_event) = app.event_rx.try_recv() {
            app.handle_event(tui_event);
        }

        if !app.running {
            break;
        }
    }

    Ok(())
}
