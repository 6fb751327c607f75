use crate::calibration::BaselineSummary;
use crate::detector::Assessment;
use crate::engine::Phase;
use crate::registry::EmitterRecord;
use crate::tui::TuiEvent;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Maximum entries in the event log ring buffer
const MAX_EVENT_LOG_ENTRIES: usize = 500;

/// Active panel for focus/navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePanel {
    #[default]
    EventLog,
    BaselineTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Warning,
    Alarm,
}

#[derive(Debug, Clone)]
pub struct EventEntry {
    pub timestamp: i64,
    pub kind: EventKind,
    pub message: String,
}

/// One learned emitter plus its most recent live reading
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRow {
    pub bssid: String,
    pub mean: f64,
    pub stddev: f64,
    pub samples: u32,
    pub last_rssi: Option<i32>,
    pub last_deviation: Option<f64>,
}

impl From<&EmitterRecord> for BaselineRow {
    fn from(record: &EmitterRecord) -> Self {
        BaselineRow {
            bssid: record.bssid.clone(),
            mean: record.mean,
            stddev: record.stddev,
            samples: record.sample_count,
            last_rssi: None,
            last_deviation: None,
        }
    }
}

/// Main application state
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub active_panel: ActivePanel,

    /// Where scans come from, e.g. "wlan1 (monitor)" or a replay file
    pub source: String,

    pub phase: Phase,
    pub calibration_window: Duration,
    pub calibration_remaining: Duration,
    /// Emitters learned so far / observations in the latest calibration scan
    pub emitters_seen: usize,
    pub last_observations: usize,

    pub summary: Option<BaselineSummary>,
    pub baselines: Vec<BaselineRow>,
    pub latest: Option<Assessment>,
    pub threshold: f64,
    pub max_bars: usize,

    pub alarm_active: bool,
    pub alarm_cycles: u64,
    pub cycles: u64,
    pub scan_failures: u64,
    pub monitor_stopped: bool,

    /// Event log entries (ring buffer)
    pub event_log: VecDeque<EventEntry>,
    /// Event log scroll offset (0 = bottom/newest)
    pub log_scroll: usize,
    pub selected_baseline: usize,

    pub started_at: Instant,
    pub event_rx: mpsc::Receiver<TuiEvent>,
}

impl App {
    pub fn new(
        event_rx: mpsc::Receiver<TuiEvent>,
        source: String,
        calibration_window: Duration,
        threshold: f64,
        max_bars: usize,
    ) -> Self {
        App {
            running: true,
            show_help: false,
            active_panel: ActivePanel::EventLog,
            source,
            phase: Phase::Calibrating,
            calibration_window,
            calibration_remaining: calibration_window,
            emitters_seen: 0,
            last_observations: 0,
            summary: None,
            baselines: Vec::new(),
            latest: None,
            threshold,
            max_bars,
            alarm_active: false,
            alarm_cycles: 0,
            cycles: 0,
            scan_failures: 0,
            monitor_stopped: false,
            event_log: VecDeque::with_capacity(MAX_EVENT_LOG_ENTRIES),
            log_scroll: 0,
            selected_baseline: 0,
            started_at: Instant::now(),
            event_rx,
        }
    }

    pub fn handle_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::CalibrationProgress {
                emitters,
                observations,
                remaining,
            } => {
                self.cycles += 1;
                self.emitters_seen = emitters;
                self.last_observations = observations;
                self.calibration_remaining = remaining;
                if observations == 0 {
                    self.push_event(EventKind::Warning, "No APs detected during calibration");
                }
            }
            TuiEvent::Calibrated { summary, baselines } => {
                self.phase = Phase::Active;
                self.calibration_remaining = Duration::ZERO;
                self.emitters_seen = baselines.len();
                self.baselines = baselines;
                self.selected_baseline = 0;

                let message = format!(
                    "Calibration complete: {} emitters ({} floored)",
                    summary.emitters, summary.floored
                );
                self.push_event(EventKind::Info, message);
                if summary.emitters == 0 {
                    self.push_event(EventKind::Warning, "No emitters learned, detection cannot alarm");
                }
                self.summary = Some(summary);
            }
            TuiEvent::Assessed(assessment) => self.apply_assessment(assessment),
            TuiEvent::ScanFailed(message) => {
                self.cycles += 1;
                self.scan_failures += 1;
                self.push_event(EventKind::Warning, format!("Scan failed: {}", message));
            }
            TuiEvent::MonitorStopped(summary) => {
                self.monitor_stopped = true;
                self.push_event(
                    EventKind::Info,
                    format!(
                        "Monitor stopped after {} cycles ({} alarms)",
                        summary.cycles, summary.alarms
                    ),
                );
            }
        }
    }

    fn apply_assessment(&mut self, assessment: Assessment) {
        self.cycles += 1;

        // Deviations arrive in registry order, the same order as the rows
        for (row, dev) in self.baselines.iter_mut().zip(&assessment.deviations) {
            row.last_rssi = dev.rssi_dbm;
            row.last_deviation = Some(dev.deviation);
        }

        if assessment.alarm {
            self.alarm_cycles += 1;
            if !self.alarm_active {
                self.push_event(
                    EventKind::Alarm,
                    format!(
                        "ALARM: total deviation {:.2} > {:.1}",
                        assessment.total_deviation, assessment.threshold
                    ),
                );
            }
        } else if self.alarm_active {
            self.push_event(
                EventKind::Info,
                format!("Room quiet again ({:.2})", assessment.total_deviation),
            );
        }

        self.alarm_active = assessment.alarm;
        self.threshold = assessment.threshold;
        self.latest = Some(assessment);
    }

    pub fn push_event(&mut self, kind: EventKind, message: impl Into<String>) {
        if self.event_log.len() >= MAX_EVENT_LOG_ENTRIES {
            self.event_log.pop_front();
        }
        self.event_log.push_back(EventEntry {
            timestamp: chrono::Utc::now().timestamp(),
            kind,
            message: message.into(),
        });
    }

    /// Fraction of the calibration window already elapsed, 0.0..=1.0
    pub fn calibration_progress(&self) -> f64 {
        match self.phase {
            Phase::Active => 1.0,
            Phase::Calibrating if self.calibration_window.is_zero() => 1.0,
            Phase::Calibrating => {
                let elapsed = self.calibration_window.saturating_sub(self.calibration_remaining);
                (elapsed.as_secs_f64() / self.calibration_window.as_secs_f64()).clamp(0.0, 1.0)
            }
        }
    }

    /// Per-emitter deviations from the latest assessment, capped at `max_bars`
    pub fn deviation_bars(&self) -> Vec<(String, f64)> {
        let Some(latest) = &self.latest else {
            return Vec::new();
        };
        latest
            .deviations
            .iter()
            .take(self.max_bars)
            .map(|d| (short_bssid(&d.bssid), d.deviation))
            .collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn next_panel(&mut self) {
        self.active_panel = match self.active_panel {
            ActivePanel::EventLog => ActivePanel::BaselineTable,
            ActivePanel::BaselineTable => ActivePanel::EventLog,
        };
    }

    pub fn prev_panel(&mut self) {
        self.next_panel(); // Only 2 panels, same as next
    }

    pub fn scroll_up(&mut self) {
        match self.active_panel {
            ActivePanel::EventLog => {
                if self.log_scroll < self.event_log.len().saturating_sub(1) {
                    self.log_scroll += 1;
                }
            }
            ActivePanel::BaselineTable => {
                self.selected_baseline = self.selected_baseline.saturating_sub(1);
            }
        }
    }

    pub fn scroll_down(&mut self) {
        match self.active_panel {
            ActivePanel::EventLog => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
            ActivePanel::BaselineTable => {
                if self.selected_baseline < self.baselines.len().saturating_sub(1) {
                    self.selected_baseline += 1;
                }
            }
        }
    }
}

/// Last three octets, enough to tell emitters apart on a bar label
pub fn short_bssid(bssid: &str) -> String {
    bssid.get(9..).unwrap_or(bssid).to_string()
}
