use crate::calibration::{accumulate, derive_baselines, BaselineSummary};
use crate::detector::{assess, Assessment, ScoringParams};
use crate::registry::{EmitterRegistry, DEFAULT_STDDEV_FLOOR};
use crate::scan::{Observation, ScanRequest};
use log::{info, warn};
use std::time::{Duration, Instant};

/// Default length of the empty-room learning window
pub const DEFAULT_CALIBRATION_WINDOW: Duration = Duration::from_secs(30);

/// Default scan bound while learning
pub const DEFAULT_CALIBRATION_SCAN: Duration = Duration::from_millis(300);

/// Default scan bound while detecting
pub const DEFAULT_DETECTION_SCAN: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Calibrating,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub calibration_window: Duration,
    pub calibration_scan: ScanRequest,
    pub detection_scan: ScanRequest,
    pub stddev_floor: f64,
    pub scoring: ScoringParams,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            calibration_window: DEFAULT_CALIBRATION_WINDOW,
            calibration_scan: ScanRequest::passive(DEFAULT_CALIBRATION_SCAN),
            detection_scan: ScanRequest::passive(DEFAULT_DETECTION_SCAN),
            stddev_floor: DEFAULT_STDDEV_FLOOR,
            scoring: ScoringParams::default(),
        }
    }
}

/// What the control loop should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Scan(ScanRequest),
    FinishCalibration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Calibrating {
        observations: usize,
        emitters: usize,
    },
    Assessed(Assessment),
}

/// Calibrating → Active state machine that owns the emitter registry.
pub struct Engine {
    settings: EngineSettings,
    registry: EmitterRegistry,
    phase: Phase,
    started_at: Instant,
    baseline: Option<BaselineSummary>,
}

impl Engine {
    pub fn new(settings: EngineSettings, started_at: Instant) -> Self {
        Engine {
            settings,
            registry: EmitterRegistry::new(),
            phase: Phase::Calibrating,
            started_at,
            baseline: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &EmitterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn baseline(&self) -> Option<&BaselineSummary> {
        self.baseline.as_ref()
    }

    /// Time left in the calibration window, zero once it has elapsed
    pub fn calibration_remaining(&self, now: Instant) -> Duration {
        match self.phase {
            Phase::Calibrating => self
                .settings
                .calibration_window
                .saturating_sub(now.saturating_duration_since(self.started_at)),
            Phase::Active => Duration::ZERO,
        }
    }

    pub fn next_step(&self, now: Instant) -> Step {
        match self.phase {
            Phase::Calibrating if self.calibration_remaining(now).is_zero() => {
                Step::FinishCalibration
            }
            Phase::Calibrating => Step::Scan(self.settings.calibration_scan.clone()),
            Phase::Active => Step::Scan(self.settings.detection_scan.clone()),
        }
    }

    /// Derive baselines and switch to Active. Returns None when already
    /// Active: the estimator runs once per process.
    pub fn finish_calibration(&mut self) -> Option<BaselineSummary> {
        if self.phase == Phase::Active {
            warn!("Calibration already finished, ignoring");
            return None;
        }

        let summary = derive_baselines(&mut self.registry, self.settings.stddev_floor);
        self.phase = Phase::Active;
        self.baseline = Some(summary.clone());

        info!(
            "Calibration finished: {} emitters ({} floored, {} empty). Active mode.",
            summary.emitters, summary.floored, summary.empty
        );
        if summary.emitters == 0 {
            warn!("No emitters learned during calibration, detection will never alarm");
        }

        Some(summary)
    }

    /// Feed one scan through the current phase
    pub fn ingest(&mut self, scan: &[Observation]) -> CycleOutcome {
        match self.phase {
            Phase::Calibrating => {
                let observations = accumulate(&mut self.registry, scan);
                CycleOutcome::Calibrating {
                    observations,
                    emitters: self.registry.len(),
                }
            }
            Phase::Active => {
                CycleOutcome::Assessed(assess(&mut self.registry, scan, &self.settings.scoring))
            }
        }
    }
}
