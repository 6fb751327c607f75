use crate::calibration::BaselineSummary;
use crate::detector::Assessment;
use crate::engine::{CycleOutcome, Engine, EngineSettings, Phase, Step};
use crate::ignore::IgnoreList;
use crate::registry::EmitterRegistry;
use crate::scan::{ScanError, ScanProvider};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consumer of engine results: a log, a dashboard, an indicator.
///
/// Sinks only observe; nothing they do feeds back into detection.
pub trait AlertSink {
    fn calibration_progress(&mut self, emitters: usize, observations: usize, remaining: Duration);

    fn calibration_finished(&mut self, summary: &BaselineSummary, registry: &EmitterRegistry);

    fn assessment(&mut self, assessment: &Assessment);

    fn scan_failed(&mut self, _error: &ScanError) {}
}

/// How the loop advances time between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep for the scan interval between cycles
    RealTime,
    /// Advance a simulated clock by the interval instead of sleeping
    Virtual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub alarms: u64,
    pub scan_failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    Idle,
    Immediate,
    Exhausted,
}

/// The single control loop: scan, feed the engine, report, wait.
pub struct Monitor<P: ScanProvider> {
    engine: Engine,
    scanner: P,
    ignore: IgnoreList,
    interval: Duration,
    pacing: Pacing,
    clock: Instant,
    running: Arc<AtomicBool>,
    summary: RunSummary,
}

impl<P: ScanProvider> Monitor<P> {
    pub fn new(
        settings: EngineSettings,
        scanner: P,
        ignore: IgnoreList,
        interval: Duration,
        pacing: Pacing,
        running: Arc<AtomicBool>,
    ) -> Self {
        let started_at = Instant::now();
        Monitor {
            engine: Engine::new(settings, started_at),
            scanner,
            ignore,
            interval,
            pacing,
            clock: started_at,
            running,
            summary: RunSummary::default(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn now(&self) -> Instant {
        match self.pacing {
            Pacing::RealTime => Instant::now(),
            Pacing::Virtual => self.clock,
        }
    }

    fn idle(&mut self) {
        match self.pacing {
            Pacing::RealTime => std::thread::sleep(self.interval),
            Pacing::Virtual => self.clock += self.interval,
        }
    }

    /// Run until the running flag clears or the scan source runs dry
    pub fn run(&mut self, sink: &mut dyn AlertSink) -> RunSummary {
        info!(
            "Keep the room still for calibration ({} s)...",
            self.engine.settings().calibration_window.as_secs()
        );

        while self.running.load(Ordering::SeqCst) {
            match self.run_cycle(sink) {
                CycleEnd::Idle => self.idle(),
                CycleEnd::Immediate => {}
                CycleEnd::Exhausted => {
                    info!("Scan source exhausted");
                    break;
                }
            }
        }

        info!(
            "Monitor stopped after {} cycles, {} alarms, {} failed scans",
            self.summary.cycles, self.summary.alarms, self.summary.scan_failures
        );
        self.summary
    }

    fn run_cycle(&mut self, sink: &mut dyn AlertSink) -> CycleEnd {
        let now = self.now();

        let request = match self.engine.next_step(now) {
            Step::FinishCalibration => {
                if let Some(summary) = self.engine.finish_calibration() {
                    sink.calibration_finished(&summary, self.engine.registry());
                }
                return CycleEnd::Immediate;
            }
            Step::Scan(request) => request,
        };

        self.summary.cycles += 1;

        let scan = match self.scanner.scan(&request) {
            Ok(scan) => scan,
            Err(e) => {
                // Absorbed: the next cycle scans again
                warn!("Scan failed: {}", e);
                self.summary.scan_failures += 1;
                sink.scan_failed(&e);
                return CycleEnd::Idle;
            }
        };

        if self.scanner.is_exhausted() {
            return CycleEnd::Exhausted;
        }

        let scan = self.ignore.filter(scan);
        if scan.is_empty() {
            match self.engine.phase() {
                Phase::Calibrating => warn!("No APs detected during calibration"),
                Phase::Active => warn!("No APs detected in active mode"),
            }
        } else {
            debug!("Scan returned {} emitters", scan.len());
        }

        match self.engine.ingest(&scan) {
            CycleOutcome::Calibrating {
                observations,
                emitters,
            } => {
                sink.calibration_progress(
                    emitters,
                    observations,
                    self.engine.calibration_remaining(now),
                );
            }
            CycleOutcome::Assessed(assessment) => {
                if assessment.alarm {
                    self.summary.alarms += 1;
                }
                sink.assessment(&assessment);
            }
        }

        CycleEnd::Idle
    }
}

/// Status lines through the `log` facade
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn calibration_progress(&mut self, emitters: usize, observations: usize, remaining: Duration) {
        info!(
            "Calibrating: {} observations this scan, {} emitters known, {} s left",
            observations,
            emitters,
            remaining.as_secs()
        );
    }

    fn calibration_finished(&mut self, summary: &BaselineSummary, _registry: &EmitterRegistry) {
        info!(
            "Calibration complete: {} emitters. Active mode.",
            summary.emitters
        );
    }

    fn assessment(&mut self, assessment: &Assessment) {
        info!(
            "Total deviation: {:.2} (threshold {:.1}, {} matched, {} missing)",
            assessment.total_deviation,
            assessment.threshold,
            assessment.matched(),
            assessment.missing()
        );
        if assessment.alarm {
            warn!("<<<<<<<<<<  ALARM  >>>>>>>>>>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{Observation, ScanRequest};
    use std::collections::VecDeque;

    struct Scripted {
        scans: VecDeque<Result<Vec<Observation>, ScanError>>,
        exhausted: bool,
        requests: Vec<ScanRequest>,
    }

    impl Scripted {
        fn new(scans: Vec<Result<Vec<Observation>, ScanError>>) -> Self {
            Scripted {
                scans: scans.into(),
                exhausted: false,
                requests: Vec::new(),
            }
        }
    }

    impl ScanProvider for Scripted {
        fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
            self.requests.push(request.clone());
            match self.scans.pop_front() {
                Some(scan) => scan,
                None => {
                    self.exhausted = true;
                    Ok(Vec::new())
                }
            }
        }

        fn is_exhausted(&self) -> bool {
            self.exhausted
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Vec<(usize, usize)>,
        finished: Option<BaselineSummary>,
        assessments: Vec<Assessment>,
        failures: usize,
    }

    impl AlertSink for Recorder {
        fn calibration_progress(&mut self, emitters: usize, observations: usize, _: Duration) {
            self.progress.push((emitters, observations));
        }

        fn calibration_finished(&mut self, summary: &BaselineSummary, registry: &EmitterRegistry) {
            assert_eq!(summary.emitters, registry.len());
            self.finished = Some(summary.clone());
        }

        fn assessment(&mut self, assessment: &Assessment) {
            self.assessments.push(assessment.clone());
        }

        fn scan_failed(&mut self, _error: &ScanError) {
            self.failures += 1;
        }
    }

    fn room(rssi: [i32; 3]) -> Vec<Observation> {
        vec![
            Observation::new("01:00:00:00:00:00", rssi[0]),
            Observation::new("02:00:00:00:00:00", rssi[1]),
            Observation::new("03:00:00:00:00:00", rssi[2]),
        ]
    }

    fn monitor(scans: Vec<Result<Vec<Observation>, ScanError>>, ignore: IgnoreList) -> Monitor<Scripted> {
        let settings = EngineSettings {
            calibration_window: Duration::from_secs(4),
            ..Default::default()
        };
        Monitor::new(
            settings,
            Scripted::new(scans),
            ignore,
            Duration::from_secs(1),
            Pacing::Virtual,
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[test]
    fn test_calibrate_then_detect() {
        let scans = vec![
            Ok(room([-40, -60, -70])),
            Ok(room([-60, -60, -70])),
            Err(ScanError::Process("radio busy".to_string())),
            Ok(vec![]),
            // Active from here on
            Ok(room([-50, -60, -70])),
            Ok(vec![Observation::new("01:00:00:00:00:00", -50)]),
            Ok(room([-10, -99, -20])),
        ];
        let mut monitor = monitor(scans, IgnoreList::new());
        let mut sink = Recorder::default();

        let summary = monitor.run(&mut sink);

        assert_eq!(sink.progress, vec![(3, 3), (3, 3), (3, 0)]);
        assert_eq!(sink.failures, 1);
        assert_eq!(sink.finished.as_ref().unwrap().emitters, 3);
        assert_eq!(monitor.engine().phase(), Phase::Active);

        assert_eq!(sink.assessments.len(), 3);
        assert!(sink.assessments[0].total_deviation.abs() < 1e-9);
        assert!((sink.assessments[1].total_deviation - 6.0).abs() < 1e-9);
        // 4.0 + 39.0 + 50.0
        assert!((sink.assessments[2].total_deviation - 93.0).abs() < 1e-9);
        assert!(sink.assessments[2].alarm);

        assert_eq!(summary.alarms, 1);
        assert_eq!(summary.scan_failures, 1);
        // The exhausted read counts as a cycle but is never ingested
        assert_eq!(summary.cycles, 8);

        let requests = &monitor.scanner.requests;
        assert!(requests.iter().all(|r| r.include_hidden));
    }

    #[test]
    fn test_ignored_emitters_never_learned() {
        let mut ignore = IgnoreList::new();
        ignore.add("02:00:00:00:00:00");
        let scans = (0..4).map(|_| Ok(room([-50, -50, -50]))).collect();
        let mut monitor = monitor(scans, ignore);
        let mut sink = Recorder::default();

        monitor.run(&mut sink);

        let registry = monitor.engine().registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.find("02:00:00:00:00:00").is_none());
    }

    #[test]
    fn test_stops_when_flag_cleared() {
        let mut monitor = monitor(vec![Ok(room([-50, -50, -50]))], IgnoreList::new());
        monitor.running.store(false, Ordering::SeqCst);
        let summary = monitor.run(&mut LogSink);
        assert_eq!(summary.cycles, 0);
    }
}
