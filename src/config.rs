use crate::detector::{ScoringParams, DEFAULT_MISSING_PENALTY, DEFAULT_THRESHOLD};
use crate::engine::{
    EngineSettings, DEFAULT_CALIBRATION_SCAN, DEFAULT_CALIBRATION_WINDOW, DEFAULT_DETECTION_SCAN,
};
use crate::registry::DEFAULT_STDDEV_FLOOR;
use crate::scan::ScanRequest;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default idle delay between scan cycles
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 2000;

/// Default cap on emitters drawn in the deviation chart
pub const DEFAULT_MAX_BARS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    pub ignore_list: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanBackend {
    /// Passive beacon capture on a monitor-mode interface
    Monitor,
    /// `iw dev <if> scan` on a managed interface
    Iw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub backend: ScanBackend,
    pub interface: String,
    /// Channels visited by the monitor backend during each scan
    pub channels: Vec<u8>,
    pub include_hidden: bool,
    pub calibration_dwell_ms: u64,
    pub detection_dwell_ms: u64,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub threshold: f64,
    pub missing_penalty: f64,
    pub min_stddev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub max_bars: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            max_bars: DEFAULT_MAX_BARS,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Config {
            scan: ScanConfig {
                backend: ScanBackend::Monitor,
                interface: "wlan1".to_string(),
                channels: vec![1, 6, 11],
                include_hidden: true,
                calibration_dwell_ms: DEFAULT_CALIBRATION_SCAN.as_millis() as u64,
                detection_dwell_ms: DEFAULT_DETECTION_SCAN.as_millis() as u64,
                interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            },
            calibration: CalibrationConfig {
                window_secs: DEFAULT_CALIBRATION_WINDOW.as_secs(),
            },
            detection: DetectionConfig {
                threshold: DEFAULT_THRESHOLD,
                missing_penalty: DEFAULT_MISSING_PENALTY,
                min_stddev: DEFAULT_STDDEV_FLOOR,
            },
            display: DisplayConfig::default(),
            ignore_list: "ignore_list.json".to_string(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        ensure!(d.threshold.is_finite(), "detection.threshold must be finite");
        ensure!(
            d.missing_penalty.is_finite() && d.missing_penalty >= 0.0,
            "detection.missing_penalty must be a non-negative number"
        );
        ensure!(
            d.min_stddev.is_finite() && d.min_stddev >= DEFAULT_STDDEV_FLOOR,
            "detection.min_stddev must be at least {}",
            DEFAULT_STDDEV_FLOOR
        );
        ensure!(self.scan.interval_ms > 0, "scan.interval_ms must be positive");
        ensure!(
            self.scan.calibration_dwell_ms > 0 && self.scan.detection_dwell_ms > 0,
            "scan dwell times must be positive"
        );
        ensure!(self.display.max_bars > 0, "display.max_bars must be positive");
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan.interval_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let request = |ms: u64| ScanRequest {
            include_hidden: self.scan.include_hidden,
            ..ScanRequest::passive(Duration::from_millis(ms))
        };

        EngineSettings {
            calibration_window: Duration::from_secs(self.calibration.window_secs),
            calibration_scan: request(self.scan.calibration_dwell_ms),
            detection_scan: request(self.scan.detection_dwell_ms),
            stddev_floor: self.detection.min_stddev,
            scoring: ScoringParams {
                threshold: self.detection.threshold,
                missing_penalty: self.detection.missing_penalty,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
