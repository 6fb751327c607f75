use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One emitter heard during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub bssid: String,
    #[serde(default)]
    pub ssid: String,
    pub rssi_dbm: i32,
    #[serde(default)]
    pub channel: Option<u8>,
}

impl Observation {
    pub fn new(bssid: impl Into<String>, rssi_dbm: i32) -> Self {
        Observation {
            bssid: bssid.into(),
            ssid: String::new(),
            rssi_dbm,
            channel: None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty() || self.ssid.bytes().all(|b| b == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Listen for beacons only, never associate or send probes
    Passive,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub mode: ScanMode,
    pub include_hidden: bool,
    pub max_duration: Duration,
}

impl ScanRequest {
    pub fn passive(max_duration: Duration) -> Self {
        ScanRequest {
            mode: ScanMode::Passive,
            include_hidden: true,
            max_duration,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to open capture on {interface}: {source}")]
    CaptureOpen {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("capture error: {0}")]
    Capture(#[from] pcap::Error),

    #[error("scan process error: {0}")]
    Process(String),

    #[error("scan output parse error: {0}")]
    Parse(String),

    #[error("replay source error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed recorded scan on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of radio scan results.
///
/// A call blocks until the scan completes; implementations bound the wait
/// by `request.max_duration` where the underlying radio allows it.
pub trait ScanProvider {
    fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError>;

    /// True once a finite source (a recording) has nothing left to give
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<P: ScanProvider + ?Sized> ScanProvider for Box<P> {
    fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
        (**self).scan(request)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// Canonical BSSID form: upper-case hex separated by colons.
///
/// Accepts anything `macaddr` parses (`aa:bb:..`, `AA-BB-..`, `aabb.ccdd.eeff`).
pub fn normalize_bssid(raw: &str) -> Option<String> {
    let mac: MacAddr6 = raw.trim().parse().ok()?;
    Some(format_bssid(mac.as_bytes()))
}

pub fn format_bssid(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
