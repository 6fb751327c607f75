//! Scan provider for managed-mode interfaces, driven through `iw dev <if> scan`.
//!
//! Needs `CAP_NET_ADMIN`. The kernel bounds the scan duration itself, so the
//! request's `max_duration` is advisory here.

use crate::capture::ScanCollector;
use crate::scan::{normalize_bssid, Observation, ScanError, ScanMode, ScanProvider, ScanRequest};
use log::debug;
use std::process::Command;

pub struct IwScanner {
    interface: String,
}

impl IwScanner {
    pub fn new(interface: String) -> Self {
        IwScanner { interface }
    }

    fn command_args(&self, request: &ScanRequest) -> Vec<String> {
        let mut args = vec!["dev".to_string(), self.interface.clone(), "scan".to_string()];
        if request.mode == ScanMode::Passive {
            args.push("passive".to_string());
        }
        args
    }
}

impl ScanProvider for IwScanner {
    fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
        let args = self.command_args(request);
        let output = Command::new("iw")
            .args(&args)
            .output()
            .map_err(|e| ScanError::Process(format!("failed to run `iw {}`: {e}", args.join(" "))))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Process(format!(
                "iw exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let observations: Vec<Observation> = parse_iw_scan(&stdout)?
            .into_iter()
            .filter(|o| request.include_hidden || !o.is_hidden())
            .collect();
        debug!("iw scan on {} returned {} BSSs", self.interface, observations.len());
        Ok(observations)
    }
}

#[derive(Default)]
struct BssStanza {
    bssid: String,
    ssid: Option<String>,
    signal_dbm: Option<f64>,
    freq_mhz: Option<u32>,
    channel: Option<u8>,
}

impl BssStanza {
    // A stanza without a signal line is useless to the fingerprint
    fn into_observation(self) -> Option<Observation> {
        let signal = self.signal_dbm?;
        Some(Observation {
            bssid: self.bssid,
            ssid: self.ssid.unwrap_or_default(),
            rssi_dbm: signal.round() as i32,
            channel: self.channel.or_else(|| self.freq_mhz.and_then(freq_to_channel)),
        })
    }
}

/// Parse `iw dev <if> scan` output into observations, in output order.
///
/// Each BSS stanza starts at column 0 with `BSS aa:bb:cc:dd:ee:ff(on wlan0)`.
/// A BSSID listed twice keeps its strongest reading.
pub fn parse_iw_scan(output: &str) -> Result<Vec<Observation>, ScanError> {
    let mut results = ScanCollector::default();
    let mut current: Option<BssStanza> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some(obs) = current.take().and_then(BssStanza::into_observation) {
                results.add(obs);
            }

            let mac: String = rest
                .chars()
                .take_while(|c| c.is_ascii_hexdigit() || *c == ':')
                .collect();
            let bssid = normalize_bssid(&mac)
                .ok_or_else(|| ScanError::Parse(format!("bad BSS line: {}", line.trim())))?;
            current = Some(BssStanza {
                bssid,
                ..Default::default()
            });
            continue;
        }

        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SSID:") {
            stanza.ssid = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            stanza.signal_dbm = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        } else if let Some(rest) = trimmed.strip_prefix("freq:") {
            stanza.freq_mhz = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.split('.').next())
                .and_then(|v| v.parse().ok());
        } else if let Some(rest) = trimmed.strip_prefix("DS Parameter set: channel") {
            stanza.channel = rest.trim().parse().ok();
        }
    }

    if let Some(obs) = current.take().and_then(BssStanza::into_observation) {
        results.add(obs);
    }

    Ok(results.finish(true))
}

fn freq_to_channel(freq_mhz: u32) -> Option<u8> {
    let channel = match freq_mhz {
        2484 => 14,
        2412..=2472 => (freq_mhz - 2407) / 5,
        5170..=5885 => (freq_mhz - 5000) / 5,
        5955..=7115 => (freq_mhz - 5950) / 5,
        _ => return None,
    };
    u8::try_from(channel).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = "BSS 00:11:22:33:44:55(on wlan0) -- associated
\tlast seen: 120 ms ago
\tfreq: 2437
\tsignal: -52.00 dBm
\tSSID: HomeNet
\tDS Parameter set: channel 6
BSS aa:bb:cc:dd:ee:ff(on wlan0)
\tfreq: 5180.0
\tsignal: -71.50 dBm
\tSSID:
BSS 66:77:88:99:aa:bb(on wlan0)
\tfreq: 2412
\tSSID: NoSignal
";

    #[test]
    fn test_parse_iw_scan() {
        let scan = parse_iw_scan(SCAN).unwrap();
        assert_eq!(scan.len(), 2);

        assert_eq!(scan[0].bssid, "00:11:22:33:44:55");
        assert_eq!(scan[0].ssid, "HomeNet");
        assert_eq!(scan[0].rssi_dbm, -52);
        assert_eq!(scan[0].channel, Some(6));

        assert_eq!(scan[1].bssid, "AA:BB:CC:DD:EE:FF");
        assert!(scan[1].is_hidden());
        assert_eq!(scan[1].rssi_dbm, -72);
        assert_eq!(scan[1].channel, Some(36));
    }

    #[test]
    fn test_repeated_bss_keeps_strongest() {
        let output = "BSS 00:11:22:33:44:55(on wlan0)
\tsignal: -70.00 dBm
\tSSID: HomeNet
BSS 66:77:88:99:aa:bb(on wlan0)
\tsignal: -60.00 dBm
\tSSID: Upstairs
BSS 00:11:22:33:44:55(on wlan0)
\tsignal: -48.00 dBm
\tSSID: HomeNet
";
        let scan = parse_iw_scan(output).unwrap();
        assert_eq!(scan.len(), 2);
        assert_eq!(scan[0].bssid, "00:11:22:33:44:55");
        assert_eq!(scan[0].rssi_dbm, -48);
        assert_eq!(scan[1].bssid, "66:77:88:99:AA:BB");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_iw_scan("").unwrap().is_empty());
    }

    #[test]
    fn test_freq_to_channel() {
        assert_eq!(freq_to_channel(2412), Some(1));
        assert_eq!(freq_to_channel(2484), Some(14));
        assert_eq!(freq_to_channel(5745), Some(149));
        assert_eq!(freq_to_channel(900), None);
    }

    #[test]
    fn test_passive_flag() {
        let scanner = IwScanner::new("wlan0".to_string());
        let args = scanner.command_args(&ScanRequest::passive(std::time::Duration::from_millis(300)));
        assert_eq!(args, vec!["dev", "wlan0", "scan", "passive"]);
    }
}
