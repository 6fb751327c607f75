use crate::registry::EmitterRegistry;
use crate::scan::Observation;
use log::debug;

/// Default aggregate deviation above which the room is considered disturbed
pub const DEFAULT_THRESHOLD: f64 = 25.0;

/// Default deviation charged for a baseline emitter absent from a scan
pub const DEFAULT_MISSING_PENALTY: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub threshold: f64,
    pub missing_penalty: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        ScoringParams {
            threshold: DEFAULT_THRESHOLD,
            missing_penalty: DEFAULT_MISSING_PENALTY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmitterDeviation {
    pub bssid: String,
    pub deviation: f64,
    /// Live reading, None when the emitter was missing from the scan
    pub rssi_dbm: Option<i32>,
    pub mean: f64,
}

impl EmitterDeviation {
    pub fn is_missing(&self) -> bool {
        self.rssi_dbm.is_none()
    }
}

/// Result of scoring one live scan against the baselines
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub total_deviation: f64,
    pub alarm: bool,
    pub threshold: f64,
    /// One entry per registry emitter, in registry order
    pub deviations: Vec<EmitterDeviation>,
}

impl Assessment {
    pub fn matched(&self) -> usize {
        self.deviations.iter().filter(|d| !d.is_missing()).count()
    }

    pub fn missing(&self) -> usize {
        self.deviations.iter().filter(|d| d.is_missing()).count()
    }
}

/// Normalized distance of a live reading from its baseline
pub fn normalized_deviation(rssi_dbm: f64, mean: f64, stddev: f64) -> f64 {
    (rssi_dbm - mean).abs() / stddev
}

/// Strictly greater than: a score sitting on the threshold does not alarm
pub fn exceeds_threshold(total_deviation: f64, threshold: f64) -> bool {
    total_deviation > threshold
}

/// Score a live scan against every calibrated emitter.
///
/// Only `last_deviation` is written back; baselines are left untouched.
pub fn assess(
    registry: &mut EmitterRegistry,
    scan: &[Observation],
    params: &ScoringParams,
) -> Assessment {
    let mut total_deviation = 0.0;
    let mut deviations = Vec::with_capacity(registry.len());

    for record in registry.records_mut() {
        // First match in scan order wins
        let reading = scan
            .iter()
            .find(|obs| obs.bssid == record.bssid)
            .map(|obs| obs.rssi_dbm);

        let deviation = match reading {
            Some(rssi) => normalized_deviation(rssi as f64, record.mean, record.stddev),
            None => params.missing_penalty,
        };

        debug!("{}, diff={:.2}", record.bssid, deviation);

        record.last_deviation = deviation;
        total_deviation += deviation;
        deviations.push(EmitterDeviation {
            bssid: record.bssid.clone(),
            deviation,
            rssi_dbm: reading,
            mean: record.mean,
        });
    }

    Assessment {
        total_deviation,
        alarm: exceeds_threshold(total_deviation, params.threshold),
        threshold: params.threshold,
        deviations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EmitterRecord;

    fn baseline(entries: &[(&str, f64, f64)]) -> EmitterRegistry {
        let mut registry = EmitterRegistry::new();
        for (id, _, _) in entries {
            registry.upsert(id, 0.0);
        }
        for (record, (_, mean, stddev)) in registry.records_mut().iter_mut().zip(entries) {
            record.mean = *mean;
            record.stddev = *stddev;
        }
        registry
    }

    #[test]
    fn test_deviation_from_baseline() {
        let mut registry = baseline(&[("AA:AA:AA:AA:AA:AA", -50.0, 10.0)]);
        let params = ScoringParams::default();

        let result = assess(&mut registry, &[Observation::new("AA:AA:AA:AA:AA:AA", -50)], &params);
        assert!(result.total_deviation.abs() < 1e-9);

        let result = assess(&mut registry, &[Observation::new("AA:AA:AA:AA:AA:AA", -80)], &params);
        assert!((result.total_deviation - 3.0).abs() < 1e-9);
        assert!((registry.get(0).unwrap().last_deviation - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_emitter_penalty() {
        let mut registry = baseline(&[
            ("11:11:11:11:11:11", -40.0, 2.0),
            ("22:22:22:22:22:22", -60.0, 5.0),
        ]);
        let scan = [Observation::new("11:11:11:11:11:11", -40)];

        let result = assess(&mut registry, &scan, &ScoringParams::default());

        assert_eq!(result.deviations.len(), 2);
        assert!(result.deviations[1].is_missing());
        assert_eq!(result.deviations[1].deviation, 3.0);
        assert_eq!(result.total_deviation, 3.0);
        assert_eq!(result.matched(), 1);
        assert_eq!(result.missing(), 1);
    }

    #[test]
    fn test_mixed_scan_below_threshold() {
        let mut registry = baseline(&[
            ("11:11:11:11:11:11", -50.0, 4.0),
            ("22:22:22:22:22:22", -70.0, 2.0),
            ("33:33:33:33:33:33", -65.0, 3.0),
        ]);
        let scan = [
            Observation::new("22:22:22:22:22:22", -72),
            Observation::new("11:11:11:11:11:11", -46),
        ];

        let result = assess(&mut registry, &scan, &ScoringParams::default());

        assert!((result.total_deviation - 5.0).abs() < 1e-9);
        assert!(!result.alarm);
        let order: Vec<&str> = result.deviations.iter().map(|d| d.bssid.as_str()).collect();
        assert_eq!(
            order,
            vec!["11:11:11:11:11:11", "22:22:22:22:22:22", "33:33:33:33:33:33"]
        );
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(!exceeds_threshold(25.0, 25.0));
        assert!(exceeds_threshold(25.0001, 25.0));
        assert!(!exceeds_threshold(24.9, 25.0));

        // Five missing emitters at 5.0 each land exactly on a threshold of 25
        let ids = ["01", "02", "03", "04", "05"].map(|b| format!("{b}:00:00:00:00:00"));
        let entries: Vec<(&str, f64, f64)> = ids.iter().map(|id| (id.as_str(), -60.0, 1.0)).collect();
        let mut registry = baseline(&entries);
        let params = ScoringParams {
            threshold: 25.0,
            missing_penalty: 5.0,
        };

        let result = assess(&mut registry, &[], &params);
        assert_eq!(result.total_deviation, 25.0);
        assert!(!result.alarm);
    }

    #[test]
    fn test_alarm_when_environment_changes() {
        let entries: Vec<(String, f64, f64)> = (0..10)
            .map(|i| (format!("{:02X}:00:00:00:00:00", i), -60.0, 1.5))
            .collect();
        let borrowed: Vec<(&str, f64, f64)> =
            entries.iter().map(|(id, m, s)| (id.as_str(), *m, *s)).collect();
        let mut registry = baseline(&borrowed);

        // Every AP drops 6 dB: 10 * 4.0 = 40 > 25
        let scan: Vec<Observation> = entries
            .iter()
            .map(|(id, _, _)| Observation::new(id.clone(), -66))
            .collect();
        let result = assess(&mut registry, &scan, &ScoringParams::default());

        assert!((result.total_deviation - 40.0).abs() < 1e-9);
        assert!(result.alarm);
    }

    #[test]
    fn test_duplicate_scan_entries_first_wins() {
        let mut registry = baseline(&[("AA:AA:AA:AA:AA:AA", -50.0, 1.0)]);
        let scan = [
            Observation::new("AA:AA:AA:AA:AA:AA", -52),
            Observation::new("AA:AA:AA:AA:AA:AA", -90),
        ];
        let result = assess(&mut registry, &scan, &ScoringParams::default());
        assert_eq!(result.deviations[0].rssi_dbm, Some(-52));
        assert!((result.total_deviation - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_baselines_untouched() {
        let mut registry = baseline(&[("AA:AA:AA:AA:AA:AA", -50.0, 3.0)]);
        let before: Vec<EmitterRecord> = registry.records().to_vec();

        assess(&mut registry, &[Observation::new("AA:AA:AA:AA:AA:AA", -20)], &ScoringParams::default());

        let after = registry.get(0).unwrap();
        assert_eq!(after.mean, before[0].mean);
        assert_eq!(after.stddev, before[0].stddev);
        assert_eq!(after.sample_count, before[0].sample_count);
        assert_eq!(registry.len(), before.len());
    }
}
