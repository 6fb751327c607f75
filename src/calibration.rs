use crate::registry::{EmitterRegistry, DEFAULT_STDDEV_FLOOR};
use crate::scan::Observation;
use log::{debug, info};

/// Outcome of turning calibration sums into baselines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineSummary {
    pub emitters: usize,
    /// Emitters whose stddev was raised to the floor
    pub floored: usize,
    /// Emitters with no samples, left at their defaults
    pub empty: usize,
}

/// Fold one calibration scan into the registry.
///
/// An empty scan is a no-op. Returns how many samples were folded in.
pub fn accumulate(registry: &mut EmitterRegistry, scan: &[Observation]) -> usize {
    for obs in scan {
        registry.upsert(&obs.bssid, obs.rssi_dbm as f64);
    }
    scan.len()
}

/// Population mean and variance from raw moments.
///
/// Variance can come out slightly negative through cancellation when all
/// samples are identical; callers clamp it.
pub fn moments(count: u32, sum: f64, sum_sq: f64) -> Option<(f64, f64)> {
    if count == 0 {
        return None;
    }
    let n = count as f64;
    let mean = sum / n;
    let variance = sum_sq / n - mean * mean;
    Some((mean, variance))
}

/// Convert every record's accumulators into a (mean, stddev) baseline.
///
/// The stddev is `sqrt(max(variance, 0))` raised to at least `stddev_floor`,
/// which itself never drops below [`DEFAULT_STDDEV_FLOOR`].
pub fn derive_baselines(registry: &mut EmitterRegistry, stddev_floor: f64) -> BaselineSummary {
    let stddev_floor = stddev_floor.max(DEFAULT_STDDEV_FLOOR);
    let mut summary = BaselineSummary {
        emitters: registry.len(),
        ..Default::default()
    };

    for record in registry.records_mut() {
        let Some((mean, variance)) =
            moments(record.sample_count, record.sum_rssi, record.sum_rssi_squared)
        else {
            record.mean = 0.0;
            record.stddev = stddev_floor;
            summary.empty += 1;
            continue;
        };

        if variance <= 0.0 {
            debug!(
                "AP {}: non-positive variance {:.3e} over {} samples, clamped to 0",
                record.bssid, variance, record.sample_count
            );
        }

        let stddev = variance.max(0.0).sqrt();
        if stddev < stddev_floor {
            summary.floored += 1;
        }

        record.mean = mean;
        record.stddev = stddev.max(stddev_floor);

        info!(
            "AP {}: mean={:.2} dBm, std={:.2} dBm, samples={}",
            record.bssid, record.mean, record.stddev, record.sample_count
        );
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrate(samples: &[i32]) -> EmitterRegistry {
        let mut registry = EmitterRegistry::new();
        for &rssi in samples {
            accumulate(&mut registry, &[Observation::new("AA:AA:AA:AA:AA:AA", rssi)]);
        }
        derive_baselines(&mut registry, DEFAULT_STDDEV_FLOOR);
        registry
    }

    #[test]
    fn test_identical_samples_floor_stddev() {
        let registry = calibrate(&[-50, -50, -50]);
        let record = registry.get(0).unwrap();
        assert!((record.mean - (-50.0)).abs() < 1e-9);
        assert_eq!(record.stddev, 1.0);
    }

    #[test]
    fn test_two_sample_spread() {
        let registry = calibrate(&[-40, -60]);
        let record = registry.get(0).unwrap();
        assert!((record.mean - (-50.0)).abs() < 1e-9);
        let (_, variance) =
            moments(record.sample_count, record.sum_rssi, record.sum_rssi_squared).unwrap();
        assert!((variance - 100.0).abs() < 1e-9);
        assert!((record.stddev - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_moments_match_direct_computation() {
        let sequences: [&[i32]; 4] = [
            &[-71, -68, -75, -70, -69, -80, -66],
            &[-30],
            &[-90, -89, -91, -90, -90, -88],
            &[-55, -65, -45, -60, -50, -58, -52, -61],
        ];

        for samples in sequences {
            let mut registry = EmitterRegistry::new();
            for &rssi in samples {
                registry.upsert("11:22:33:44:55:66", rssi as f64);
            }
            let record = registry.get(0).unwrap();
            let (mean, variance) =
                moments(record.sample_count, record.sum_rssi, record.sum_rssi_squared).unwrap();

            let n = samples.len() as f64;
            let expected_mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
            let expected_var = samples
                .iter()
                .map(|&s| (s as f64 - expected_mean).powi(2))
                .sum::<f64>()
                / n;

            assert!((mean - expected_mean).abs() < 1e-9);
            assert!((variance - expected_var).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stddev_never_below_floor() {
        let mut registry = EmitterRegistry::new();
        let cases: [(&str, &[i32]); 4] = [
            ("01:00:00:00:00:00", &[-60]),
            ("02:00:00:00:00:00", &[-60, -61]),
            ("03:00:00:00:00:00", &[-33, -33, -33, -33]),
            ("04:00:00:00:00:00", &[-20, -95]),
        ];
        for (id, samples) in cases {
            for &s in samples {
                registry.upsert(id, s as f64);
            }
        }

        let summary = derive_baselines(&mut registry, DEFAULT_STDDEV_FLOOR);

        assert_eq!(summary.emitters, 4);
        assert_eq!(summary.floored, 3);
        assert_eq!(summary.empty, 0);
        assert!(registry.iter().all(|r| r.stddev >= 1.0));
    }

    #[test]
    fn test_lower_floor_is_raised_to_one() {
        let mut registry = EmitterRegistry::new();
        registry.upsert("AA:AA:AA:AA:AA:AA", -50.0);
        registry.upsert("AA:AA:AA:AA:AA:AA", -50.0);

        let summary = derive_baselines(&mut registry, 0.25);

        assert_eq!(summary.floored, 1);
        assert_eq!(registry.get(0).unwrap().stddev, 1.0);
    }

    #[test]
    fn test_empty_scan_is_noop() {
        let mut registry = EmitterRegistry::new();
        assert_eq!(accumulate(&mut registry, &[]), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_count_has_no_moments() {
        assert!(moments(0, 0.0, 0.0).is_none());
    }
}
