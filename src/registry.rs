//! Per-emitter signal statistics learned while the room is empty.
//!
//! Records keep raw moments (sum and sum of squares) during calibration so no
//! sample history is retained. `mean` and `stddev` are only meaningful after
//! [`crate::calibration::derive_baselines`] has run.

/// Lower bound applied to every derived standard deviation (dBm)
pub const DEFAULT_STDDEV_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EmitterRecord {
    /// Upper-case, colon-separated BSSID
    pub bssid: String,
    pub sample_count: u32,
    pub sum_rssi: f64,
    pub sum_rssi_squared: f64,
    pub mean: f64,
    pub stddev: f64,
    /// Most recent normalized deviation, for display only
    pub last_deviation: f64,
}

impl EmitterRecord {
    fn with_first_sample(bssid: &str, rssi: f64) -> Self {
        EmitterRecord {
            bssid: bssid.to_string(),
            sample_count: 1,
            sum_rssi: rssi,
            sum_rssi_squared: rssi * rssi,
            mean: 0.0,
            stddev: DEFAULT_STDDEV_FLOOR,
            last_deviation: 0.0,
        }
    }

    fn add_sample(&mut self, rssi: f64) {
        self.sum_rssi += rssi;
        self.sum_rssi_squared += rssi * rssi;
        self.sample_count += 1;
    }
}

/// Insertion-ordered set of emitter records keyed by BSSID.
///
/// There is no removal path: an emitter that goes quiet during calibration
/// keeps whatever partial statistics it gathered.
#[derive(Debug, Clone, Default)]
pub struct EmitterRegistry {
    records: Vec<EmitterRecord>,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        EmitterRegistry::default()
    }

    /// Linear lookup by BSSID
    pub fn find(&self, bssid: &str) -> Option<usize> {
        self.records.iter().position(|r| r.bssid == bssid)
    }

    /// Fold one calibration sample into the record for `bssid`, creating it
    /// on first sight. Returns the record's index.
    pub fn upsert(&mut self, bssid: &str, rssi: f64) -> usize {
        match self.find(bssid) {
            Some(idx) => {
                self.records[idx].add_sample(rssi);
                idx
            }
            None => {
                self.records.push(EmitterRecord::with_first_sample(bssid, rssi));
                self.records.len() - 1
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&EmitterRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmitterRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[EmitterRecord] {
        &self.records
    }

    // Baseline derivation and scoring rewrite fields in place but never
    // add, drop or reorder records.
    pub(crate) fn records_mut(&mut self) -> &mut [EmitterRecord] {
        &mut self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_creates_record() {
        let mut registry = EmitterRegistry::new();
        let idx = registry.upsert("AA:AA:AA:AA:AA:AA", -50.0);

        assert_eq!(idx, 0);
        let record = registry.get(0).unwrap();
        assert_eq!(record.sample_count, 1);
        assert_eq!(record.sum_rssi, -50.0);
        assert_eq!(record.sum_rssi_squared, 2500.0);
        assert_eq!(record.mean, 0.0);
        assert_eq!(record.stddev, DEFAULT_STDDEV_FLOOR);
    }

    #[test]
    fn test_upsert_accumulates_existing() {
        let mut registry = EmitterRegistry::new();
        registry.upsert("AA:AA:AA:AA:AA:AA", -40.0);
        let idx = registry.upsert("AA:AA:AA:AA:AA:AA", -60.0);

        assert_eq!(idx, 0);
        assert_eq!(registry.len(), 1);
        let record = registry.get(0).unwrap();
        assert_eq!(record.sample_count, 2);
        assert_eq!(record.sum_rssi, -100.0);
        assert_eq!(record.sum_rssi_squared, 1600.0 + 3600.0);
    }

    #[test]
    fn test_ids_stay_unique_and_ordered() {
        let mut registry = EmitterRegistry::new();
        let ids = ["11:11:11:11:11:11", "22:22:22:22:22:22", "33:33:33:33:33:33"];

        for round in 0..5 {
            for (i, id) in ids.iter().enumerate() {
                // Skip some ids on some rounds so arrival order varies
                if (round + i) % 3 != 0 {
                    registry.upsert(id, -60.0 - round as f64);
                }
            }
        }

        assert_eq!(registry.len(), ids.len());
        for id in ids {
            assert_eq!(registry.iter().filter(|r| r.bssid == id).count(), 1);
        }
        // Discovery order: round 0 saw ids[1] and ids[2], round 1 saw ids[0]
        let order: Vec<&str> = registry.iter().map(|r| r.bssid.as_str()).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_find_missing() {
        let mut registry = EmitterRegistry::new();
        assert!(registry.find("AA:BB:CC:DD:EE:FF").is_none());
        registry.upsert("AA:BB:CC:DD:EE:FF", -70.0);
        assert_eq!(registry.find("AA:BB:CC:DD:EE:FF"), Some(0));
        assert!(registry.find("aa:bb:cc:dd:ee:ff").is_none());
    }
}
