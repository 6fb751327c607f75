use crate::scan::{normalize_bssid, Observation};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// BSSIDs kept out of the fingerprint, e.g. phone hotspots or mobile routers
/// that come and go with their owners.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    bssids: HashSet<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IgnoreListFile {
    bssids: Vec<String>,
}

impl IgnoreList {
    pub fn new() -> Self {
        IgnoreList::default()
    }

    /// Load from JSON; a missing file yields an empty list
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut list = IgnoreList::new();

        if !path.exists() {
            debug!("BSSID ignore list not found: {:?}", path);
            return Ok(list);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ignore list: {:?}", path))?;
        let file: IgnoreListFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ignore list: {:?}", path))?;

        for raw in &file.bssids {
            if !list.add(raw) {
                warn!("Skipping invalid BSSID in ignore list: {:?}", raw);
            }
        }

        info!("Loaded {} BSSIDs to ignore", list.len());
        Ok(list)
    }

    /// Returns false when `bssid` is not a valid MAC address
    pub fn add(&mut self, bssid: &str) -> bool {
        match normalize_bssid(bssid) {
            Some(normalized) => {
                self.bssids.insert(normalized);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, bssid: &str) -> bool {
        normalize_bssid(bssid).is_some_and(|b| self.bssids.contains(&b))
    }

    pub fn len(&self) -> usize {
        self.bssids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bssids.is_empty()
    }

    /// Drop ignored emitters from a scan, preserving order
    pub fn filter(&self, scan: Vec<Observation>) -> Vec<Observation> {
        if self.bssids.is_empty() {
            return scan;
        }
        scan.into_iter()
            .filter(|obs| !self.contains(&obs.bssid))
            .collect()
    }
}

pub fn create_default_ignore_list<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&IgnoreListFile { bssids: Vec::new() })?;
    fs::write(path, content)?;
    info!("Created default BSSID ignore list: {:?}", path);
    Ok(())
}
