use crate::scan::{Observation, ScanError, ScanProvider, ScanRequest};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

/// One line of a scan recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedScan {
    pub timestamp: i64,
    pub observations: Vec<Observation>,
}

/// Plays back a JSON-lines recording, one scan per call.
pub struct ReplayScanner<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    exhausted: bool,
}

impl ReplayScanner<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open recording: {:?}", path.as_ref()))?;
        Ok(ReplayScanner::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplayScanner<R> {
    pub fn new(reader: R) -> Self {
        ReplayScanner {
            lines: reader.lines(),
            line_no: 0,
            exhausted: false,
        }
    }
}

impl<R: BufRead> ScanProvider for ReplayScanner<R> {
    fn scan(&mut self, _request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
        loop {
            let Some(line) = self.lines.next() else {
                self.exhausted = true;
                return Ok(Vec::new());
            };
            let line = line?;
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let record: RecordedScan =
                serde_json::from_str(&line).map_err(|source| ScanError::Record {
                    line: self.line_no,
                    source,
                })?;
            debug!(
                "Replaying scan {} ({} observations)",
                self.line_no,
                record.observations.len()
            );
            return Ok(record.observations);
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Wraps a provider and appends every successful scan to a recording.
pub struct ScanRecorder<P, W: Write> {
    inner: P,
    out: W,
    recorded: usize,
}

impl<P: ScanProvider> ScanRecorder<P, File> {
    pub fn create<Q: AsRef<Path>>(inner: P, path: Q) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to open recording for writing: {:?}", path.as_ref()))?;
        info!("Recording scans to {:?}", path.as_ref());
        Ok(ScanRecorder::new(inner, file))
    }
}

impl<P: ScanProvider, W: Write> ScanRecorder<P, W> {
    pub fn new(inner: P, out: W) -> Self {
        ScanRecorder {
            inner,
            out,
            recorded: 0,
        }
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn into_writer(self) -> W {
        self.out
    }
}

impl<P: ScanProvider, W: Write> ScanProvider for ScanRecorder<P, W> {
    fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
        let observations = self.inner.scan(request)?;

        let record = RecordedScan {
            timestamp: chrono::Utc::now().timestamp(),
            observations,
        };
        let line = serde_json::to_string(&record).map_err(|source| ScanError::Record {
            line: self.recorded + 1,
            source,
        })?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        self.recorded += 1;

        Ok(record.observations)
    }

    fn is_exhausted(&self) -> bool {
        self.inner.is_exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn request() -> ScanRequest {
        ScanRequest::passive(Duration::from_millis(300))
    }

    #[test]
    fn test_replay_lines_then_exhausts() {
        let data = r#"{"timestamp":1,"observations":[{"bssid":"AA:AA:AA:AA:AA:AA","rssi_dbm":-50}]}

{"timestamp":3,"observations":[]}
"#;
        let mut replay = ReplayScanner::new(Cursor::new(data));

        let first = replay.scan(&request()).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].rssi_dbm, -50);
        assert!(!replay.is_exhausted());

        assert!(replay.scan(&request()).unwrap().is_empty());
        assert!(!replay.is_exhausted());

        assert!(replay.scan(&request()).unwrap().is_empty());
        assert!(replay.is_exhausted());
    }

    #[test]
    fn test_replay_reports_bad_line() {
        let data = "{\"timestamp\":1,\"observations\":[]}\nnot json\n";
        let mut replay = ReplayScanner::new(Cursor::new(data));
        replay.scan(&request()).unwrap();
        match replay.scan(&request()) {
            Err(ScanError::Record { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_record_then_replay() {
        let source = "{\"timestamp\":10,\"observations\":[{\"bssid\":\"11:22:33:44:55:66\",\"ssid\":\"Lab\",\"rssi_dbm\":-61,\"channel\":11}]}\n";
        let mut recorder = ScanRecorder::new(ReplayScanner::new(Cursor::new(source)), Vec::new());

        let scan = recorder.scan(&request()).unwrap();
        assert_eq!(scan[0].ssid, "Lab");
        assert_eq!(recorder.recorded(), 1);

        let written = recorder.into_writer();
        let mut replay = ReplayScanner::new(Cursor::new(written));
        let replayed = replay.scan(&request()).unwrap();
        assert_eq!(replayed, scan);
    }

    #[test]
    fn test_recording_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scans.jsonl");
        let source = "{\"timestamp\":1,\"observations\":[]}\n{\"timestamp\":2,\"observations\":[]}\n";

        let mut recorder =
            ScanRecorder::create(ReplayScanner::new(Cursor::new(source)), &path).unwrap();
        recorder.scan(&request()).unwrap();
        recorder.scan(&request()).unwrap();
        drop(recorder);

        let mut replay = ReplayScanner::open(&path).unwrap();
        replay.scan(&request()).unwrap();
        replay.scan(&request()).unwrap();
        replay.scan(&request()).unwrap();
        assert!(replay.is_exhausted());
    }
}
