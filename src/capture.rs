use crate::channels::set_channel;
use crate::scan::{format_bssid, Observation, ScanError, ScanProvider, ScanRequest};
use libwifi::frame::components::{MacAddress, StationInfo};
use libwifi::frame::Frame;
use libwifi::parse_frame;
use log::{debug, trace, warn};
use pcap::Capture;
use std::time::{Duration, Instant};

// Short read timeout so dwell deadlines are honoured
const READ_TIMEOUT_MS: i32 = 20;

const BEACON_FILTER: &str = "type mgt subtype beacon or type mgt subtype probe-resp";

/// Passive scanner that listens for beacons on a monitor-mode interface.
///
/// Each scan opens a fresh capture handle and drops it when done, so frames
/// heard during the idle delay never leak into the next scan.
pub struct BeaconScanner {
    interface: String,
    channels: Vec<u8>,
}

impl BeaconScanner {
    pub fn new(interface: String, channels: Vec<u8>) -> Self {
        BeaconScanner {
            interface,
            channels,
        }
    }
}

/// Listen time on each hop. The request duration is spent on every channel,
/// so a full scan lasts about `channels × max_duration`.
fn dwell_per_channel(max_duration: Duration) -> Duration {
    max_duration.max(Duration::from_millis(1))
}

/// Tune each channel in turn and listen on the ones that took.
///
/// An empty channel list listens once on whatever the interface is already
/// tuned to. When every tune fails nothing was heard at all, which is an
/// error rather than an empty scan.
fn hop_channels<T, L>(
    interface: &str,
    channels: &[u8],
    mut tune: T,
    mut listen: L,
) -> Result<(), ScanError>
where
    T: FnMut(u8) -> anyhow::Result<()>,
    L: FnMut(Option<u8>) -> Result<(), ScanError>,
{
    if channels.is_empty() {
        return listen(None);
    }

    let mut tuned = 0;
    for &ch in channels {
        if let Err(e) = tune(ch) {
            warn!("Failed to set channel {}: {}", ch, e);
            continue;
        }
        tuned += 1;
        listen(Some(ch))?;
    }

    if tuned == 0 {
        return Err(ScanError::Process(format!(
            "could not tune {} to any of channels {:?}",
            interface, channels
        )));
    }
    Ok(())
}

impl ScanProvider for BeaconScanner {
    fn scan(&mut self, request: &ScanRequest) -> Result<Vec<Observation>, ScanError> {
        let mut cap = Capture::from_device(self.interface.as_str())
            .and_then(|c| {
                c.promisc(true)
                    .snaplen(4096)
                    .timeout(READ_TIMEOUT_MS)
                    .immediate_mode(true)
                    .open()
            })
            .map_err(|source| ScanError::CaptureOpen {
                interface: self.interface.clone(),
                source,
            })?;

        if let Err(e) = cap.filter(BEACON_FILTER, true) {
            warn!("Failed to set BPF filter, will filter in software: {}", e);
        }

        let dwell = dwell_per_channel(request.max_duration);
        let mut collected = ScanCollector::default();
        let interface = self.interface.as_str();

        hop_channels(
            interface,
            &self.channels,
            |ch| set_channel(interface, ch),
            |channel| {
                let deadline = Instant::now() + dwell;
                while Instant::now() < deadline {
                    match cap.next_packet() {
                        Ok(packet) => {
                            if let Some(obs) = parse_beacon(packet.data, channel) {
                                collected.add(obs);
                            }
                        }
                        Err(pcap::Error::TimeoutExpired) => continue,
                        Err(e) => return Err(ScanError::Capture(e)),
                    }
                }
                Ok(())
            },
        )?;

        let observations = collected.finish(request.include_hidden);
        debug!(
            "Beacon scan on {} heard {} emitters, {:?} per channel",
            self.interface,
            observations.len(),
            dwell
        );
        Ok(observations)
    }
}

/// One observation per BSSID, in first-heard order, strongest reading kept
#[derive(Debug, Default)]
pub struct ScanCollector {
    observations: Vec<Observation>,
}

impl ScanCollector {
    pub fn add(&mut self, obs: Observation) {
        match self.observations.iter_mut().find(|o| o.bssid == obs.bssid) {
            Some(existing) => {
                if obs.rssi_dbm > existing.rssi_dbm {
                    existing.rssi_dbm = obs.rssi_dbm;
                }
                if existing.ssid.is_empty() && !obs.ssid.is_empty() {
                    existing.ssid = obs.ssid;
                }
            }
            None => self.observations.push(obs),
        }
    }

    pub fn finish(self, include_hidden: bool) -> Vec<Observation> {
        self.observations
            .into_iter()
            .filter(|o| include_hidden || !o.is_hidden())
            .collect()
    }
}

/// Decode a radiotap-wrapped beacon or probe response into an observation.
///
/// Frames without an antenna signal field are skipped: they carry nothing
/// the fingerprint can use.
pub fn parse_beacon(data: &[u8], tuned_channel: Option<u8>) -> Option<Observation> {
    let rssi_dbm = radiotap_signal_dbm(data)?;
    let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
    let frame = data.get(header_len..)?;

    if frame.len() < 24 {
        return None;
    }

    let observation = match parse_frame(frame, false) {
        Ok(Frame::Beacon(beacon)) => build_observation(
            &beacon.header.address_3,
            &beacon.station_info,
            rssi_dbm,
            tuned_channel,
        ),
        Ok(Frame::ProbeResponse(response)) => build_observation(
            &response.header.address_3,
            &response.station_info,
            rssi_dbm,
            tuned_channel,
        ),
        Ok(_) => {
            trace!("Ignoring non-beacon frame");
            return None;
        }
        Err(e) => {
            trace!("Failed to parse frame: {:?}", e);
            return None;
        }
    };

    Some(observation)
}

fn build_observation(
    bssid: &MacAddress,
    station_info: &StationInfo,
    rssi_dbm: i32,
    tuned_channel: Option<u8>,
) -> Observation {
    Observation {
        bssid: format_bssid(&bssid.0),
        ssid: station_info.ssid.clone().unwrap_or_default(),
        rssi_dbm,
        channel: station_info.ds_parameter_set.or(tuned_channel),
    }
}

// (alignment, size) of radiotap fields 0..=4, which precede the antenna
// signal field (bit 5)
const RADIOTAP_LEADING_FIELDS: [(usize, usize); 5] = [
    (8, 8), // TSFT
    (1, 1), // Flags
    (1, 1), // Rate
    (2, 4), // Channel
    (2, 2), // FHSS
];

const RADIOTAP_ANTENNA_SIGNAL: u32 = 1 << 5;
const RADIOTAP_EXT: u32 = 1 << 31;

/// Read the dBm antenna signal from a radiotap header
pub fn radiotap_signal_dbm(data: &[u8]) -> Option<i32> {
    if data.len() < 8 || data[0] != 0 {
        return None;
    }

    let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if header_len < 8 || header_len > data.len() {
        return None;
    }

    let present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if present & RADIOTAP_ANTENNA_SIGNAL == 0 {
        return None;
    }

    // Skip any extended presence words
    let mut offset = 8;
    let mut word = present;
    while word & RADIOTAP_EXT != 0 {
        let next = data.get(offset..offset + 4)?;
        word = u32::from_le_bytes([next[0], next[1], next[2], next[3]]);
        offset += 4;
    }

    for (bit, (align, size)) in RADIOTAP_LEADING_FIELDS.iter().enumerate() {
        if present & (1 << bit) != 0 {
            offset = offset.next_multiple_of(*align) + size;
        }
    }

    if offset < header_len {
        Some(data[offset] as i8 as i32)
    } else {
        None
    }
}
