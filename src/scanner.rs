/// Radio, GPS and persistence seams plus the chain's channel plan.
///
/// The protocol core never drives the radio itself. A subordinate hands a
/// `ScanRequest` to its `WifiScanner` and gets back a list of observed
/// access points; the controller reads positions from a `GpsSource` and
/// hands collected records to a `ResultSink`.
use heapless::Vec;
use thiserror::Error;

use crate::defaults::MAX_OBSERVATIONS;
use crate::report::Report;
use crate::protocol::{Address, Band, GpsPosition, ScanMode, ScanParams, SsidString, WiFiScanResult};

/// 5 GHz channels assigned round-robin by chain position
pub const CHANNELS_5GHZ: [u8; 25] = [
    36, 40, 44, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144, 149,
    153, 157, 161, 165,
];

/// 2.4 GHz channels (1-13)
pub const CHANNELS_24GHZ: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

/// 5 GHz channel for a subordinate, cycling through the table by position.
pub fn channel_5ghz(address: Address) -> u8 {
    match address.index() {
        Some(i) => CHANNELS_5GHZ[i % CHANNELS_5GHZ.len()],
        None => CHANNELS_5GHZ[0],
    }
}

/// 2.4 GHz channel for a subordinate. Positions past 13 share channel 1.
pub fn channel_24ghz(address: Address) -> u8 {
    match address.raw() {
        a @ 1..=13 => a,
        _ => 1,
    }
}

/// Band a channel number belongs to
pub fn band_for_channel(channel: u8) -> Band {
    if channel <= 14 {
        Band::Band2_4GHz
    } else {
        Band::Band5GHz
    }
}

/// One radio scan, derived from the node's current `ScanParams`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub band: Band,
    /// 0 = all channels of the band
    pub channel: u8,
    pub mode: ScanMode,
    pub dwell_ms: u16,
    pub show_hidden: bool,
}

impl ScanRequest {
    pub fn from_params(params: &ScanParams) -> Self {
        Self {
            band: params.band,
            channel: params.channel,
            mode: params.mode,
            dwell_ms: params.scan_time_ms,
            show_hidden: params.show_hidden,
        }
    }
}

/// A raw access point observation from the radio
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub bssid: [u8; 6],
    pub ssid: SsidString,
    pub rssi: i8,
    pub channel: u8,
    pub auth_mode: u8,
}

impl Observation {
    /// Build the wire record, stamped with capture time and the cached fix.
    pub fn to_result(&self, timestamp: u32, gps: Option<&GpsPosition>) -> WiFiScanResult {
        let gps = gps.copied().unwrap_or(GpsPosition::NONE);
        WiFiScanResult {
            bssid: self.bssid,
            ssid: self.ssid.clone(),
            rssi: self.rssi,
            channel: self.channel,
            band: band_for_channel(self.channel),
            auth_mode: self.auth_mode,
            timestamp,
            latitude: gps.latitude,
            longitude: gps.longitude,
            altitude: gps.altitude,
            gps_quality: gps.fix_quality,
        }
    }
}

pub type ObservationList = Vec<Observation, MAX_OBSERVATIONS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("radio refused the scan (code {0})")]
    Radio(i32),
    #[error("radio not ready")]
    NotReady,
}

/// Blocking WiFi access-point scan
pub trait WifiScanner {
    /// Scan once and append what was seen to `out`. Observations beyond the
    /// list's capacity are dropped.
    fn scan(&mut self, request: &ScanRequest, out: &mut ObservationList) -> Result<(), ScanError>;
}

/// Current position, if any
pub trait GpsSource {
    fn current_fix(&mut self) -> Option<GpsPosition>;
}

/// Fire-and-forget destination for collected records
pub trait ResultSink {
    fn append(&mut self, source: Address, record: &WiFiScanResult);

    /// Controller summaries (discovery outcome, statistics, node status).
    fn report(&mut self, _report: &Report<'_>) {}
}

/// A GPS source that never has a fix
pub struct NoGps;

impl GpsSource for NoGps {
    fn current_fix(&mut self) -> Option<GpsPosition> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_ghz_plan_cycles_by_position() {
        assert_eq!(channel_5ghz(Address(1)), 36);
        assert_eq!(channel_5ghz(Address(9)), 100);
        assert_eq!(channel_5ghz(Address(25)), 165);
        assert_eq!(channel_5ghz(Address(26)), 36);
        assert_eq!(channel_5ghz(Address(52)), 40);
    }

    #[test]
    fn two_four_plan() {
        assert_eq!(channel_24ghz(Address(1)), 1);
        assert_eq!(channel_24ghz(Address(13)), 13);
        assert_eq!(channel_24ghz(Address(14)), 1);
        assert_eq!(channel_24ghz(Address::CONTROLLER), 1);
    }

    #[test]
    fn request_follows_params() {
        let params = crate::defaults::DEFAULT_SCAN_PARAMS;
        let req = ScanRequest::from_params(&params);
        assert_eq!(req.channel, 36);
        assert_eq!(req.dwell_ms, 120);
        assert_eq!(req.mode, ScanMode::Active);
        assert!(req.show_hidden);
    }

    #[test]
    fn observation_stamped_with_fix() {
        let obs = Observation {
            bssid: [1, 2, 3, 4, 5, 6],
            ssid: SsidString::try_from("lab").unwrap(),
            rssi: -70,
            channel: 6,
            auth_mode: 3,
        };
        let fix = GpsPosition {
            latitude: 10.0,
            longitude: 20.0,
            altitude: 30.0,
            satellites: 7,
            fix_quality: 1,
            timestamp: 0,
        };
        let r = obs.to_result(500, Some(&fix));
        assert_eq!(r.band, Band::Band2_4GHz);
        assert_eq!(r.timestamp, 500);
        assert_eq!(r.latitude, 10.0);
        assert_eq!(r.gps_quality, 1);

        let bare = obs.to_result(1, None);
        assert_eq!(bare.gps_quality, 0);
        assert_eq!(bare.latitude, 0.0);
    }
}
