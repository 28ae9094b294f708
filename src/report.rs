/// Host-facing NDJSON report stream.
///
/// The controller turns collected records and its own summaries into
/// newline-delimited JSON on the console. Uses `heapless` types for
/// no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::Serialize;

use crate::protocol::{Address, StatusInfo, WiFiScanResult};

/// "AA:BB:CC:DD:EE:FF"
pub type MacString = String<18>;

/// Maximum size of one serialized report line
pub const MAX_REPORT_LEN: usize = 384;

pub type ReportBuffer = Vec<u8, MAX_REPORT_LEN>;

/// Reports emitted by the controller
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Report<'a> {
    /// One newly observed network
    #[serde(rename = "wifi")]
    Network {
        /// Reporting subordinate
        node: u8,
        mac: &'a MacString,
        ssid: &'a str,
        rssi: i8,
        ch: u8,
        band: &'static str,
        /// WiGLE-style authentication label
        auth: &'static str,
        /// Subordinate uptime in milliseconds at capture
        ts: u32,
        lat: f32,
        lon: f32,
        alt: f32,
        /// Estimated horizontal accuracy in metres (0 without a fix)
        acc: f32,
    },
    /// Outcome of the discovery phase
    #[serde(rename = "discovery")]
    Discovery {
        count: u8,
        /// Address of the node that reported itself as chain end
        #[serde(skip_serializing_if = "Option::is_none")]
        last: Option<u8>,
        complete: bool,
    },
    /// A subordinate's STATUS reply
    #[serde(rename = "status")]
    Status {
        node: u8,
        state: u8,
        ch: u8,
        scans: u16,
        results: u16,
        /// Seconds
        uptime: u32,
        err: u8,
        heap: u8,
    },
    /// Periodic controller statistics
    #[serde(rename = "stats")]
    Stats {
        networks: u32,
        active: u8,
        /// Seconds
        uptime: u32,
    },
}

impl Report<'_> {
    pub fn status(node: Address, status: &StatusInfo) -> Self {
        Report::Status {
            node: node.raw(),
            state: status.state as u8,
            ch: status.channel,
            scans: status.scan_count,
            results: status.result_count,
            uptime: status.uptime,
            err: status.last_error as u8,
            heap: status.free_heap,
        }
    }
}

/// Serialize a report as one NDJSON line into `buf`.
/// Returns the number of bytes written, or None if the line, newline
/// included, does not fit.
pub fn serialize_report(report: &Report<'_>, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(report, buf).ok()?;
    // Append newline for NDJSON
    *buf.get_mut(len)? = b'\n';
    Some(len + 1)
}

/// Serialize a collected record as one NDJSON line.
pub fn serialize_network(source: Address, record: &WiFiScanResult, buf: &mut [u8]) -> Option<usize> {
    let mut mac = MacString::new();
    format_mac(&record.bssid, &mut mac);
    let report = Report::Network {
        node: source.raw(),
        mac: &mac,
        ssid: record.ssid.as_str(),
        rssi: record.rssi,
        ch: record.channel,
        band: record.band.as_str(),
        auth: auth_label(record.auth_mode),
        ts: record.timestamp,
        lat: record.latitude,
        lon: record.longitude,
        alt: record.altitude,
        acc: gps_accuracy_m(record.gps_quality),
    };
    serialize_report(&report, buf)
}

pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

/// WiGLE label for an ESP-IDF `wifi_auth_mode_t`
pub fn auth_label(auth_mode: u8) -> &'static str {
    match auth_mode {
        0 => "[Open]",
        1 => "[WEP]",
        2 => "[WPA]",
        3 | 4 => "[WPA2]",
        5 => "[WPA2-EAP]",
        6 | 7 => "[WPA3]",
        8 => "[WAPI]",
        _ => "[Unknown]",
    }
}

/// Rough horizontal accuracy for a fix quality: GPS ~15 m, DGPS ~3 m.
pub fn gps_accuracy_m(fix_quality: u8) -> f32 {
    match fix_quality {
        0 => 0.0,
        1 => 15.0,
        _ => 3.0,
    }
}
