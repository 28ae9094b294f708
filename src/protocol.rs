/// Binary message protocol spoken between the controller and the subordinate chain.
///
/// Every multi-byte field is little-endian. Payload structures are packed with
/// no padding, so their encoded sizes are fixed and a length mismatch is always
/// a malformed command.
use core::fmt;

use heapless::String;
use thiserror::Error;

/// Protocol version carried in every frame header
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest frame on the wire, markers included
pub const MAX_PACKET_SIZE: usize = 512;

/// start, version, dest, src, type, length (2), seq
pub const HEADER_LEN: usize = 8;

/// checksum, end
pub const FOOTER_LEN: usize = 2;

/// Largest payload a single frame can carry
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_LEN - FOOTER_LEN;

pub const START_MARKER: u8 = 0xAA;
pub const END_MARKER: u8 = 0x55;

/// Longest chain the address space can describe
pub const MAX_SUBORDINATES: u8 = 52;

/// Maximum SSID length in bytes (the wire field adds a NUL terminator)
pub const SSID_MAX_LEN: usize = 32;

pub type SsidString = String<SSID_MAX_LEN>;

/// A node address on the chain.
///
/// Subordinate addresses equal their chain position, so ordinary integer
/// ordering doubles as "closer to the controller".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u8);

impl Address {
    pub const CONTROLLER: Self = Self(0x00);
    pub const UNASSIGNED: Self = Self(0xFE);
    pub const BROADCAST: Self = Self(0xFF);
    pub const FIRST_SUBORDINATE: Self = Self(0x01);
    pub const LAST_SUBORDINATE: Self = Self(MAX_SUBORDINATES);

    /// Address of the subordinate at a one-based chain position.
    pub const fn subordinate(position: u8) -> Option<Self> {
        if position >= 1 && position <= MAX_SUBORDINATES {
            Some(Self(position))
        } else {
            None
        }
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn is_subordinate(self) -> bool {
        self.0 >= 1 && self.0 <= MAX_SUBORDINATES
    }

    /// Zero-based index into per-subordinate tables.
    pub const fn index(self) -> Option<usize> {
        if self.is_subordinate() {
            Some(self.0 as usize - 1)
        } else {
            None
        }
    }

    /// The address granted to the next node down the chain.
    pub const fn next(self) -> Option<Self> {
        Self::subordinate(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::CONTROLLER => f.write_str("controller"),
            Self::UNASSIGNED => f.write_str("unassigned"),
            Self::BROADCAST => f.write_str("broadcast"),
            Self(a) => write!(f, "#{a:02}"),
        }
    }
}

/// Commands (controller to subordinate, and the discovery cascade)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Ping = 0x01,
    AssignAddress = 0x02,
    GpsUpdate = 0x03,
    SetScanParams = 0x10,
    StartScan = 0x11,
    StopScan = 0x12,
    GetStatus = 0x13,
    SetChannel = 0x14,
    GetScanResults = 0x15,
    ClearResults = 0x16,
    SetScanMode = 0x17,
    SetScanInterval = 0x18,
    Reset = 0xFF,
}

impl CommandType {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::Ping,
            0x02 => Self::AssignAddress,
            0x03 => Self::GpsUpdate,
            0x10 => Self::SetScanParams,
            0x11 => Self::StartScan,
            0x12 => Self::StopScan,
            0x13 => Self::GetStatus,
            0x14 => Self::SetChannel,
            0x15 => Self::GetScanResults,
            0x16 => Self::ClearResults,
            0x17 => Self::SetScanMode,
            0x18 => Self::SetScanInterval,
            0xFF => Self::Reset,
            _ => return None,
        })
    }

    /// Exact payload size this command must carry.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::AssignAddress => AddressAssignment::SIZE,
            Self::GpsUpdate => GpsPosition::SIZE,
            Self::SetScanParams => ScanParams::SIZE,
            Self::SetChannel | Self::SetScanMode => 1,
            Self::SetScanInterval => 2,
            Self::Ping
            | Self::StartScan
            | Self::StopScan
            | Self::GetStatus
            | Self::GetScanResults
            | Self::ClearResults
            | Self::Reset => 0,
        }
    }
}

/// Responses (subordinate to controller, plus the discovery acknowledgment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseType {
    Ack = 0x01,
    Nack = 0x02,
    AddressAssigned = 0x03,
    Status = 0x10,
    ScanResult = 0x20,
    ScanComplete = 0x21,
    Error = 0xFE,
}

impl ResponseType {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::Ack,
            0x02 => Self::Nack,
            0x03 => Self::AddressAssigned,
            0x10 => Self::Status,
            0x20 => Self::ScanResult,
            0x21 => Self::ScanComplete,
            0xFE => Self::Error,
            _ => return None,
        })
    }
}

/// Error codes carried in NACK payloads and `StatusInfo::last_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0x00,
    InvalidCommand = 0x01,
    InvalidParams = 0x02,
    Timeout = 0x03,
    Busy = 0x04,
    NotReady = 0x05,
    ScanFailed = 0x06,
    BufferFull = 0x07,
    Checksum = 0x08,
    Unknown = 0xFF,
}

impl ErrorCode {
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0x00 => Self::None,
            0x01 => Self::InvalidCommand,
            0x02 => Self::InvalidParams,
            0x03 => Self::Timeout,
            0x04 => Self::Busy,
            0x05 => Self::NotReady,
            0x06 => Self::ScanFailed,
            0x07 => Self::BufferFull,
            0x08 => Self::Checksum,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Band {
    Band2_4GHz = 0x01,
    Band5GHz = 0x02,
    Both = 0x03,
}

impl Band {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Band2_4GHz),
            0x02 => Some(Self::Band5GHz),
            0x03 => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Band2_4GHz => "2.4GHz",
            Band::Band5GHz => "5GHz",
            Band::Both => "dual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanMode {
    Active = 0x01,
    Passive = 0x02,
}

impl ScanMode {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Active),
            0x02 => Some(Self::Passive),
            _ => None,
        }
    }
}

/// Subordinate activity as reported in `StatusInfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubordinateState {
    Idle = 0x00,
    Scanning = 0x01,
    Processing = 0x02,
    Error = 0xFE,
}

impl SubordinateState {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Idle),
            0x01 => Some(Self::Scanning),
            0x02 => Some(Self::Processing),
            0xFE => Some(Self::Error),
            _ => None,
        }
    }
}

/// Payload decoding failure. Callers treat both variants as "malformed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("invalid {field} value {value:#04x}")]
    InvalidField { field: &'static str, value: u8 },
}

/// A fixed-size packed payload structure.
pub trait WirePayload: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Write the packed form into `out`, which is exactly `SIZE` bytes long.
    fn write(&self, out: &mut Writer<'_>);

    /// Read the packed form. Only called once the length is known to match.
    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError>;

    fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() != Self::SIZE {
            return Err(PayloadError::Length {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Self::read(&mut Reader::new(bytes))
    }

    /// Encode into the front of `out`, returning the number of bytes used.
    fn encode(&self, out: &mut [u8]) -> Option<usize> {
        let slot = out.get_mut(..Self::SIZE)?;
        self.write(&mut Writer::new(slot));
        Some(Self::SIZE)
    }
}

/// Little-endian field writer over a pre-sized slice.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        let end = (self.pos + data.len()).min(self.buf.len());
        let n = end - self.pos;
        self.buf[self.pos..end].copy_from_slice(&data[..n]);
        self.pos = end;
    }

    pub fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    pub fn i8(&mut self, v: i8) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.bytes(&v.to_le_bytes());
    }
}

/// Little-endian field reader over a length-checked slice.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let end = (self.pos + N).min(self.buf.len());
        let n = end - self.pos;
        out[..n].copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        out
    }

    pub fn u8(&mut self) -> u8 {
        self.array::<1>()[0]
    }

    pub fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.array())
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    pub fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.array())
    }
}

fn band_field(raw: u8) -> Result<Band, PayloadError> {
    Band::from_u8(raw).ok_or(PayloadError::InvalidField { field: "band", value: raw })
}

/// Discovery payload: carried by ASSIGN_ADDRESS and ADDRESS_ASSIGNED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressAssignment {
    pub address: Address,
    pub is_last: bool,
}

impl WirePayload for AddressAssignment {
    const SIZE: usize = 2;

    fn write(&self, out: &mut Writer<'_>) {
        out.u8(self.address.raw());
        out.u8(self.is_last as u8);
    }

    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError> {
        Ok(Self {
            address: Address(input.u8()),
            is_last: input.u8() != 0,
        })
    }
}

/// WiFi scan configuration pushed by SET_SCAN_PARAMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub band: Band,
    /// 0 scans every channel of the band
    pub channel: u8,
    pub mode: ScanMode,
    /// Dwell per channel
    pub scan_time_ms: u16,
    /// Delay between scan cycles
    pub interval_ms: u16,
    pub hidden: bool,
    pub show_hidden: bool,
}

impl WirePayload for ScanParams {
    const SIZE: usize = 9;

    fn write(&self, out: &mut Writer<'_>) {
        out.u8(self.band as u8);
        out.u8(self.channel);
        out.u8(self.mode as u8);
        out.u16(self.scan_time_ms);
        out.u16(self.interval_ms);
        out.u8(self.hidden as u8);
        out.u8(self.show_hidden as u8);
    }

    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError> {
        let band = band_field(input.u8())?;
        let channel = input.u8();
        let raw_mode = input.u8();
        let mode = ScanMode::from_u8(raw_mode).ok_or(PayloadError::InvalidField {
            field: "scan mode",
            value: raw_mode,
        })?;
        Ok(Self {
            band,
            channel,
            mode,
            scan_time_ms: input.u16(),
            interval_ms: input.u16(),
            hidden: input.u8() != 0,
            show_hidden: input.u8() != 0,
        })
    }
}

/// One newly observed network, as reported by SCAN_RESULT
#[derive(Debug, Clone, PartialEq)]
pub struct WiFiScanResult {
    pub bssid: [u8; 6],
    pub ssid: SsidString,
    pub rssi: i8,
    pub channel: u8,
    pub band: Band,
    /// Raw ESP-IDF `wifi_auth_mode_t`
    pub auth_mode: u8,
    /// Subordinate uptime in milliseconds at capture
    pub timestamp: u32,
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub gps_quality: u8,
}

impl WirePayload for WiFiScanResult {
    const SIZE: usize = 60;

    fn write(&self, out: &mut Writer<'_>) {
        out.bytes(&self.bssid);
        let mut ssid = [0u8; SSID_MAX_LEN + 1];
        ssid[..self.ssid.len()].copy_from_slice(self.ssid.as_bytes());
        out.bytes(&ssid);
        out.i8(self.rssi);
        out.u8(self.channel);
        out.u8(self.band as u8);
        out.u8(self.auth_mode);
        out.u32(self.timestamp);
        out.f32(self.latitude);
        out.f32(self.longitude);
        out.f32(self.altitude);
        out.u8(self.gps_quality);
    }

    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError> {
        let bssid = input.array::<6>();
        let raw_ssid = input.array::<{ SSID_MAX_LEN + 1 }>();
        let rssi = input.i8();
        let channel = input.u8();
        let band = band_field(input.u8())?;
        Ok(Self {
            bssid,
            ssid: ssid_from_bytes(&raw_ssid),
            rssi,
            channel,
            band,
            auth_mode: input.u8(),
            timestamp: input.u32(),
            latitude: input.f32(),
            longitude: input.f32(),
            altitude: input.f32(),
            gps_quality: input.u8(),
        })
    }
}

/// Build an SSID from raw radio bytes: stops at the first NUL, keeps at most
/// 32 bytes and cuts at the last valid UTF-8 boundary.
pub fn ssid_from_bytes(raw: &[u8]) -> SsidString {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let bytes = &raw[..end.min(SSID_MAX_LEN)];
    let valid = match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
    };
    let mut ssid = SsidString::new();
    let _ = ssid.push_str(valid);
    ssid
}

/// Position fix broadcast by the controller with GPS_UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsPosition {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub satellites: u8,
    /// 0 = no fix, 1 = GPS, 2 = DGPS
    pub fix_quality: u8,
    pub timestamp: u32,
}

impl GpsPosition {
    pub const NONE: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
        altitude: 0.0,
        satellites: 0,
        fix_quality: 0,
        timestamp: 0,
    };

    pub fn has_fix(&self) -> bool {
        self.fix_quality > 0
    }
}

impl WirePayload for GpsPosition {
    const SIZE: usize = 18;

    fn write(&self, out: &mut Writer<'_>) {
        out.f32(self.latitude);
        out.f32(self.longitude);
        out.f32(self.altitude);
        out.u8(self.satellites);
        out.u8(self.fix_quality);
        out.u32(self.timestamp);
    }

    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError> {
        Ok(Self {
            latitude: input.f32(),
            longitude: input.f32(),
            altitude: input.f32(),
            satellites: input.u8(),
            fix_quality: input.u8(),
            timestamp: input.u32(),
        })
    }
}

/// Reply to GET_STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    pub state: SubordinateState,
    pub channel: u8,
    pub band: Band,
    pub scan_count: u16,
    pub result_count: u16,
    /// Seconds since boot
    pub uptime: u32,
    pub last_error: ErrorCode,
    /// Free heap as a percentage
    pub free_heap: u8,
}

impl StatusInfo {
    pub const fn new() -> Self {
        Self {
            state: SubordinateState::Idle,
            channel: 0,
            band: Band::Band5GHz,
            scan_count: 0,
            result_count: 0,
            uptime: 0,
            last_error: ErrorCode::None,
            free_heap: 100,
        }
    }
}

impl Default for StatusInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl WirePayload for StatusInfo {
    const SIZE: usize = 13;

    fn write(&self, out: &mut Writer<'_>) {
        out.u8(self.state as u8);
        out.u8(self.channel);
        out.u8(self.band as u8);
        out.u16(self.scan_count);
        out.u16(self.result_count);
        out.u32(self.uptime);
        out.i8(self.last_error as u8 as i8);
        out.u8(self.free_heap);
    }

    fn read(input: &mut Reader<'_>) -> Result<Self, PayloadError> {
        let raw_state = input.u8();
        let state = SubordinateState::from_u8(raw_state).ok_or(PayloadError::InvalidField {
            field: "state",
            value: raw_state,
        })?;
        let channel = input.u8();
        let band = band_field(input.u8())?;
        Ok(Self {
            state,
            channel,
            band,
            scan_count: input.u16(),
            result_count: input.u16(),
            uptime: input.u32(),
            last_error: ErrorCode::from_u8(input.i8() as u8),
            free_heap: input.u8(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vec<P: WirePayload>(p: &P) -> std::vec::Vec<u8> {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let n = p.encode(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    // ── Addresses ───────────────────────────────────────────────────

    #[test]
    fn address_ranges() {
        assert!(!Address::CONTROLLER.is_subordinate());
        assert!(Address(1).is_subordinate());
        assert!(Address(52).is_subordinate());
        assert!(!Address(53).is_subordinate());
        assert!(!Address::UNASSIGNED.is_subordinate());
        assert_eq!(Address::subordinate(0), None);
        assert_eq!(Address(1).index(), Some(0));
        assert_eq!(Address(52).next(), None);
        assert_eq!(Address::CONTROLLER.next(), Some(Address(1)));
    }

    #[test]
    fn max_payload_size_matches_packet_budget() {
        assert_eq!(MAX_PAYLOAD_SIZE, 502);
    }

    // ── Type codes ──────────────────────────────────────────────────

    #[test]
    fn command_codes_round_trip() {
        for raw in 0..=u8::MAX {
            if let Some(cmd) = CommandType::from_u8(raw) {
                assert_eq!(cmd as u8, raw);
            }
        }
        assert_eq!(CommandType::from_u8(0x04), None);
        assert_eq!(CommandType::from_u8(0xFF), Some(CommandType::Reset));
    }

    #[test]
    fn response_codes_round_trip() {
        for raw in 0..=u8::MAX {
            if let Some(resp) = ResponseType::from_u8(raw) {
                assert_eq!(resp as u8, raw);
            }
        }
        assert_eq!(ResponseType::from_u8(0x20), Some(ResponseType::ScanResult));
    }

    #[test]
    fn command_payload_lengths() {
        assert_eq!(CommandType::SetScanParams.payload_len(), 9);
        assert_eq!(CommandType::AssignAddress.payload_len(), 2);
        assert_eq!(CommandType::GpsUpdate.payload_len(), 18);
        assert_eq!(CommandType::SetScanInterval.payload_len(), 2);
        assert_eq!(CommandType::GetScanResults.payload_len(), 0);
    }

    // ── Payload layouts ─────────────────────────────────────────────

    #[test]
    fn scan_params_layout_is_packed_little_endian() {
        let params = ScanParams {
            band: Band::Band5GHz,
            channel: 36,
            mode: ScanMode::Active,
            scan_time_ms: 120,
            interval_ms: 1000,
            hidden: true,
            show_hidden: false,
        };
        let bytes = encode_vec(&params);
        assert_eq!(bytes, [0x02, 36, 0x01, 120, 0, 0xE8, 0x03, 1, 0]);
        assert_eq!(ScanParams::decode(&bytes), Ok(params));
    }

    #[test]
    fn scan_params_rejects_short_payload() {
        let err = ScanParams::decode(&[0x02, 36, 0x01, 120, 0, 0xE8]).unwrap_err();
        assert_eq!(err, PayloadError::Length { expected: 9, actual: 6 });
    }

    #[test]
    fn scan_params_rejects_unknown_mode() {
        let err = ScanParams::decode(&[0x02, 36, 0x07, 120, 0, 0xE8, 0x03, 1, 0]).unwrap_err();
        assert_eq!(err, PayloadError::InvalidField { field: "scan mode", value: 7 });
    }

    #[test]
    fn scan_result_is_sixty_bytes() {
        let result = WiFiScanResult {
            bssid: [0xB4, 0x1E, 0x52, 0xAB, 0xCD, 0xEF],
            ssid: SsidString::try_from("corner-cafe").unwrap(),
            rssi: -67,
            channel: 149,
            band: Band::Band5GHz,
            auth_mode: 3,
            timestamp: 123_456,
            latitude: 47.6062,
            longitude: -122.3321,
            altitude: 56.0,
            gps_quality: 1,
        };
        let bytes = encode_vec(&result);
        assert_eq!(bytes.len(), 60);
        assert_eq!(&bytes[..6], &result.bssid);
        assert_eq!(&bytes[6..17], b"corner-cafe");
        // NUL-padded SSID field
        assert!(bytes[17..39].iter().all(|&b| b == 0));
        assert_eq!(bytes[39] as i8, -67);
        assert_eq!(WiFiScanResult::decode(&bytes), Ok(result));
    }

    #[test]
    fn ssid_stops_at_nul_and_invalid_utf8() {
        assert_eq!(ssid_from_bytes(b"home\0junk").as_str(), "home");
        assert_eq!(ssid_from_bytes(&[b'o', b'k', 0xFF, b'x']).as_str(), "ok");
        let long = [b'a'; 40];
        assert_eq!(ssid_from_bytes(&long).len(), SSID_MAX_LEN);
    }

    #[test]
    fn status_info_round_trips_error_code() {
        let status = StatusInfo {
            state: SubordinateState::Scanning,
            channel: 44,
            band: Band::Band5GHz,
            scan_count: 513,
            result_count: 7,
            uptime: 3600,
            last_error: ErrorCode::Unknown,
            free_heap: 81,
        };
        let bytes = encode_vec(&status);
        assert_eq!(bytes.len(), StatusInfo::SIZE);
        assert_eq!(bytes[11] as i8, -1);
        assert_eq!(StatusInfo::decode(&bytes), Ok(status));
    }

    #[test]
    fn gps_and_assignment_sizes() {
        let fix = GpsPosition {
            latitude: 1.5,
            longitude: -2.25,
            altitude: 10.0,
            satellites: 9,
            fix_quality: 2,
            timestamp: 99,
        };
        assert_eq!(encode_vec(&fix).len(), 18);
        assert!(fix.has_fix());
        assert!(!GpsPosition::NONE.has_fix());

        let a = AddressAssignment { address: Address(3), is_last: true };
        assert_eq!(encode_vec(&a), [3, 1]);
    }

    #[test]
    fn encode_refuses_short_buffer() {
        let a = AddressAssignment { address: Address(3), is_last: false };
        assert_eq!(a.encode(&mut [0u8; 1]), None);
    }
}
