/// Node state shared between the link task and the scan task.
///
/// The identity is written once by discovery (on the link task) and read by
/// both tasks, so plain atomics suffice. Everything the scan task and the
/// command handler both mutate lives in `ScanSession` behind a
/// critical-section mutex; no lock is held across a radio scan or a send.
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use critical_section::Mutex;

use crate::defaults::{DEFAULT_SCAN_PARAMS, RESULT_CAPACITY, SEEN_CAPACITY};
use crate::protocol::{Address, ErrorCode, GpsPosition, ScanParams, StatusInfo, SubordinateState};
use crate::seen::{ResultBuffer, SeenSet};

// ── Identity ────────────────────────────────────────────────────────────

pub struct Identity {
    address: AtomicU8,
    chain_end: AtomicBool,
}

impl Identity {
    pub const fn new() -> Self {
        Self {
            address: AtomicU8::new(Address::UNASSIGNED.raw()),
            chain_end: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> Address {
        Address(self.address.load(Ordering::Acquire))
    }

    pub fn is_assigned(&self) -> bool {
        self.address() != Address::UNASSIGNED
    }

    /// Adopt `address` if none is held yet. Returns false, changing nothing,
    /// when the node already has an address.
    pub fn claim(&self, address: Address) -> bool {
        self.address
            .compare_exchange(
                Address::UNASSIGNED.raw(),
                address.raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_chain_end(&self) -> bool {
        self.chain_end.load(Ordering::Acquire)
    }

    pub fn set_chain_end(&self, chain_end: bool) {
        self.chain_end.store(chain_end, Ordering::Release);
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

// ── Scan session ────────────────────────────────────────────────────────

pub struct ScanSession {
    pub params: ScanParams,
    pub scanning: bool,
    pub status: StatusInfo,
    pub seen: SeenSet<SEEN_CAPACITY>,
    pub results: ResultBuffer<RESULT_CAPACITY>,
    /// Latest position from GPS_UPDATE
    pub gps: Option<GpsPosition>,
    /// Start of the last scan; `None` makes the next cycle due at once
    pub last_scan_ms: Option<u32>,
    /// Records sent by the last GET_SCAN_RESULTS, pending CLEAR_RESULTS
    pub delivered: usize,
}

impl ScanSession {
    pub const fn new() -> Self {
        let mut status = StatusInfo::new();
        status.channel = DEFAULT_SCAN_PARAMS.channel;
        status.band = DEFAULT_SCAN_PARAMS.band;
        Self {
            params: DEFAULT_SCAN_PARAMS,
            scanning: false,
            status,
            seen: SeenSet::new(),
            results: ResultBuffer::new(),
            gps: None,
            last_scan_ms: None,
            delivered: 0,
        }
    }

    pub fn set_params(&mut self, params: ScanParams) {
        self.params = params;
        self.status.channel = params.channel;
        self.status.band = params.band;
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.params.channel = channel;
        self.status.channel = channel;
    }

    pub fn start(&mut self) {
        if !self.scanning {
            self.scanning = true;
            self.last_scan_ms = None;
        }
        self.status.state = SubordinateState::Scanning;
    }

    pub fn stop(&mut self) {
        self.scanning = false;
        self.status.state = SubordinateState::Idle;
    }

    /// Drop the records delivered by the last collection.
    pub fn clear_delivered(&mut self) {
        self.results.drain_front(self.delivered);
        self.delivered = 0;
        self.status.result_count = self.results.len() as u16;
    }

    /// Back to power-on state. The node's address lives in `Identity` and
    /// is untouched.
    pub fn reset(&mut self) {
        self.stop();
        self.set_params(DEFAULT_SCAN_PARAMS);
        self.seen.clear();
        self.results.clear();
        self.gps = None;
        self.last_scan_ms = None;
        self.delivered = 0;
        self.status.result_count = 0;
        self.status.last_error = ErrorCode::None;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

// ── Node context ────────────────────────────────────────────────────────

pub struct NodeContext {
    pub identity: Identity,
    session: Mutex<RefCell<ScanSession>>,
}

impl NodeContext {
    pub const fn new() -> Self {
        Self {
            identity: Identity::new(),
            session: Mutex::new(RefCell::new(ScanSession::new())),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut ScanSession) -> R) -> R {
        critical_section::with(|cs| f(&mut self.session.borrow_ref_mut(cs)))
    }
}

impl Default for NodeContext {
    fn default() -> Self {
        Self::new()
    }
}
