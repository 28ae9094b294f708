/// Protocol timing, capacities and the power-on scan configuration.
///
/// Everything here is a compile-time default. `config::Timing` carries the
/// subset that tests and firmware may tune at runtime.
use crate::protocol::{Band, ScanMode, ScanParams};

// ── Timing ──────────────────────────────────────────────────────────────

/// How long a controller poll may stay unanswered
pub const COMMAND_TIMEOUT_MS: u32 = 5000;

/// Bounded wait for the downstream neighbour to acknowledge its address
pub const ADDRESS_ASSIGNMENT_TIMEOUT_MS: u32 = 1000;

/// A partial frame with no new byte for this long is discarded
pub const STALE_FRAME_TIMEOUT_MS: u32 = 100;

/// Controller dwell in AutoDiscovering before moving on
pub const DISCOVERY_DWELL_MS: u32 = 10_000;

/// Controller settle time after pushing scan parameters
pub const CONFIGURE_SETTLE_MS: u32 = 5000;

/// Spacing between consecutive SET_SCAN_PARAMS frames
pub const CONFIGURE_SPACING_MS: u32 = 20;

/// Spacing between consecutive START_SCAN frames
pub const START_SPACING_MS: u32 = 10;

/// Spacing between consecutive SCAN_RESULT frames
pub const RESULT_SPACING_MS: u32 = 10;

/// Per-call receive timeout for link polling
pub const LINK_POLL_MS: u32 = 10;

/// Subordinate scan task wake-up period
pub const SCAN_TICK_MS: u32 = 100;

/// Controller GPS_UPDATE broadcast period
pub const GPS_BROADCAST_MS: u32 = 1000;

/// Consecutive unanswered polls before a subordinate is marked offline
pub const MAX_MISSED_POLLS: u8 = 3;

/// An offline subordinate is polled on every this-many rotation visits
pub const OFFLINE_REPROBE_EVERY: u8 = 5;

/// Controller statistics log period
pub const STATS_INTERVAL_MS: u32 = 30_000;

// ── Capacities ──────────────────────────────────────────────────────────

/// Networks remembered per scanning session for duplicate suppression
pub const SEEN_CAPACITY: usize = 500;

/// Newly observed networks awaiting collection
pub const RESULT_CAPACITY: usize = 100;

/// Networks returned by one radio scan
pub const MAX_OBSERVATIONS: usize = 64;

// ── Scan configuration ──────────────────────────────────────────────────

/// Parameters a subordinate scans with until the controller says otherwise
pub const DEFAULT_SCAN_PARAMS: ScanParams = ScanParams {
    band: Band::Band5GHz,
    channel: 36,
    mode: ScanMode::Active,
    scan_time_ms: 120,
    interval_ms: 1000,
    hidden: true,
    show_hidden: true,
};

/// Base parameters the controller specializes per subordinate
pub const CONTROLLER_SCAN_PARAMS: ScanParams = ScanParams {
    channel: 0,
    ..DEFAULT_SCAN_PARAMS
};
