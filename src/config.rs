/// Runtime-tunable protocol timing.
///
/// Firmware uses the defaults; host tests shrink the long dwell and settle
/// times so a whole discovery and collection cycle fits in a few seconds.
use crate::defaults::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Subordinate wait for its downstream neighbour's acknowledgment
    pub assignment_timeout_ms: u32,
    /// Controller time in AutoDiscovering
    pub discovery_dwell_ms: u32,
    /// Controller wait between configuring and starting the scan
    pub configure_settle_ms: u32,
    /// Outstanding poll lifetime
    pub poll_timeout_ms: u32,
    /// Per-call receive timeout for link polling
    pub link_poll_ms: u32,
    pub configure_spacing_ms: u32,
    pub start_spacing_ms: u32,
    pub result_spacing_ms: u32,
    pub scan_tick_ms: u32,
    pub gps_broadcast_ms: u32,
    pub stats_interval_ms: u32,
}

impl Timing {
    pub const fn new() -> Self {
        Self {
            assignment_timeout_ms: ADDRESS_ASSIGNMENT_TIMEOUT_MS,
            discovery_dwell_ms: DISCOVERY_DWELL_MS,
            configure_settle_ms: CONFIGURE_SETTLE_MS,
            poll_timeout_ms: COMMAND_TIMEOUT_MS,
            link_poll_ms: LINK_POLL_MS,
            configure_spacing_ms: CONFIGURE_SPACING_MS,
            start_spacing_ms: START_SPACING_MS,
            result_spacing_ms: RESULT_SPACING_MS,
            scan_tick_ms: SCAN_TICK_MS,
            gps_broadcast_ms: GPS_BROADCAST_MS,
            stats_interval_ms: STATS_INTERVAL_MS,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}
