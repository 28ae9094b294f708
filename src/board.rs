/// Pin assignments for the two node roles.
///
/// Both roles run on the same ESP32-C5 module; the feature flag picks which
/// UARTs are wired to chain neighbours.

#[cfg(all(feature = "board-controller", feature = "board-subordinate"))]
compile_error!("select exactly one of `board-controller` or `board-subordinate`");

#[cfg(feature = "board-controller")]
mod hw {
    /// Link toward subordinate #1
    pub const DOWNSTREAM_UART: u8 = 1;
    pub const DOWNSTREAM_TX_PIN: u8 = 17;
    pub const DOWNSTREAM_RX_PIN: u8 = 16;
    pub const LED_PIN: u8 = 2;
    pub const HAS_UPSTREAM: bool = false;
    pub const BOARD_NAME: &str = "scanchain_controller";
}

#[cfg(feature = "board-subordinate")]
mod hw {
    /// Link toward the controller
    pub const UPSTREAM_UART: u8 = 1;
    pub const UPSTREAM_TX_PIN: u8 = 21;
    pub const UPSTREAM_RX_PIN: u8 = 20;
    /// Link toward the next subordinate
    pub const DOWNSTREAM_UART: u8 = 2;
    pub const DOWNSTREAM_TX_PIN: u8 = 17;
    pub const DOWNSTREAM_RX_PIN: u8 = 16;
    pub const LED_PIN: u8 = 2;
    pub const HAS_UPSTREAM: bool = true;
    pub const BOARD_NAME: &str = "scanchain_subordinate";
}

#[cfg(not(any(feature = "board-controller", feature = "board-subordinate")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
