//! scanchain: ESP-IDF std firmware
//!
//! Thin shell over the `scanchain` library: brings up the chain UARTs and the
//! WiFi radio, then runs the controller or subordinate role selected by Cargo
//! feature.

#[cfg(all(feature = "controller", feature = "subordinate"))]
compile_error!("select exactly one of the `controller` or `subordinate` features");

#[cfg(feature = "controller")]
mod controller;
#[cfg(feature = "subordinate")]
mod subordinate;
mod uart;
#[cfg(feature = "subordinate")]
mod wifi;

use esp_idf_svc::hal::peripherals::Peripherals;

use scanchain::board;
use scanchain::comm::SERIAL_BAUD;
use scanchain::protocol::PROTOCOL_VERSION;

use uart::{EspClock, UartPort};

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    let clock = EspClock::new();
    log::info!(
        "scanchain protocol v{} starting on {} ({} baud)",
        PROTOCOL_VERSION,
        board::BOARD_NAME,
        SERIAL_BAUD
    );

    let peripherals = Peripherals::take()?;

    // ── Controller ───────────────────────────────────────────────────

    #[cfg(feature = "controller")]
    {
        let downstream = UartPort::new(peripherals.uart1, peripherals.pins.gpio17, peripherals.pins.gpio16)?;
        log::info!(
            "Downstream link on UART{} (TX {}, RX {})",
            board::DOWNSTREAM_UART,
            board::DOWNSTREAM_TX_PIN,
            board::DOWNSTREAM_RX_PIN
        );
        controller::run(downstream, clock)
    }

    // ── Subordinate ──────────────────────────────────────────────────

    #[cfg(feature = "subordinate")]
    {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::nvs::EspDefaultNvsPartition;

        let upstream = UartPort::new(peripherals.uart1, peripherals.pins.gpio21, peripherals.pins.gpio20)?;
        let downstream = UartPort::new(peripherals.uart2, peripherals.pins.gpio17, peripherals.pins.gpio16)?;
        log::info!(
            "Upstream link on UART{} (TX {}, RX {}), downstream on UART{} (TX {}, RX {})",
            board::UPSTREAM_UART,
            board::UPSTREAM_TX_PIN,
            board::UPSTREAM_RX_PIN,
            board::DOWNSTREAM_UART,
            board::DOWNSTREAM_TX_PIN,
            board::DOWNSTREAM_RX_PIN
        );

        let sys_loop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let scanner = wifi::EspScanner::new(peripherals.modem, sys_loop, nvs)?;

        subordinate::run(upstream, downstream, scanner, clock)?;
        loop {
            std::thread::park();
        }
    }

    #[cfg(not(any(feature = "controller", feature = "subordinate")))]
    {
        let _ = (peripherals, clock);
        anyhow::bail!("no role selected: enable the `controller` or `subordinate` feature")
    }
}
