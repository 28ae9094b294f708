//! UART and clock implementations of the library's transport traits.

use std::thread;
use std::time::{Duration, Instant};

use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{config::Config, Uart, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;

use scanchain::comm::{Clock, SerialPort, SERIAL_BAUD};

/// One chain link on a hardware UART, 8N1.
pub struct UartPort {
    driver: UartDriver<'static>,
}

impl UartPort {
    pub fn new(
        uart: impl Peripheral<P = impl Uart> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
    ) -> Result<Self, EspError> {
        let config = Config::default().baudrate(Hertz(SERIAL_BAUD));
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        Ok(Self { driver })
    }
}

impl SerialPort for UartPort {
    type Error = EspError;

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), EspError> {
        while !bytes.is_empty() {
            let n = self.driver.write(bytes)?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, EspError> {
        self.driver
            .read(buf, TickType::new_millis(timeout_ms as u64).ticks())
    }
}

/// Milliseconds since boot.
#[derive(Clone, Copy)]
pub struct EspClock {
    boot: Instant,
}

impl EspClock {
    pub fn new() -> Self {
        Self { boot: Instant::now() }
    }
}

impl Clock for EspClock {
    fn now_ms(&self) -> u32 {
        (self.boot.elapsed().as_millis() & 0xFFFF_FFFF) as u32
    }

    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}
