/// Transport seams between the protocol core and the platform.
///
/// The core never touches a UART or a hardware timer directly. Firmware
/// implements these traits over its drivers; tests implement them over
/// in-memory pipes and a manual clock.

/// Serial baud rate for every chain link
pub const SERIAL_BAUD: u32 = 115200;

/// A full-duplex byte channel to one neighbour.
pub trait SerialPort {
    type Error: core::fmt::Debug;

    /// Queue every byte for transmission.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read whatever has arrived, waiting at most `timeout_ms` for the first
    /// byte. Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;
}

/// Millisecond uptime source. Wraps after ~49 days; callers compare with
/// `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;

    fn delay_ms(&self, ms: u32);

    /// Milliseconds elapsed since `since`.
    fn elapsed_ms(&self, since: u32) -> u32 {
        self.now_ms().wrapping_sub(since)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<P: SerialPort + ?Sized> SerialPort for &mut P {
    type Error = P::Error;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(bytes)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        (**self).read(buf, timeout_ms)
    }
}
