//! In-memory serial ports and a manual clock for single-threaded unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use crate::comm::{Clock, SerialPort};
use crate::frame::{self, Message};

/// Clock that only moves when told to (or when a mock read times out).
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.0.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

type Queue = Rc<RefCell<VecDeque<u8>>>;

/// One end of a mock link, handed to the code under test.
pub struct MockPort {
    rx: Queue,
    tx: Queue,
    clock: ManualClock,
}

/// The test's end of the same link: injects inbound frames, inspects outbound.
#[derive(Clone)]
pub struct Peer {
    rx: Queue,
    tx: Queue,
}

impl MockPort {
    pub fn new(clock: &ManualClock) -> (Self, Peer) {
        let rx = Queue::default();
        let tx = Queue::default();
        let port = Self {
            rx: rx.clone(),
            tx: tx.clone(),
            clock: clock.clone(),
        };
        (port, Peer { rx, tx })
    }
}

impl SerialPort for MockPort {
    type Error = Infallible;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Infallible> {
        self.tx.borrow_mut().extend(bytes.iter().copied());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Infallible> {
        let mut rx = self.rx.borrow_mut();
        if rx.is_empty() {
            self.clock.advance(timeout_ms);
            return Ok(0);
        }
        let n = buf.len().min(rx.len());
        for slot in &mut buf[..n] {
            *slot = rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Peer {
    pub fn inject(&self, msg: &Message) {
        let frame = msg.encode().unwrap();
        self.inject_bytes(&frame);
    }

    pub fn inject_bytes(&self, bytes: &[u8]) {
        self.rx.borrow_mut().extend(bytes.iter().copied());
    }

    /// Decode and remove every frame written so far.
    pub fn take_sent(&self) -> Vec<Message> {
        let bytes: Vec<u8> = self.tx.borrow_mut().drain(..).collect();
        let mut out = Vec::new();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            let len = frame::declared_payload_len(rest).unwrap() + 10;
            out.push(frame::decode(&rest[..len]).unwrap());
            rest = &rest[len..];
        }
        out
    }
}
