/// Per-link byte-stream reassembly and framed send.
///
/// Each physical link owns one `LinkReceiver`. Bytes are fed one at a time;
/// the receiver hunts for the start marker, learns the frame size from the
/// header, and validates the whole frame once it is complete. Every failure
/// drops the partial frame and returns to hunting.
use thiserror::Error;

use crate::comm::{Clock, SerialPort};
use crate::defaults::STALE_FRAME_TIMEOUT_MS;
use crate::frame::{self, FrameError, Message};
use crate::protocol::{FOOTER_LEN, HEADER_LEN, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, START_MARKER};

/// Which neighbour a link leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDir {
    /// Toward the controller
    Upstream,
    /// Away from the controller
    Downstream,
}

impl LinkDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkDir::Upstream => "upstream",
            LinkDir::Downstream => "downstream",
        }
    }
}

/// Receive-side counters for one link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames: u32,
    pub checksum_errors: u32,
    pub framing_errors: u32,
    pub overflows: u32,
    pub stale_timeouts: u32,
}

/// Result of feeding one byte
#[derive(Debug, PartialEq)]
pub enum Feed {
    Pending,
    Frame(Message),
    Dropped(FrameError),
}

pub struct LinkReceiver {
    buf: [u8; MAX_PACKET_SIZE],
    fill: usize,
    receiving: bool,
    expected: Option<usize>,
    last_byte_ms: u32,
    stale_after_ms: u32,
    stats: LinkStats,
}

impl LinkReceiver {
    pub const fn new() -> Self {
        Self::with_stale_timeout(STALE_FRAME_TIMEOUT_MS)
    }

    pub const fn with_stale_timeout(stale_after_ms: u32) -> Self {
        Self {
            buf: [0; MAX_PACKET_SIZE],
            fill: 0,
            receiving: false,
            expected: None,
            last_byte_ms: 0,
            stale_after_ms,
            stats: LinkStats {
                frames: 0,
                checksum_errors: 0,
                framing_errors: 0,
                overflows: 0,
                stale_timeouts: 0,
            },
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn reset(&mut self) {
        self.fill = 0;
        self.receiving = false;
        self.expected = None;
    }

    /// Drop a partial frame whose last byte is older than the stale timeout.
    /// Returns true if a frame was discarded.
    pub fn expire(&mut self, now_ms: u32) -> bool {
        if self.receiving && now_ms.wrapping_sub(self.last_byte_ms) > self.stale_after_ms {
            log::warn!("Stale partial frame dropped after {} bytes", self.fill);
            self.stats.stale_timeouts += 1;
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn feed(&mut self, byte: u8, now_ms: u32) -> Feed {
        self.expire(now_ms);

        if !self.receiving {
            if byte == START_MARKER {
                self.buf[0] = byte;
                self.fill = 1;
                self.receiving = true;
                self.last_byte_ms = now_ms;
            }
            return Feed::Pending;
        }

        if self.fill >= self.buf.len() {
            self.stats.overflows += 1;
            self.reset();
            return Feed::Dropped(FrameError::Oversized { declared: self.buf.len() });
        }
        self.buf[self.fill] = byte;
        self.fill += 1;
        self.last_byte_ms = now_ms;

        if self.expected.is_none() && self.fill == HEADER_LEN - 1 {
            // Length bytes just landed
            let declared = frame::declared_payload_len(&self.buf[..self.fill]).unwrap_or(0);
            if declared > MAX_PAYLOAD_SIZE {
                self.stats.overflows += 1;
                self.reset();
                return Feed::Dropped(FrameError::Oversized { declared });
            }
            self.expected = Some(HEADER_LEN + declared + FOOTER_LEN);
        }

        match self.expected {
            Some(total) if self.fill == total => {
                let result = frame::decode(&self.buf[..total]);
                self.reset();
                match result {
                    Ok(msg) => {
                        self.stats.frames += 1;
                        Feed::Frame(msg)
                    }
                    Err(e) => {
                        match e {
                            FrameError::Checksum { .. } => self.stats.checksum_errors += 1,
                            _ => self.stats.framing_errors += 1,
                        }
                        Feed::Dropped(e)
                    }
                }
            }
            _ => Feed::Pending,
        }
    }
}

impl Default for LinkReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("serial write failed")]
    Io,
    #[error("no link in that direction")]
    Absent,
}

const READ_CHUNK: usize = 64;

/// A serial port plus its reassembly state.
pub struct Link<P> {
    port: P,
    dir: LinkDir,
    rx: LinkReceiver,
    chunk: [u8; READ_CHUNK],
    chunk_len: usize,
    chunk_pos: usize,
}

impl<P: SerialPort> Link<P> {
    pub fn new(port: P, dir: LinkDir) -> Self {
        Self::with_receiver(port, dir, LinkReceiver::new())
    }

    pub fn with_receiver(port: P, dir: LinkDir, rx: LinkReceiver) -> Self {
        Self {
            port,
            dir,
            rx,
            chunk: [0; READ_CHUNK],
            chunk_len: 0,
            chunk_pos: 0,
        }
    }

    pub fn dir(&self) -> LinkDir {
        self.dir
    }

    pub fn stats(&self) -> LinkStats {
        self.rx.stats()
    }

    /// Encode and write one frame. Nothing is written if encoding fails.
    pub fn send(&mut self, msg: &Message) -> Result<(), LinkError> {
        let frame = msg.encode()?;
        self.port.write_all(&frame).map_err(|e| {
            log::warn!("{} write failed: {:?}", self.dir.as_str(), e);
            LinkError::Io
        })?;
        log::debug!(
            "{} tx type={:#04x} {} -> {} seq={} len={}",
            self.dir.as_str(),
            msg.type_code,
            msg.source,
            msg.destination,
            msg.sequence,
            msg.payload.len()
        );
        Ok(())
    }

    /// Return the next complete frame, waiting at most `timeout_ms`.
    ///
    /// Leftover bytes from an earlier read are consumed first, so frames that
    /// share a read are returned on successive calls in arrival order. A read
    /// that ends mid-frame is followed by further reads until the frame
    /// completes or the timeout runs out.
    pub fn poll<C: Clock>(&mut self, clock: &C, timeout_ms: u32) -> Option<Message> {
        let started = clock.now_ms();
        let mut first = true;
        loop {
            if let Some(msg) = self.drain_chunk(clock) {
                return Some(msg);
            }
            let wait = timeout_ms.saturating_sub(clock.elapsed_ms(started));
            if !first && (!self.rx.is_receiving() || wait == 0) {
                return None;
            }
            first = false;
            match self.port.read(&mut self.chunk, wait) {
                Ok(0) => {
                    self.rx.expire(clock.now_ms());
                    return None;
                }
                Ok(n) => {
                    self.chunk_len = n;
                    self.chunk_pos = 0;
                }
                Err(e) => {
                    log::warn!("{} read failed: {:?}", self.dir.as_str(), e);
                    return None;
                }
            }
        }
    }

    fn drain_chunk<C: Clock>(&mut self, clock: &C) -> Option<Message> {
        while self.chunk_pos < self.chunk_len {
            let byte = self.chunk[self.chunk_pos];
            self.chunk_pos += 1;
            match self.rx.feed(byte, clock.now_ms()) {
                Feed::Pending => {}
                Feed::Frame(msg) => {
                    log::debug!(
                        "{} rx type={:#04x} {} -> {} seq={} len={}",
                        self.dir.as_str(),
                        msg.type_code,
                        msg.source,
                        msg.destination,
                        msg.sequence,
                        msg.payload.len()
                    );
                    return Some(msg);
                }
                Feed::Dropped(e) => log::warn!("{} frame dropped: {}", self.dir.as_str(), e),
            }
        }
        None
    }
}

/// A subordinate's pair of links. The downstream port may be absent.
pub struct ChainLinks<U, D> {
    pub upstream: Link<U>,
    pub downstream: Option<Link<D>>,
}

impl<U: SerialPort, D: SerialPort> ChainLinks<U, D> {
    pub fn new(upstream: U, downstream: Option<D>) -> Self {
        Self {
            upstream: Link::new(upstream, LinkDir::Upstream),
            downstream: downstream.map(|port| Link::new(port, LinkDir::Downstream)),
        }
    }

    pub fn has_downstream(&self) -> bool {
        self.downstream.is_some()
    }

    pub fn send(&mut self, dir: LinkDir, msg: &Message) -> Result<(), LinkError> {
        match dir {
            LinkDir::Upstream => self.upstream.send(msg),
            LinkDir::Downstream => self.downstream.as_mut().ok_or(LinkError::Absent)?.send(msg),
        }
    }

    pub fn poll<C: Clock>(&mut self, dir: LinkDir, clock: &C, timeout_ms: u32) -> Option<Message> {
        match dir {
            LinkDir::Upstream => self.upstream.poll(clock, timeout_ms),
            LinkDir::Downstream => self.downstream.as_mut()?.poll(clock, timeout_ms),
        }
    }
}
