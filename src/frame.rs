/// Frame codec for the chain's point-to-point serial links.
///
/// Layout: `[AA][ver][dst][src][type][lenLo][lenHi][seq][payload..][chk][55]`.
/// The checksum is a running XOR over everything between the start marker
/// and the checksum byte itself.
use heapless::Vec;
use thiserror::Error;

use crate::protocol::{
    Address, CommandType, ResponseType, WirePayload, PayloadError, END_MARKER, FOOTER_LEN,
    HEADER_LEN, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, START_MARKER,
};

/// Bounded payload buffer
pub type Payload = Vec<u8, MAX_PAYLOAD_SIZE>;

/// One encoded frame, ready for the wire
pub type FrameBuffer = Vec<u8, MAX_PACKET_SIZE>;

/// Offset of the little-endian payload length inside the header
const LENGTH_OFFSET: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),
    #[error("output buffer too small for a {0}-byte frame")]
    BufferTooSmall(usize),
    #[error("frame truncated at {0} bytes")]
    Truncated(usize),
    #[error("missing start marker")]
    BadStartMarker,
    #[error("bad end marker {0:#04x}")]
    BadEndMarker(u8),
    #[error("declared payload length {declared} exceeds the frame limit")]
    Oversized { declared: usize },
    #[error("frame is {actual} bytes but header declares {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("checksum mismatch: computed {expected:#04x}, frame carries {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
}

/// How a frame's type byte is to be read.
///
/// The wire carries a single type byte, and command and response codes
/// overlap. A frame is a command when it comes from the controller or is
/// addressed to an unassigned node; everything else is a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Command(CommandType),
    Response(ResponseType),
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub destination: Address,
    pub source: Address,
    pub type_code: u8,
    pub sequence: u8,
    pub payload: Payload,
}

impl Message {
    pub fn new(destination: Address, source: Address, type_code: u8, sequence: u8) -> Self {
        Self {
            destination,
            source,
            type_code,
            sequence,
            payload: Payload::new(),
        }
    }

    pub fn command(destination: Address, source: Address, command: CommandType, sequence: u8) -> Self {
        Self::new(destination, source, command as u8, sequence)
    }

    pub fn response(destination: Address, source: Address, response: ResponseType, sequence: u8) -> Self {
        Self::new(destination, source, response as u8, sequence)
    }

    /// Attach raw payload bytes.
    pub fn with_bytes(mut self, bytes: &[u8]) -> Result<Self, FrameError> {
        self.payload = Payload::from_slice(bytes).map_err(|_| FrameError::PayloadTooLarge(bytes.len()))?;
        Ok(self)
    }

    /// Attach a packed payload structure.
    pub fn with_payload<P: WirePayload>(mut self, payload: &P) -> Result<Self, FrameError> {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let len = payload.encode(&mut buf).ok_or(FrameError::PayloadTooLarge(P::SIZE))?;
        self.payload = Payload::from_slice(&buf[..len]).map_err(|_| FrameError::PayloadTooLarge(len))?;
        Ok(self)
    }

    pub fn kind(&self) -> MessageKind {
        let as_command = self.source == Address::CONTROLLER || self.destination == Address::UNASSIGNED;
        if as_command {
            CommandType::from_u8(self.type_code).map_or(MessageKind::Unknown(self.type_code), MessageKind::Command)
        } else {
            ResponseType::from_u8(self.type_code).map_or(MessageKind::Unknown(self.type_code), MessageKind::Response)
        }
    }

    pub fn decode_payload<P: WirePayload>(&self) -> Result<P, PayloadError> {
        P::decode(&self.payload)
    }

    /// Total encoded size of this message.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + FOOTER_LEN
    }

    /// Encode into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.payload.len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge(len));
        }
        let total = self.frame_len();
        let out = out.get_mut(..total).ok_or(FrameError::BufferTooSmall(total))?;

        let [len_lo, len_hi] = (len as u16).to_le_bytes();
        out[..HEADER_LEN].copy_from_slice(&[
            START_MARKER,
            PROTOCOL_VERSION,
            self.destination.raw(),
            self.source.raw(),
            self.type_code,
            len_lo,
            len_hi,
            self.sequence,
        ]);
        out[HEADER_LEN..HEADER_LEN + len].copy_from_slice(&self.payload);
        out[total - 2] = checksum(&out[1..total - 2]);
        out[total - 1] = END_MARKER;
        Ok(total)
    }

    pub fn encode(&self) -> Result<FrameBuffer, FrameError> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let n = self.encode_into(&mut buf)?;
        FrameBuffer::from_slice(&buf[..n]).map_err(|_| FrameError::BufferTooSmall(n))
    }
}

/// XOR of every byte in `covered`.
pub fn checksum(covered: &[u8]) -> u8 {
    covered.iter().fold(0, |acc, b| acc ^ b)
}

/// Declared payload length from a partial frame, once the length bytes are in.
pub fn declared_payload_len(partial: &[u8]) -> Option<usize> {
    let lo = *partial.get(LENGTH_OFFSET)?;
    let hi = *partial.get(LENGTH_OFFSET + 1)?;
    Some(u16::from_le_bytes([lo, hi]) as usize)
}

/// Validate and decode exactly one frame.
pub fn decode(bytes: &[u8]) -> Result<Message, FrameError> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(FrameError::Truncated(bytes.len()));
    }
    if bytes[0] != START_MARKER {
        return Err(FrameError::BadStartMarker);
    }
    let declared = declared_payload_len(bytes).ok_or(FrameError::Truncated(bytes.len()))?;
    if declared > MAX_PAYLOAD_SIZE {
        return Err(FrameError::Oversized { declared });
    }
    let total = HEADER_LEN + declared + FOOTER_LEN;
    if bytes.len() != total {
        return Err(FrameError::LengthMismatch {
            expected: total,
            actual: bytes.len(),
        });
    }
    let end = bytes[total - 1];
    if end != END_MARKER {
        return Err(FrameError::BadEndMarker(end));
    }
    let expected = checksum(&bytes[1..total - 2]);
    let actual = bytes[total - 2];
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }

    // Version is carried but not negotiated.
    let mut msg = Message::new(Address(bytes[2]), Address(bytes[3]), bytes[4], bytes[7]);
    msg.payload = Payload::from_slice(&bytes[HEADER_LEN..HEADER_LEN + declared])
        .map_err(|_| FrameError::Oversized { declared })?;
    Ok(msg)
}

/// Wrapping per-node sequence counter for unsolicited messages.
#[derive(Debug, Default)]
pub struct Sequence(u8);

impl Sequence {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> u8 {
        let seq = self.0;
        self.0 = self.0.wrapping_add(1);
        seq
    }
}
