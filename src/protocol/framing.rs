//! Header/footer codec for event blocks.

use thiserror::Error;

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Footer size in bytes (fixed, exactly 8).
pub const FOOTER_SIZE: usize = 8;

/// Magic byte repeated twice at the start of every header.
pub const HEADER_MAGIC: u8 = 0xE7;

/// Magic byte repeated twice at the start of every footer.
pub const FOOTER_MAGIC: u8 = 0xCC;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Structural problems found while decoding a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad header magic {found:02X?}")]
    BadHeaderMagic { found: [u8; 2] },

    #[error("bad footer magic {found:02X?}")]
    BadFooterMagic { found: [u8; 2] },

    #[error("header declares {declared} payload bytes, block carries {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("sequence number mismatch: expected {expected}, found {found}")]
    SequenceMismatch { expected: u32, found: u32 },
}

/// An encoded block ready to be written to a port.
#[derive(Clone, PartialEq, Eq)]
pub struct FramedBlock {
    bytes: Vec<u8>,
}

impl FramedBlock {
    /// Wrap raw bytes received from a port.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A block with no payload.
    pub fn heartbeat() -> Self {
        encode(&[])
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total length including header and footer.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload length implied by the block length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.bytes.len().saturating_sub(HEADER_SIZE + FOOTER_SIZE)
    }
}

impl std::fmt::Debug for FramedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedBlock")
            .field("len", &self.bytes.len())
            .field("payload_len", &self.payload_len())
            .finish()
    }
}

/// Borrowed view of a decoded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventView<'a> {
    pub payload: &'a [u8],
    /// Producer sequence number from the footer.
    pub sequence: u32,
}

/// Result of decoding a structurally valid block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// Heartbeat or degenerate block: nothing to process this tick.
    Empty,
    Event(EventView<'a>),
}

impl<'a> Decoded<'a> {
    pub fn payload(&self) -> Option<&'a [u8]> {
        match self {
            Decoded::Empty => None,
            Decoded::Event(view) => Some(view.payload),
        }
    }
}

/// Frame `payload` with sequence number 0.
///
/// # Panics
///
/// Panics if `payload` is longer than [`MAX_PAYLOAD_SIZE`].
pub fn encode(payload: &[u8]) -> FramedBlock {
    encode_with_sequence(payload, 0)
}

/// Frame `payload`, stamping `sequence` into the footer.
///
/// # Panics
///
/// Panics if `payload` is longer than [`MAX_PAYLOAD_SIZE`].
pub fn encode_with_sequence(payload: &[u8], sequence: u32) -> FramedBlock {
    assert!(
        payload.len() <= MAX_PAYLOAD_SIZE,
        "payload of {} bytes does not fit the length field",
        payload.len()
    );

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len() + FOOTER_SIZE);
    bytes.extend_from_slice(&header(payload.len() as u32));
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&footer(sequence));
    FramedBlock { bytes }
}

/// Validate `block` and return a view of its payload.
///
/// Blocks no longer than header + footer decode to [`Decoded::Empty`]
/// without further checks.
pub fn decode(block: &[u8]) -> Result<Decoded<'_>, FrameError> {
    if block.len() <= HEADER_SIZE + FOOTER_SIZE {
        return Ok(Decoded::Empty);
    }

    let (head, rest) = block.split_at(HEADER_SIZE);
    let (payload, tail) = rest.split_at(rest.len() - FOOTER_SIZE);

    if head[0] != HEADER_MAGIC || head[1] != HEADER_MAGIC {
        return Err(FrameError::BadHeaderMagic {
            found: [head[0], head[1]],
        });
    }

    let declared = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
    if declared as usize != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    if tail[0] != FOOTER_MAGIC || tail[1] != FOOTER_MAGIC {
        return Err(FrameError::BadFooterMagic {
            found: [tail[0], tail[1]],
        });
    }

    let sequence = u32::from_be_bytes([tail[4], tail[5], tail[6], tail[7]]);
    Ok(Decoded::Event(EventView { payload, sequence }))
}

fn header(payload_len: u32) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0] = HEADER_MAGIC;
    buf[1] = HEADER_MAGIC;
    buf[4..8].copy_from_slice(&payload_len.to_be_bytes());
    buf
}

fn footer(sequence: u32) -> [u8; FOOTER_SIZE] {
    let mut buf = [0u8; FOOTER_SIZE];
    buf[0] = FOOTER_MAGIC;
    buf[1] = FOOTER_MAGIC;
    buf[4..8].copy_from_slice(&sequence.to_be_bytes());
    buf
}
