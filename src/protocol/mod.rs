//! Block framing used on the transport port.
//!
//! Every event payload travels as `[header:8][payload:N][footer:8]`:
//!
//! ```text
//! ┌──────┬──────┬──────────┬──────────────┐
//! │ 0xE7 │ 0xE7 │ reserved │ length       │  header
//! │ 1 B  │ 1 B  │ 2 B      │ u32 BE       │
//! ├──────┴──────┴──────────┴──────────────┤
//! │ payload (length bytes)                │
//! ├──────┬──────┬──────────┬──────────────┤
//! │ 0xCC │ 0xCC │ reserved │ sequence     │  footer
//! │ 1 B  │ 1 B  │ 2 B      │ u32 BE       │
//! └──────┴──────┴──────────┴──────────────┘
//! ```
//!
//! A block that carries no payload bytes is a heartbeat and decodes to
//! [`Decoded::Empty`].

pub mod framing;

pub use framing::{
    decode, encode, encode_with_sequence, Decoded, EventView, FrameError, FramedBlock,
    FOOTER_MAGIC, FOOTER_SIZE, HEADER_MAGIC, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
