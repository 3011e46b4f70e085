//! Message framing.
//!
//! ```text
//! [event u32][origin u32][tick u32][payload_size u32][payload ...]
//! ```

use bytemuck::{Pod, Zeroable};
use vanguard_core::{WireReader, WireWriter};

use super::events::{GameEvent, Reliability};
use super::payloads::Payload;
use crate::error::{ProtocolError, ProtocolResult};

/// Fixed header in front of every message. Little-endian on the wire.
///
/// Size: 16 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct MessageHeader {
    /// Numeric [`GameEvent`].
    pub event: u32,
    /// Sending connection; `0` for the server.
    pub origin: u32,
    /// Simulation tick the message was produced at.
    pub tick: u32,
    /// Bytes following the header.
    pub payload_size: u32,
}

impl MessageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 16;

    const fn swap(self) -> Self {
        Self {
            event: self.event.to_le(),
            origin: self.origin.to_le(),
            tick: self.tick.to_le(),
            payload_size: self.payload_size.to_le(),
        }
    }

    /// Wire image of the header.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        bytemuck::cast(self.swap())
    }

    /// Reads a header from the front of `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: Self = bytemuck::try_pod_read_unaligned(bytes.get(..Self::SIZE)?).ok()?;
        // to_le and from_le are the same permutation.
        Some(raw.swap())
    }
}

/// A decoded message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// What the message is.
    pub event: GameEvent,
    /// Sending connection; `0` for the server.
    pub origin: u32,
    /// Simulation tick the message was produced at.
    pub tick: u32,
    /// Event-specific bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Message with no payload.
    #[must_use]
    pub const fn new(event: GameEvent) -> Self {
        Self {
            event,
            origin: 0,
            tick: 0,
            payload: Vec::new(),
        }
    }

    /// Message carrying `payload`.
    #[must_use]
    pub fn with_payload<P: Payload>(event: GameEvent, payload: &P) -> Self {
        let mut writer = WireWriter::new();
        payload.write(&mut writer);
        Self {
            payload: writer.into_bytes(),
            ..Self::new(event)
        }
    }

    /// Sets the origin.
    #[must_use]
    pub const fn from_origin(mut self, origin: u32) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the tick.
    #[must_use]
    pub const fn at_tick(mut self, tick: u32) -> Self {
        self.tick = tick;
        self
    }

    /// Channel this message must travel on.
    #[inline]
    #[must_use]
    pub const fn reliability(&self) -> Reliability {
        self.event.reliability()
    }

    /// Serializes header and payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let header = MessageHeader {
            event: self.event as u32,
            origin: self.origin,
            tick: self.tick,
            payload_size: u32::try_from(self.payload.len()).unwrap_or(u32::MAX),
        };
        let mut bytes = Vec::with_capacity(MessageHeader::SIZE + self.payload.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses one datagram.
    ///
    /// # Errors
    ///
    /// `Truncated` below 16 bytes, `UnknownEvent` for ids outside
    /// [`GameEvent`], `SizeMismatch` if the header disagrees with the
    /// datagram length.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let header = MessageHeader::from_bytes(bytes).ok_or(ProtocolError::Truncated {
            needed: MessageHeader::SIZE,
            got: bytes.len(),
        })?;
        let event =
            GameEvent::from_u32(header.event).ok_or(ProtocolError::UnknownEvent(header.event))?;
        let payload = &bytes[MessageHeader::SIZE..];
        if header.payload_size as usize != payload.len() {
            return Err(ProtocolError::SizeMismatch {
                declared: header.payload_size,
                actual: payload.len(),
            });
        }
        Ok(Self {
            event,
            origin: header.origin,
            tick: header.tick,
            payload: payload.to_vec(),
        })
    }

    /// Parses the payload as `P`, rejecting trailing bytes.
    ///
    /// # Errors
    ///
    /// `BadPayload` if the bytes do not match the layout.
    pub fn read<P: Payload>(&self) -> ProtocolResult<P> {
        let mut reader = WireReader::new(&self.payload);
        match P::read(&mut reader) {
            Some(value) if reader.is_exhausted() => Ok(value),
            _ => Err(ProtocolError::BadPayload(self.event)),
        }
    }
}
