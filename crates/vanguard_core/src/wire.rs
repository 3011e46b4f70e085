//! # Wire Primitives
//!
//! Byte-level writer/reader used by every replicated component and by the
//! message protocol.
//!
//! ## Design
//!
//! - Scalars are little-endian
//! - Fixed-size `Pod` values are copied byte for byte
//! - Strings and collections carry a `u32` length prefix
//! - Reads return `None` on truncation, never panic

use bytemuck::{bytes_of, Pod};

use crate::ecs::Component;
use crate::memory::AssetCatalog;

/// Growable little-endian byte writer.
#[derive(Clone, Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with pre-reserved space.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning its buffer.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Resets the writer for reuse, keeping its allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a bool as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i32 in little-endian format.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytes_of(value));
    }

    /// Writes raw bytes with no prefix.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a collection length as a `u32` prefix.
    ///
    /// Lengths beyond `u32::MAX` are clamped; such payloads are never produced
    /// by the engine.
    #[inline]
    pub fn write_len(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    /// Writes a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.write_raw(bytes);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }
}

/// Cursor over a received byte buffer.
#[derive(Clone, Copy, Debug)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns true once every byte has been consumed.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_raw(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let slice = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_raw(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Some(array)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Reads a bool; any non-zero byte is `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|b| b != 0)
    }

    /// Reads a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a little-endian f32.
    #[inline]
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads a Pod type directly.
    #[inline]
    pub fn read_pod<T: Pod>(&mut self) -> Option<T> {
        let slice = self.read_raw(std::mem::size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(slice).ok()
    }

    /// Reads a `u32` collection length.
    ///
    /// A length larger than the bytes left in the buffer is rejected so a
    /// corrupt prefix cannot trigger a huge allocation.
    pub fn read_len(&mut self) -> Option<usize> {
        let len = usize::try_from(self.read_u32()?).ok()?;
        (len <= self.remaining()).then_some(len)
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Option<&'a [u8]> {
        let len = self.read_len()?;
        self.read_raw(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Option<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}

/// A component with a wire representation.
///
/// `encode` must write exactly what `decode` reads. Asset handles are never
/// sent as-is; they travel as resource names resolved through the catalog.
pub trait Replicated: Component + Sized {
    /// Appends this value's wire form to `writer`.
    fn encode(&self, writer: &mut WireWriter, assets: &dyn AssetCatalog);

    /// Parses a value from `reader`, or `None` if the bytes are malformed.
    fn decode(reader: &mut WireReader<'_>, assets: &mut dyn AssetCatalog) -> Option<Self>;
}

/// Implements [`Replicated`] for fixed-size `Pod` components as a byte copy.
///
/// ```rust,ignore
/// replicate_pod!(Velocity);
/// ```
#[macro_export]
macro_rules! replicate_pod {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::wire::Replicated for $ty {
                #[inline]
                fn encode(
                    &self,
                    writer: &mut $crate::wire::WireWriter,
                    _assets: &dyn $crate::memory::AssetCatalog,
                ) {
                    writer.write_pod(self);
                }

                #[inline]
                fn decode(
                    reader: &mut $crate::wire::WireReader<'_>,
                    _assets: &mut dyn $crate::memory::AssetCatalog,
                ) -> Option<Self> {
                    reader.read_pod()
                }
            }
        )+
    };
}
