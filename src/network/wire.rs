//! Bounds-checked big-endian primitives.
//!
//! Every read checks the remaining length first and reports which field was
//! short, so a truncated frame can never read past its buffer.

use crate::network::codec::{CodecError, CodecResult, WireField};

/// Cursor over an inbound byte slice.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Consumes exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize, field: WireField) -> CodecResult<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(CodecError::Truncated {
                field,
                needed: len,
                remaining,
            });
        }
        let start = self.pos;
        let end = start + len;
        let bytes = self.buf.get(start..end).ok_or(CodecError::Truncated {
            field,
            needed: len,
            remaining,
        })?;
        self.pos = end;
        Ok(bytes)
    }

    /// Consumes everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.buf.get(self.pos..).unwrap_or_default();
        self.pos = self.buf.len();
        rest
    }

    fn read_array<const N: usize>(&mut self, field: WireField) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self, field: WireField) -> CodecResult<u8> {
        self.read_array::<1>(field).map(|[b]| b)
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self, field: WireField) -> CodecResult<u16> {
        self.read_array(field).map(u16::from_be_bytes)
    }

    /// Reads a big-endian `i16`.
    pub fn read_i16(&mut self, field: WireField) -> CodecResult<i16> {
        self.read_array(field).map(i16::from_be_bytes)
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self, field: WireField) -> CodecResult<u32> {
        self.read_array(field).map(u32::from_be_bytes)
    }

    /// Reads an optional `u16`: `None` when fewer than two bytes remain.
    pub fn read_u16_opt(&mut self, field: WireField) -> Option<u16> {
        (self.remaining() >= 2)
            .then(|| self.read_u16(field).ok())
            .flatten()
    }

    /// Reads an optional `u8`: `None` when no bytes remain.
    pub fn read_u8_opt(&mut self, field: WireField) -> Option<u8> {
        (self.remaining() >= 1)
            .then(|| self.read_u8(field).ok())
            .flatten()
    }
}

/// Growable big-endian output buffer.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends a big-endian `u16`.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a big-endian `i16`.
    pub fn put_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a big-endian `u32`.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xFF, 0xFE, 0x01];
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u32(WireField::ContainerId).unwrap(), 0x1234_5678);
        assert_eq!(r.read_i16(WireField::X).unwrap(), -2);
        assert_eq!(r.read_u8(WireField::PropertyId).unwrap(), 1);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.position(), 7);
    }

    #[test]
    fn short_read_reports_field_and_does_not_advance() {
        let bytes = [0x00, 0x01, 0x02];
        let mut r = WireReader::new(&bytes);
        let err = r.read_u32(WireField::ElementId).unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                field: WireField::ElementId,
                needed: 4,
                remaining: 3
            }
        );
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u16(WireField::Hue).unwrap(), 1);
    }

    #[test]
    fn optional_reads_stop_at_end() {
        let bytes = [0x00];
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u16_opt(WireField::Hue), None);
        assert_eq!(r.read_u8_opt(WireField::Font), Some(0));
        assert_eq!(r.read_u8_opt(WireField::Font), None);
    }

    #[test]
    fn writer_round_trips_through_reader() {
        let mut w = WireWriter::with_capacity(11);
        w.put_u32(7);
        w.put_i16(-20);
        w.put_u16(9270);
        w.put_u8(1);
        w.put_bytes(b"ab");
        assert_eq!(w.len(), 11);
        let bytes = w.into_inner();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u32(WireField::ElementId).unwrap(), 7);
        assert_eq!(r.read_i16(WireField::Y).unwrap(), -20);
        assert_eq!(r.read_u16(WireField::Graphic).unwrap(), 9270);
        assert_eq!(r.read_u8(WireField::Visible).unwrap(), 1);
        assert_eq!(r.read_rest(), b"ab");
    }
}
