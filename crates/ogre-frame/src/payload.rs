//! Typed payload encoding.
//!
//! Fixed-width values are written back to back in the store's byte order.
//! Variable-length values (text, lists) share one list layout:
//!
//! ```text
//! [total length: u64, includes this header][element count: u64][elements ...]
//! ```
//!
//! The same helper serves text (elements are bytes), reference lists and
//! number lists, so every variable-length handler reuses one codec.

use ogre_types::Oid;

use crate::error::{FrameError, FrameResult};
use crate::order::ByteOrder;

/// Width of the list header: total length plus element count.
pub const LIST_HEADER_LEN: usize = 16;

/// Appends typed values to a payload.
#[derive(Clone, Debug)]
pub struct PayloadWriter {
    order: ByteOrder,
    bytes: Vec<u8>,
}

impl PayloadWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            bytes: Vec::new(),
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn put_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    pub fn put_i32(&mut self, value: i32) {
        self.bytes
            .extend_from_slice(&self.order.encode_u32(value as u32));
    }

    pub fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&self.order.encode_u64(value));
    }

    pub fn put_i64(&mut self, value: i64) {
        self.put_u64(value as u64);
    }

    pub fn put_f64(&mut self, value: f64) {
        self.put_u64(value.to_bits());
    }

    pub fn put_oid(&mut self, oid: Oid) {
        self.put_u64(oid.value());
    }

    /// Write a list: `f` encodes each element, the header is patched after.
    pub fn put_list<I, F>(&mut self, items: I, mut f: F) -> FrameResult<()>
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        let start = self.bytes.len();
        self.bytes.resize(start + LIST_HEADER_LEN, 0);
        let mut count: u64 = 0;
        for item in items {
            f(self, item);
            count += 1;
        }
        let total = (self.bytes.len() - start) as u64;
        if total > i64::MAX as u64 {
            self.bytes.truncate(start);
            return Err(FrameError::LengthOverflow { length: total });
        }
        self.bytes[start..start + 8].copy_from_slice(&self.order.encode_u64(total));
        self.bytes[start + 8..start + LIST_HEADER_LEN].copy_from_slice(&self.order.encode_u64(count));
        Ok(())
    }

    pub fn put_text(&mut self, text: &str) -> FrameResult<()> {
        self.put_list(text.as_bytes(), |w, b| w.bytes.push(*b))
    }

    pub fn put_oid_list(&mut self, oids: &[Oid]) -> FrameResult<()> {
        self.put_list(oids, |w, oid| w.put_oid(*oid))
    }

    pub fn put_i64_list(&mut self, values: &[i64]) -> FrameResult<()> {
        self.put_list(values, |w, v| w.put_i64(*v))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads typed values from a payload with bounds checks on every access.
#[derive(Clone, Debug)]
pub struct PayloadReader<'a> {
    order: ByteOrder,
    bytes: &'a [u8],
    position: usize,
    base_offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(order: ByteOrder, bytes: &'a [u8]) -> Self {
        Self {
            order,
            bytes,
            position: 0,
            base_offset: 0,
        }
    }

    /// Report error offsets relative to `base_offset` (e.g. the record's
    /// position in its file) instead of the payload start.
    pub fn with_base_offset(mut self, base_offset: usize) -> Self {
        self.base_offset = base_offset;
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn get_bool(&mut self) -> FrameResult<bool> {
        let offset = self.absolute();
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(FrameError::InvalidBool { offset, value }),
        }
    }

    pub fn get_i32(&mut self) -> FrameResult<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(self.order.decode_u32(raw) as i32)
    }

    pub fn get_u64(&mut self) -> FrameResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(self.order.decode_u64(raw))
    }

    pub fn get_i64(&mut self) -> FrameResult<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_f64(&mut self) -> FrameResult<f64> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    pub fn get_oid(&mut self) -> FrameResult<Oid> {
        Ok(Oid::new(self.get_u64()?))
    }

    /// Read a list header and return a view over its elements.
    pub fn get_list(&mut self) -> FrameResult<ListView<'a>> {
        let offset = self.absolute();
        let total = self.get_u64()?;
        let count = self.get_u64()?;
        if total < LIST_HEADER_LEN as u64 {
            return Err(FrameError::MalformedList {
                offset,
                reason: format!("total length {total} shorter than list header"),
            });
        }
        let body_len = usize::try_from(total - LIST_HEADER_LEN as u64).map_err(|_| {
            FrameError::MalformedList {
                offset,
                reason: format!("total length {total} not addressable"),
            }
        })?;
        let body_offset = self.absolute();
        let body = self.take(body_len)?;
        Ok(ListView {
            offset,
            count,
            reader: PayloadReader {
                order: self.order,
                bytes: body,
                position: 0,
                base_offset: body_offset,
            },
        })
    }

    pub fn get_text(&mut self) -> FrameResult<&'a str> {
        let list = self.get_list()?;
        let body = list.fixed_width_body(1)?;
        std::str::from_utf8(body).map_err(|_| FrameError::InvalidUtf8 {
            offset: list.offset,
        })
    }

    pub fn get_oid_list(&mut self) -> FrameResult<Vec<Oid>> {
        let list = self.get_list()?;
        list.fixed_width_body(8)?;
        let mut reader = list.into_reader();
        let mut oids = Vec::with_capacity(reader.remaining() / 8);
        while !reader.is_exhausted() {
            oids.push(reader.get_oid()?);
        }
        Ok(oids)
    }

    pub fn get_i64_list(&mut self) -> FrameResult<Vec<i64>> {
        let list = self.get_list()?;
        list.fixed_width_body(8)?;
        let mut reader = list.into_reader();
        let mut values = Vec::with_capacity(reader.remaining() / 8);
        while !reader.is_exhausted() {
            values.push(reader.get_i64()?);
        }
        Ok(values)
    }

    /// Skip `n` bytes without decoding them.
    pub fn skip(&mut self, n: usize) -> FrameResult<()> {
        self.take(n).map(|_| ())
    }

    fn absolute(&self) -> usize {
        self.base_offset + self.position
    }

    fn take(&mut self, n: usize) -> FrameResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(FrameError::PayloadUnderflow {
                offset: self.absolute(),
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }
}

/// A decoded list header plus a reader over exactly its elements.
#[derive(Clone, Debug)]
pub struct ListView<'a> {
    offset: usize,
    count: u64,
    reader: PayloadReader<'a>,
}

impl<'a> ListView<'a> {
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn into_reader(self) -> PayloadReader<'a> {
        self.reader
    }

    /// The element bytes, checked to hold `count` elements of `width` bytes.
    pub fn fixed_width_body(&self, width: usize) -> FrameResult<&'a [u8]> {
        let expected = (self.count as u128) * (width as u128);
        if expected != self.reader.bytes.len() as u128 {
            return Err(FrameError::MalformedList {
                offset: self.offset,
                reason: format!(
                    "{} elements of {width} bytes do not fill a {}-byte body",
                    self.count,
                    self.reader.bytes.len()
                ),
            });
        }
        Ok(self.reader.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_in_order() {
        let mut w = PayloadWriter::new(ByteOrder::Little);
        w.put_bool(true);
        w.put_i32(-5);
        w.put_i64(i64::MIN);
        w.put_f64(2.5);
        w.put_oid(Oid::new(44));
        assert_eq!(w.len(), 1 + 4 + 8 + 8 + 8);

        let mut r = PayloadReader::new(ByteOrder::Little, w.as_slice());
        assert!(r.get_bool().unwrap());
        assert_eq!(r.get_i32().unwrap(), -5);
        assert_eq!(r.get_i64().unwrap(), i64::MIN);
        assert_eq!(r.get_f64().unwrap(), 2.5);
        assert_eq!(r.get_oid().unwrap(), Oid::new(44));
        assert!(r.is_exhausted());
    }

    #[test]
    fn list_header_counts_itself() {
        let mut w = PayloadWriter::new(ByteOrder::Big);
        w.put_oid_list(&[Oid::new(1), Oid::new(2), Oid::new(3)]).unwrap();
        assert_eq!(w.len(), LIST_HEADER_LEN + 24);

        let mut r = PayloadReader::new(ByteOrder::Big, w.as_slice());
        let list = r.get_list().unwrap();
        assert_eq!(list.len(), 3);
        assert!(r.is_exhausted());
    }

    #[test]
    fn empty_list_and_text() {
        let mut w = PayloadWriter::new(ByteOrder::Little);
        w.put_text("").unwrap();
        w.put_i64_list(&[]).unwrap();
        let mut r = PayloadReader::new(ByteOrder::Little, w.as_slice());
        assert_eq!(r.get_text().unwrap(), "");
        assert!(r.get_i64_list().unwrap().is_empty());
    }

    #[test]
    fn underflow_reports_absolute_offset() {
        let data = [0u8; 4];
        let mut r = PayloadReader::new(ByteOrder::Little, &data).with_base_offset(100);
        assert_eq!(
            r.get_i64().unwrap_err(),
            FrameError::PayloadUnderflow {
                offset: 100,
                needed: 8,
                available: 4
            }
        );
    }

    #[test]
    fn invalid_bool_rejected() {
        let data = [7u8];
        let mut r = PayloadReader::new(ByteOrder::Little, &data);
        assert_eq!(
            r.get_bool().unwrap_err(),
            FrameError::InvalidBool {
                offset: 0,
                value: 7
            }
        );
    }

    #[test]
    fn list_count_must_match_body() {
        let mut w = PayloadWriter::new(ByteOrder::Little);
        w.put_u64(LIST_HEADER_LEN as u64 + 8);
        w.put_u64(2); // claims two oids, body holds one
        w.put_u64(9);
        let mut r = PayloadReader::new(ByteOrder::Little, w.as_slice());
        assert!(matches!(
            r.get_oid_list(),
            Err(FrameError::MalformedList { offset: 0, .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut w = PayloadWriter::new(ByteOrder::Little);
        w.put_list([0xFFu8, 0xFE], |w, b| w.bytes.push(b)).unwrap();
        let mut r = PayloadReader::new(ByteOrder::Little, w.as_slice());
        assert_eq!(
            r.get_text().unwrap_err(),
            FrameError::InvalidUtf8 { offset: 0 }
        );
    }
}
