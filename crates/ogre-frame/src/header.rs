use ogre_types::{Oid, TypeId};

use crate::error::{FrameError, FrameResult};
use crate::order::ByteOrder;
use crate::scan::{EntityFrame, FrameScanner, FrameWalker};

/// Width of the length field that starts every record, entity or gap.
pub const LENGTH_FIELD_LEN: usize = 8;

/// Width of a full entity header: length, type id, object id.
pub const ENTITY_HEADER_LEN: usize = 24;

const OFFSET_LEN: usize = 0;
const OFFSET_TID: usize = OFFSET_LEN + 8;
const OFFSET_OID: usize = OFFSET_TID + 8;

/// Header of a live entity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityHeader {
    /// Total record length including this header.
    pub length: u64,
    pub type_id: TypeId,
    pub oid: Oid,
}

impl EntityHeader {
    pub fn payload_len(&self) -> u64 {
        self.length - ENTITY_HEADER_LEN as u64
    }
}

/// What the length field at some offset announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameHeader {
    Entity(EntityHeader),
    /// A gap or comment of `length` bytes, including its length field.
    Gap { length: u64 },
}

impl FrameHeader {
    /// Number of bytes a scanner advances past this frame. Never zero.
    pub fn span(&self) -> u64 {
        match self {
            Self::Entity(header) => header.length,
            Self::Gap { length } => *length,
        }
    }
}

/// Reads and writes frame headers in one fixed byte order.
///
/// All accesses are bounds-checked against the slice they operate on; an
/// out-of-range access is an error, never a panic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCodec {
    order: ByteOrder,
}

impl FrameCodec {
    pub const fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Write an entity header of `length` total bytes at `offset`.
    pub fn write_header(
        &self,
        buffer: &mut [u8],
        offset: usize,
        length: u64,
        type_id: TypeId,
        oid: Oid,
    ) -> FrameResult<()> {
        if length > i64::MAX as u64 {
            return Err(FrameError::LengthOverflow { length });
        }
        if length < ENTITY_HEADER_LEN as u64 {
            return Err(FrameError::InvalidEntityLength {
                offset,
                length: length as i64,
            });
        }
        let dst = slot_mut(buffer, offset, ENTITY_HEADER_LEN)?;
        dst[OFFSET_LEN..OFFSET_TID].copy_from_slice(&self.order.encode_u64(length));
        dst[OFFSET_TID..OFFSET_OID].copy_from_slice(&self.order.encode_u64(type_id.value()));
        dst[OFFSET_OID..ENTITY_HEADER_LEN].copy_from_slice(&self.order.encode_u64(oid.value()));
        Ok(())
    }

    /// Write the (negative) length field of a gap spanning `length` bytes.
    pub fn write_gap_header(&self, buffer: &mut [u8], offset: usize, length: u64) -> FrameResult<()> {
        if length > i64::MAX as u64 {
            return Err(FrameError::LengthOverflow { length });
        }
        if length < LENGTH_FIELD_LEN as u64 {
            return Err(FrameError::InvalidGapLength { offset, length });
        }
        let raw = -(length as i64);
        let dst = slot_mut(buffer, offset, LENGTH_FIELD_LEN)?;
        dst.copy_from_slice(&self.order.encode_u64(raw as u64));
        Ok(())
    }

    /// Raw signed length field at `offset`.
    pub fn read_length_at(&self, buffer: &[u8], offset: usize) -> FrameResult<i64> {
        Ok(self.read_u64(buffer, offset)? as i64)
    }

    /// Decode the frame starting at `offset`. Pure; no side effects.
    pub fn read_header_at(&self, buffer: &[u8], offset: usize) -> FrameResult<FrameHeader> {
        let raw = self.read_length_at(buffer, offset)?;
        if raw == 0 {
            return Err(FrameError::ZeroLengthRecord { offset });
        }
        if raw < 0 {
            let length = raw.unsigned_abs();
            if length < LENGTH_FIELD_LEN as u64 {
                return Err(FrameError::InvalidGapLength { offset, length });
            }
            return Ok(FrameHeader::Gap { length });
        }

        let length = raw as u64;
        if length < ENTITY_HEADER_LEN as u64 {
            return Err(FrameError::InvalidEntityLength { offset, length: raw });
        }
        // Checks the full header is in range before reading the ids.
        slot(buffer, offset, ENTITY_HEADER_LEN)?;
        Ok(FrameHeader::Entity(EntityHeader {
            length,
            type_id: TypeId::new(self.read_u64(buffer, offset + OFFSET_TID)?),
            oid: Oid::new(self.read_u64(buffer, offset + OFFSET_OID)?),
        }))
    }

    /// Append a complete entity record to `out`. Returns its offset.
    pub fn encode_entity(
        &self,
        out: &mut Vec<u8>,
        type_id: TypeId,
        oid: Oid,
        payload: &[u8],
    ) -> FrameResult<usize> {
        let length = (payload.len() as u64)
            .checked_add(ENTITY_HEADER_LEN as u64)
            .ok_or(FrameError::LengthOverflow { length: u64::MAX })?;
        let start = out.len();
        out.resize(start + ENTITY_HEADER_LEN, 0);
        if let Err(e) = self.write_header(out, start, length, type_id, oid) {
            out.truncate(start);
            return Err(e);
        }
        out.extend_from_slice(payload);
        Ok(start)
    }

    /// Append a zero-filled gap of `length` bytes to `out`.
    pub fn encode_gap(&self, out: &mut Vec<u8>, length: u64) -> FrameResult<usize> {
        let start = out.len();
        if length < LENGTH_FIELD_LEN as u64 {
            return Err(FrameError::InvalidGapLength {
                offset: start,
                length,
            });
        }
        let span = usize::try_from(length).map_err(|_| FrameError::LengthOverflow { length })?;
        out.resize(start + span, 0);
        if let Err(e) = self.write_gap_header(out, start, length) {
            out.truncate(start);
            return Err(e);
        }
        Ok(start)
    }

    /// Append a comment: a gap whose body is UTF-8 text. Scanners skip it.
    pub fn encode_comment(&self, out: &mut Vec<u8>, text: &str) -> FrameResult<usize> {
        let start = out.len();
        let length = (LENGTH_FIELD_LEN + text.len()) as u64;
        out.resize(start + LENGTH_FIELD_LEN, 0);
        if let Err(e) = self.write_gap_header(out, start, length) {
            out.truncate(start);
            return Err(e);
        }
        out.extend_from_slice(text.as_bytes());
        Ok(start)
    }

    /// Body of the gap at `offset` as text, if it is a comment.
    pub fn read_comment_at<'a>(&self, buffer: &'a [u8], offset: usize) -> FrameResult<Option<&'a str>> {
        match self.read_header_at(buffer, offset)? {
            FrameHeader::Gap { length } => {
                let body_len = length as usize - LENGTH_FIELD_LEN;
                let body = slot(buffer, offset + LENGTH_FIELD_LEN, body_len)?;
                if body.iter().all(|b| *b == 0) {
                    return Ok(None);
                }
                Ok(std::str::from_utf8(body).ok())
            }
            FrameHeader::Entity(_) => Ok(None),
        }
    }

    /// Parse a buffer holding exactly one entity record.
    pub fn decode_single<'a>(&self, buffer: &'a [u8]) -> FrameResult<EntityFrame<'a>> {
        match self.read_header_at(buffer, 0)? {
            FrameHeader::Entity(header) => {
                if header.length != buffer.len() as u64 {
                    if header.length > buffer.len() as u64 {
                        return Err(FrameError::Truncated {
                            offset: 0,
                            length: header.length,
                            available: buffer.len(),
                        });
                    }
                    return Err(FrameError::TrailingBytes {
                        expected: header.length,
                        actual: buffer.len(),
                    });
                }
                Ok(EntityFrame::new(0, header, buffer))
            }
            FrameHeader::Gap { .. } => Err(FrameError::NotAnEntity { offset: 0 }),
        }
    }

    /// Walk every frame (entities and gaps) from the start of `buffer`.
    pub fn walk<'a>(&self, buffer: &'a [u8]) -> FrameWalker<'a> {
        FrameWalker::new(*self, buffer, 0)
    }

    /// Lazily yield the live entity records of `buffer`, skipping gaps.
    pub fn scan<'a>(&self, buffer: &'a [u8]) -> FrameScanner<'a> {
        self.scan_from(buffer, 0)
    }

    /// Restart a scan at a known-valid record boundary.
    pub fn scan_from<'a>(&self, buffer: &'a [u8], offset: usize) -> FrameScanner<'a> {
        FrameScanner::new(FrameWalker::new(*self, buffer, offset))
    }

    fn read_u64(&self, buffer: &[u8], offset: usize) -> FrameResult<u64> {
        let src = slot(buffer, offset, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(src);
        Ok(self.order.decode_u64(bytes))
    }
}

fn slot(buffer: &[u8], offset: usize, needed: usize) -> FrameResult<&[u8]> {
    offset
        .checked_add(needed)
        .filter(|end| *end <= buffer.len())
        .map(|end| &buffer[offset..end])
        .ok_or(FrameError::OutOfBounds {
            offset,
            needed,
            available: buffer.len().saturating_sub(offset),
        })
}

fn slot_mut(buffer: &mut [u8], offset: usize, needed: usize) -> FrameResult<&mut [u8]> {
    let available = buffer.len().saturating_sub(offset);
    match offset.checked_add(needed) {
        Some(end) if end <= buffer.len() => Ok(&mut buffer[offset..end]),
        _ => Err(FrameError::OutOfBounds {
            offset,
            needed,
            available,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let codec = FrameCodec::default();
        let mut buf = vec![0u8; 40];
        codec
            .write_header(&mut buf, 0, 40, TypeId::new(3), Oid::new(99))
            .unwrap();
        let header = codec.read_header_at(&buf, 0).unwrap();
        assert_eq!(
            header,
            FrameHeader::Entity(EntityHeader {
                length: 40,
                type_id: TypeId::new(3),
                oid: Oid::new(99),
            })
        );
        assert_eq!(header.span(), 40);
    }

    #[test]
    fn length_overflow_rejected() {
        let codec = FrameCodec::default();
        let mut buf = vec![0u8; 24];
        let err = codec
            .write_header(&mut buf, 0, u64::MAX, TypeId::new(1), Oid::new(1))
            .unwrap_err();
        assert_eq!(err, FrameError::LengthOverflow { length: u64::MAX });
    }

    #[test]
    fn short_entity_length_rejected() {
        let codec = FrameCodec::default();
        let mut buf = vec![0u8; 24];
        assert!(matches!(
            codec.write_header(&mut buf, 0, 12, TypeId::new(1), Oid::new(1)),
            Err(FrameError::InvalidEntityLength { length: 12, .. })
        ));

        buf[..8].copy_from_slice(&12u64.to_le_bytes());
        assert!(matches!(
            codec.read_header_at(&buf, 0),
            Err(FrameError::InvalidEntityLength { offset: 0, length: 12 })
        ));
    }

    #[test]
    fn write_out_of_bounds() {
        let codec = FrameCodec::default();
        let mut buf = vec![0u8; 30];
        let err = codec
            .write_header(&mut buf, 10, 24, TypeId::new(1), Oid::new(1))
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::OutOfBounds {
                offset: 10,
                needed: 24,
                available: 20
            }
        );
    }

    #[test]
    fn zero_length_is_fatal() {
        let codec = FrameCodec::default();
        let buf = vec![0u8; 24];
        assert_eq!(
            codec.read_header_at(&buf, 0),
            Err(FrameError::ZeroLengthRecord { offset: 0 })
        );
    }

    #[test]
    fn gap_header_roundtrip() {
        let codec = FrameCodec::new(ByteOrder::Big);
        let mut out = Vec::new();
        codec.encode_gap(&mut out, 16).unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(codec.read_length_at(&out, 0).unwrap(), -16);
        assert_eq!(
            codec.read_header_at(&out, 0).unwrap(),
            FrameHeader::Gap { length: 16 }
        );
        assert_eq!(codec.read_comment_at(&out, 0).unwrap(), None);
    }

    #[test]
    fn tiny_gap_rejected() {
        let codec = FrameCodec::default();
        let mut out = Vec::new();
        assert!(matches!(
            codec.encode_gap(&mut out, 4),
            Err(FrameError::InvalidGapLength { length: 4, .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn comment_is_readable() {
        let codec = FrameCodec::default();
        let mut out = Vec::new();
        codec.encode_comment(&mut out, "compacted 2 files").unwrap();
        assert_eq!(
            codec.read_comment_at(&out, 0).unwrap(),
            Some("compacted 2 files")
        );
    }

    #[test]
    fn decode_single_checks_span() {
        let codec = FrameCodec::default();
        let mut out = Vec::new();
        codec
            .encode_entity(&mut out, TypeId::new(5), Oid::new(8), b"abc")
            .unwrap();
        let frame = codec.decode_single(&out).unwrap();
        assert_eq!(frame.payload(), b"abc");

        out.push(0);
        assert!(matches!(
            codec.decode_single(&out),
            Err(FrameError::TrailingBytes { expected: 27, actual: 28 })
        ));
        assert!(matches!(
            codec.decode_single(&out[..20]),
            Err(FrameError::OutOfBounds { .. })
        ));
    }
}
