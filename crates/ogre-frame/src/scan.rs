use bytes::Bytes;
use ogre_types::{Oid, TypeId};
use tracing::trace;

use crate::error::{FrameError, FrameResult};
use crate::header::{EntityHeader, FrameCodec, FrameHeader, ENTITY_HEADER_LEN};

/// A frame located during a walk: its offset and decoded header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub offset: usize,
    pub header: FrameHeader,
}

/// Iterates over every frame of a buffer, gaps included.
///
/// The walker advances by each frame's announced length and never by zero.
/// It fuses after the first error: a corrupt store cannot be scanned past
/// the corruption.
#[derive(Clone, Debug)]
pub struct FrameWalker<'a> {
    codec: FrameCodec,
    buffer: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> FrameWalker<'a> {
    pub(crate) fn new(codec: FrameCodec, buffer: &'a [u8], position: usize) -> Self {
        Self {
            codec,
            buffer,
            position,
            failed: false,
        }
    }

    /// Offset of the next frame to be decoded.
    pub fn position(&self) -> usize {
        self.position
    }

    fn fail(&mut self, error: FrameError) -> Option<FrameResult<RawFrame>> {
        self.failed = true;
        Some(Err(error))
    }
}

impl<'a> Iterator for FrameWalker<'a> {
    type Item = FrameResult<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.buffer.len() {
            return None;
        }
        let offset = self.position;
        let header = match self.codec.read_header_at(self.buffer, offset) {
            Ok(header) => header,
            Err(e) => return self.fail(e),
        };

        let span = header.span();
        let available = self.buffer.len() - offset;
        match usize::try_from(span) {
            Ok(span) if span <= available => {
                self.position = offset + span;
                Some(Ok(RawFrame { offset, header }))
            }
            _ => self.fail(FrameError::Truncated {
                offset,
                length: span,
                available,
            }),
        }
    }
}

/// A live entity record borrowed from a scanned buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityFrame<'a> {
    pub offset: usize,
    pub header: EntityHeader,
    bytes: &'a [u8],
}

impl<'a> EntityFrame<'a> {
    pub(crate) fn new(offset: usize, header: EntityHeader, bytes: &'a [u8]) -> Self {
        Self {
            offset,
            header,
            bytes,
        }
    }

    pub fn oid(&self) -> Oid {
        self.header.oid
    }

    pub fn type_id(&self) -> TypeId {
        self.header.type_id
    }

    /// The complete record, header included, exactly as stored.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The record body after the 24-byte header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[ENTITY_HEADER_LEN..]
    }
}

/// Yields the live entity records of a buffer, silently skipping gaps.
///
/// Scanning the same buffer twice yields the same `(offset, header)`
/// sequence. Gap statistics are available once iteration progresses.
#[derive(Clone, Debug)]
pub struct FrameScanner<'a> {
    walker: FrameWalker<'a>,
    gaps: usize,
    gap_bytes: u64,
    entities: usize,
}

impl<'a> FrameScanner<'a> {
    pub(crate) fn new(walker: FrameWalker<'a>) -> Self {
        Self {
            walker,
            gaps: 0,
            gap_bytes: 0,
            entities: 0,
        }
    }

    pub fn gaps_skipped(&self) -> usize {
        self.gaps
    }

    pub fn gap_bytes(&self) -> u64 {
        self.gap_bytes
    }

    pub fn entities_yielded(&self) -> usize {
        self.entities
    }

    pub fn position(&self) -> usize {
        self.walker.position()
    }
}

impl<'a> Iterator for FrameScanner<'a> {
    type Item = FrameResult<EntityFrame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = match self.walker.next()? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e)),
            };
            match frame.header {
                FrameHeader::Gap { length } => {
                    trace!(offset = frame.offset, length, "skipping gap");
                    self.gaps += 1;
                    self.gap_bytes += length;
                }
                FrameHeader::Entity(header) => {
                    self.entities += 1;
                    let buffer: &'a [u8] = self.walker.buffer;
                    let end = frame.offset + header.length as usize;
                    let bytes = &buffer[frame.offset..end];
                    return Some(Ok(EntityFrame::new(frame.offset, header, bytes)));
                }
            }
        }
    }
}

/// An entity record that owns its bytes, e.g. after a point read from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedEntity {
    pub header: EntityHeader,
    bytes: Bytes,
}

impl OwnedEntity {
    /// Parse `bytes`, which must hold exactly one entity record.
    pub fn parse(codec: &FrameCodec, bytes: Bytes) -> FrameResult<Self> {
        let header = codec.decode_single(&bytes)?.header;
        Ok(Self { header, bytes })
    }

    pub fn oid(&self) -> Oid {
        self.header.oid
    }

    pub fn type_id(&self) -> TypeId {
        self.header.type_id
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[ENTITY_HEADER_LEN..]
    }

    /// Borrowed view, as produced by a scan.
    pub fn as_frame(&self) -> EntityFrame<'_> {
        EntityFrame::new(0, self.header, &self.bytes)
    }
}

impl<'a> From<EntityFrame<'a>> for OwnedEntity {
    fn from(frame: EntityFrame<'a>) -> Self {
        Self {
            header: frame.header,
            bytes: Bytes::copy_from_slice(frame.bytes),
        }
    }
}
