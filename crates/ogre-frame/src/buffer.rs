use bytes::Bytes;
use ogre_types::{Oid, TypeId};

use crate::error::FrameResult;
use crate::header::FrameCodec;
use crate::scan::FrameScanner;

/// Owned builder for a run of frames.
///
/// The buffer is the only place record bytes are assembled: every header
/// goes through the checked accessors of its [`FrameCodec`], so a buffer
/// can only ever contain well-formed frames.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    codec: FrameCodec,
    bytes: Vec<u8>,
    entities: usize,
}

impl FrameBuffer {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            bytes: Vec::new(),
            entities: 0,
        }
    }

    pub fn with_capacity(codec: FrameCodec, capacity: usize) -> Self {
        Self {
            codec,
            bytes: Vec::with_capacity(capacity),
            entities: 0,
        }
    }

    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    /// Append an entity record. Returns its offset within the buffer.
    pub fn push_entity(&mut self, type_id: TypeId, oid: Oid, payload: &[u8]) -> FrameResult<usize> {
        let offset = self.codec.encode_entity(&mut self.bytes, type_id, oid, payload)?;
        self.entities += 1;
        Ok(offset)
    }

    /// Append a zero-filled gap of `length` bytes.
    pub fn push_gap(&mut self, length: u64) -> FrameResult<usize> {
        self.codec.encode_gap(&mut self.bytes, length)
    }

    /// Append a comment frame.
    pub fn push_comment(&mut self, text: &str) -> FrameResult<usize> {
        self.codec.encode_comment(&mut self.bytes, text)
    }

    /// Number of entity records pushed.
    pub fn entity_count(&self) -> usize {
        self.entities
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

    pub fn scan(&self) -> FrameScanner<'_> {
        self.codec.scan(&self.bytes)
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.entities = 0;
    }

    /// Hand the assembled bytes off without copying.
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ByteOrder;

    #[test]
    fn counts_entities_not_gaps() {
        let mut buffer = FrameBuffer::new(FrameCodec::new(ByteOrder::Little));
        assert!(buffer.is_empty());
        buffer.push_entity(TypeId::new(1), Oid::new(1), b"x").unwrap();
        buffer.push_gap(8).unwrap();
        buffer.push_comment("note").unwrap();
        buffer.push_entity(TypeId::new(1), Oid::new(2), b"y").unwrap();

        assert_eq!(buffer.entity_count(), 2);
        assert_eq!(buffer.len(), 25 + 8 + 12 + 25);
        assert_eq!(buffer.scan().count(), 2);
    }

    #[test]
    fn clear_resets() {
        let mut buffer = FrameBuffer::new(FrameCodec::default());
        buffer.push_entity(TypeId::new(1), Oid::new(1), &[]).unwrap();
        buffer.clear();
        assert_eq!(buffer.entity_count(), 0);
        assert!(buffer.freeze().is_empty());
    }
}
