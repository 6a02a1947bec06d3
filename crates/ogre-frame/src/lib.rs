//! Entity frame codec for OGRE.
//!
//! A store file is a plain concatenation of length-prefixed records with no
//! external index. Position is discovered purely by walking lengths, so the
//! codec is the substrate every other crate builds on.
//!
//! # Format
//!
//! ```text
//! entity: [length: i64 > 0][type id: i64][object id: i64][payload ...]
//! gap:    [length: i64 < 0][|length| - 8 filler or comment bytes]
//! ```
//!
//! `length` always spans the whole record including its header. A length of
//! zero is invalid and aborts any scan. All numbers use one fixed
//! [`ByteOrder`] per store.
//!
//! # Modules
//!
//! - [`header`] -- [`FrameCodec`], checked header accessors
//! - [`scan`] -- [`FrameWalker`] (all frames) and [`FrameScanner`] (live entities)
//! - [`buffer`] -- [`FrameBuffer`], an owned builder of records
//! - [`payload`] -- [`PayloadWriter`] / [`PayloadReader`] and the list layout

pub mod buffer;
pub mod error;
pub mod header;
pub mod order;
pub mod payload;
pub mod scan;

pub use buffer::FrameBuffer;
pub use error::{FrameError, FrameResult};
pub use header::{
    EntityHeader, FrameCodec, FrameHeader, ENTITY_HEADER_LEN, LENGTH_FIELD_LEN,
};
pub use order::ByteOrder;
pub use payload::{ListView, PayloadReader, PayloadWriter, LIST_HEADER_LEN};
pub use scan::{EntityFrame, FrameScanner, FrameWalker, OwnedEntity, RawFrame};

#[cfg(test)]
mod tests {
    use super::*;
    use ogre_types::{Oid, TypeId};

    fn entity(codec: &FrameCodec, out: &mut Vec<u8>, oid: u64, payload_len: usize) {
        codec
            .encode_entity(out, TypeId::new(1), Oid::new(oid), &vec![0xAB; payload_len])
            .unwrap();
    }

    // Two live records separated by a 16-byte gap.
    #[test]
    fn scan_skips_gap_between_entities() {
        let codec = FrameCodec::default();
        let mut data = Vec::new();
        entity(&codec, &mut data, 5, 16); // len = 40
        codec.encode_gap(&mut data, 16).unwrap();
        entity(&codec, &mut data, 6, 8); // len = 32

        let mut scanner = codec.scan(&data);
        let frames: Vec<_> = scanner.by_ref().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.length, 40);
        assert_eq!(frames[0].header.oid, Oid::new(5));
        assert_eq!(frames[1].header.length, 32);
        assert_eq!(frames[1].header.oid, Oid::new(6));
        assert_eq!(frames[1].offset, 56);
        assert_eq!(scanner.gaps_skipped(), 1);
        assert_eq!(scanner.gap_bytes(), 16);
    }

    #[test]
    fn zero_length_aborts_scan() {
        let codec = FrameCodec::default();
        let mut data = Vec::new();
        entity(&codec, &mut data, 1, 4);
        let bad_at = data.len();
        data.extend_from_slice(&[0u8; 24]);
        entity(&codec, &mut data, 2, 4);

        let results: Vec<_> = codec.scan(&data).collect();
        assert_eq!(results.len(), 2, "scanner must stop after the fatal error");
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(FrameError::ZeroLengthRecord { offset }) if offset == bad_at
        ));
    }

    #[test]
    fn big_endian_store_roundtrip() {
        let codec = FrameCodec::new(ByteOrder::Big);
        let mut buffer = FrameBuffer::new(codec);
        let mut writer = PayloadWriter::new(ByteOrder::Big);
        writer.put_i64(-7);
        writer.put_text("grüße").unwrap();
        buffer
            .push_entity(TypeId::new(1_000_000), Oid::new(77), writer.as_slice())
            .unwrap();

        let frame = buffer.scan().next().unwrap().unwrap();
        assert_eq!(frame.header.type_id, TypeId::new(1_000_000));
        let mut reader = PayloadReader::new(ByteOrder::Big, frame.payload());
        assert_eq!(reader.get_i64().unwrap(), -7);
        assert_eq!(reader.get_text().unwrap(), "grüße");
        assert!(reader.is_exhausted());

        // The same bytes read little-endian produce a different (wrong) length.
        let little = FrameCodec::new(ByteOrder::Little);
        assert_ne!(
            little.read_length_at(buffer.as_slice(), 0).unwrap(),
            frame.header.length as i64
        );
    }
}
