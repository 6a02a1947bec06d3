use std::fmt;

use bytes::Bytes;
use ogre_types::ChannelIndex;

use crate::error::{StorageError, StorageResult};

/// Resource holding the type dictionary text.
pub const TYPE_DICTIONARY_RESOURCE: &str = "type_dictionary.ptd";

/// Resource holding the [`StoreFormat`](crate::StoreFormat).
pub const STORE_FORMAT_RESOURCE: &str = "store_format.toml";

/// One data file of a channel. Files of a channel are ordered by sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataFile {
    pub channel: ChannelIndex,
    pub sequence: u64,
}

impl DataFile {
    pub fn new(channel: ChannelIndex, sequence: u64) -> Self {
        Self { channel, sequence }
    }

    /// `channel_<k>_<seq>.dat`
    pub fn file_name(&self) -> String {
        format!("channel_{}_{}.dat", self.channel, self.sequence)
    }

    /// Parse a name produced by [`file_name`](Self::file_name) for `channel`.
    pub fn parse_file_name(channel: ChannelIndex, name: &str) -> Option<Self> {
        let sequence = name
            .strip_prefix(&format!("channel_{channel}_"))?
            .strip_suffix(".dat")?
            .parse()
            .ok()?;
        Some(Self::new(channel, sequence))
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel_{}/{}", self.channel, self.file_name())
    }
}

/// An open, append-only data file.
pub trait AppendHandle: Send {
    fn file(&self) -> DataFile;

    fn append(&mut self, bytes: &[u8]) -> StorageResult<()>;

    /// Current file size in bytes.
    fn size(&self) -> u64;

    /// Make the written bytes durable and close the file.
    fn release(self: Box<Self>) -> StorageResult<DataFile>;

    /// Close and delete the file.
    fn discard(self: Box<Self>) -> StorageResult<()>;
}

/// Physical storage of data files and named resources.
///
/// Implementations must satisfy these invariants:
/// - Bytes appended through a handle are readable as soon as `append` returns.
/// - `data_files` lists a channel's files newest first (highest sequence).
/// - Resource writes replace the previous content atomically.
pub trait FileProvider: Send + Sync {
    /// Files of `channel`, newest first.
    fn data_files(&self, channel: ChannelIndex) -> StorageResult<Vec<DataFile>>;

    /// Channels that hold at least one data file.
    fn channels(&self) -> StorageResult<Vec<ChannelIndex>>;

    fn read(&self, file: &DataFile) -> StorageResult<Bytes>;

    fn read_range(&self, file: &DataFile, offset: u64, len: usize) -> StorageResult<Bytes>;

    fn file_size(&self, file: &DataFile) -> StorageResult<u64>;

    /// Open (creating if needed) a file for appending.
    fn open_for_append(&self, channel: ChannelIndex, sequence: u64) -> StorageResult<Box<dyn AppendHandle>>;

    fn delete(&self, file: &DataFile) -> StorageResult<()>;

    fn read_resource(&self, name: &str) -> StorageResult<Option<Bytes>>;

    fn write_resource(&self, name: &str, bytes: &[u8]) -> StorageResult<()>;

    fn load_type_dictionary(&self) -> StorageResult<Option<String>> {
        match self.read_resource(TYPE_DICTIONARY_RESOURCE)? {
            Some(bytes) => String::from_utf8(bytes.to_vec()).map(Some).map_err(|e| {
                StorageError::MalformedResource {
                    name: TYPE_DICTIONARY_RESOURCE.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    fn store_type_dictionary(&self, text: &str) -> StorageResult<()> {
        self.write_resource(TYPE_DICTIONARY_RESOURCE, text.as_bytes())
    }

    /// `true` if no channel holds a data file.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.channels()?.is_empty())
    }
}

pub(crate) fn check_range(file: &DataFile, offset: u64, len: usize, size: u64) -> StorageResult<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StorageError::ReadOutOfRange {
            file: *file,
            offset,
            len,
            size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogre_types::ChannelCount;

    #[test]
    fn file_names_parse_back() {
        let channel = ChannelCount::new(4).unwrap().index(3).unwrap();
        let file = DataFile::new(channel, 12);
        assert_eq!(file.file_name(), "channel_3_12.dat");
        assert_eq!(file.to_string(), "channel_3/channel_3_12.dat");
        assert_eq!(DataFile::parse_file_name(channel, "channel_3_12.dat"), Some(file));
        assert_eq!(DataFile::parse_file_name(channel, "channel_2_12.dat"), None);
        assert_eq!(DataFile::parse_file_name(channel, "channel_3_x.dat"), None);
    }

    #[test]
    fn files_order_by_channel_then_sequence() {
        let count = ChannelCount::new(2).unwrap();
        let a = DataFile::new(count.index(0).unwrap(), 9);
        let b = DataFile::new(count.index(1).unwrap(), 1);
        assert!(a < b);
    }
}
