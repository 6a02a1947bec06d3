use ogre_frame::{ByteOrder, FrameError};
use ogre_types::{ChannelCount, ChannelIndex, Oid, TypeError};

use crate::traits::DataFile;

/// Errors from file providers and channel storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A data file failed to scan.
    #[error("corrupt data file {file}: {source}")]
    Corrupt {
        file: DataFile,
        #[source]
        source: FrameError,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("data file not found: {0}")]
    FileNotFound(DataFile),

    /// A read reaches past the end of a file.
    #[error("read of {len} bytes at {offset} exceeds {file} ({size} bytes)")]
    ReadOutOfRange {
        file: DataFile,
        offset: u64,
        len: usize,
        size: u64,
    },

    /// The store was written with another byte order.
    #[error("store uses {found} byte order, configuration expects {expected}")]
    FormatMismatch { expected: ByteOrder, found: ByteOrder },

    /// The store has another channel count; it must be resharded first.
    #[error("store has {persisted} channels, configuration expects {configured}; reshard required")]
    ChannelCountMismatch {
        configured: ChannelCount,
        persisted: ChannelCount,
    },

    /// Data files exist but the store format resource does not.
    #[error("store holds data files but no store format")]
    MissingFormat,

    /// A record sits in a channel that does not own its OID.
    #[error("object {oid} found in {file}, expected channel {expected}")]
    ChannelMismatch {
        file: DataFile,
        oid: Oid,
        expected: ChannelIndex,
    },

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// A resource is not valid UTF-8 or TOML.
    #[error("resource {name} is malformed: {reason}")]
    MalformedResource { name: String, reason: String },
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
