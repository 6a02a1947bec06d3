use ogre_frame::{ByteOrder, FrameError};
use ogre_storage::{DataFile, StorageError};
use ogre_types::{ChannelIndex, Oid};

/// Errors that abort a resharding run.
#[derive(Debug, thiserror::Error)]
pub enum ReshardError {
    #[error("source store has no store format")]
    MissingSourceFormat,

    #[error("byte order mismatch: source is {source_order}, target is {target_order}")]
    ByteOrderMismatch {
        source_order: ByteOrder,
        target_order: ByteOrder,
    },

    #[error("target store is not empty")]
    TargetNotEmpty,

    /// A frame error while scanning a source file. Always fatal.
    #[error("corrupt source file {file}")]
    Corrupt {
        file: DataFile,
        #[source]
        source: FrameError,
    },

    /// A source record sits in a channel that does not own its OID.
    #[error("object {oid} found in {file}, expected channel {expected}")]
    MisplacedRecord {
        file: DataFile,
        oid: Oid,
        expected: ChannelIndex,
    },

    #[error("resharding was cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ReshardResult<T> = Result<T, ReshardError>;
