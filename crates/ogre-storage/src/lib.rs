//! Channel storage for OGRE.
//!
//! A store is split into `channel_count` independent channels. Each channel
//! owns a sequence of append-only data files holding entity records as laid
//! out by `ogre-frame`. Channel `k` holds exactly the OIDs with
//! `oid mod channel_count == k`.
//!
//! ```text
//! <root>/
//!   store_format.toml          byte order + channel count
//!   type_dictionary.ptd        persisted type descriptors
//!   channel_0/channel_0_1.dat
//!   channel_0/channel_0_2.dat
//!   channel_1/channel_1_1.dat
//! ```
//!
//! # Backends
//!
//! - [`InMemoryFileProvider`] for tests and ephemeral stores
//! - [`DirectoryFileProvider`] for the on-disk layout above

pub mod config;
pub mod directory;
pub mod error;
#[cfg(test)]
mod failing;
pub mod memory;
pub mod storage;
pub mod traits;
pub mod writer;

pub use config::{StorageConfig, StoreFormat, DEFAULT_MAX_FILE_SIZE};
pub use directory::DirectoryFileProvider;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryFileProvider;
pub use storage::{ChannelStats, ChannelStorage, ConsolidationReport};
pub use traits::{AppendHandle, DataFile, FileProvider, STORE_FORMAT_RESOURCE, TYPE_DICTIONARY_RESOURCE};
pub use writer::{ChannelWriter, RecordLocation};
