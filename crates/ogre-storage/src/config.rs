use std::path::{Path, PathBuf};
use std::sync::Arc;

use ogre_frame::{ByteOrder, ENTITY_HEADER_LEN};
use ogre_types::{ChannelCount, Oid};
use serde::{Deserialize, Serialize};

use crate::directory::DirectoryFileProvider;
use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryFileProvider;
use crate::traits::{FileProvider, STORE_FORMAT_RESOURCE};

/// Default rotation threshold for data files: 8 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Configuration of one store.
///
/// ```toml
/// directory = "/var/lib/app/store"
/// channel_count = 4
/// max_file_size = 8388608
/// byte_order = "little"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store directory. `None` keeps the store in memory.
    pub directory: Option<PathBuf>,
    pub channel_count: ChannelCount,
    /// A data file is rotated before an append would exceed this size.
    pub max_file_size: u64,
    pub byte_order: ByteOrder,
    /// First OID assigned to application instances.
    pub oid_threshold: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            channel_count: ChannelCount::ONE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            byte_order: ByteOrder::Little,
            oid_threshold: Oid::DEFAULT_ENTITY_START,
        }
    }
}

impl StorageConfig {
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string(self).map_err(|e| StorageError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.max_file_size < ENTITY_HEADER_LEN as u64 {
            return Err(StorageError::InvalidConfig(format!(
                "max_file_size {} is smaller than a record header",
                self.max_file_size
            )));
        }
        if self.oid_threshold <= Oid::ROOTS.value() {
            return Err(StorageError::InvalidConfig(format!(
                "oid_threshold {} overlaps the reserved roots OID",
                self.oid_threshold
            )));
        }
        Ok(())
    }

    /// The format a store opened with this configuration must have.
    pub fn format(&self) -> StoreFormat {
        StoreFormat {
            byte_order: self.byte_order,
            channel_count: self.channel_count,
        }
    }

    /// The provider this configuration points at.
    pub fn open_provider(&self) -> StorageResult<Arc<dyn FileProvider>> {
        Ok(match &self.directory {
            Some(dir) => Arc::new(DirectoryFileProvider::open(dir)?),
            None => Arc::new(InMemoryFileProvider::new()),
        })
    }
}

/// Physical format of a store, kept in its `store_format.toml` resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFormat {
    pub byte_order: ByteOrder,
    pub channel_count: ChannelCount,
}

impl StoreFormat {
    pub fn read(provider: &dyn FileProvider) -> StorageResult<Option<Self>> {
        let Some(bytes) = provider.read_resource(STORE_FORMAT_RESOURCE)? else {
            return Ok(None);
        };
        let malformed = |reason: String| StorageError::MalformedResource {
            name: STORE_FORMAT_RESOURCE.to_string(),
            reason,
        };
        let text = std::str::from_utf8(&bytes).map_err(|e| malformed(e.to_string()))?;
        toml::from_str(text).map(Some).map_err(|e| malformed(e.to_string()))
    }

    pub fn write(&self, provider: &dyn FileProvider) -> StorageResult<()> {
        let text = toml::to_string(self).map_err(|e| StorageError::MalformedResource {
            name: STORE_FORMAT_RESOURCE.to_string(),
            reason: e.to_string(),
        })?;
        provider.write_resource(STORE_FORMAT_RESOURCE, text.as_bytes())
    }

    /// Fail unless `persisted` can be opened as `self`.
    pub fn check(&self, persisted: &StoreFormat) -> StorageResult<()> {
        if persisted.byte_order != self.byte_order {
            return Err(StorageError::FormatMismatch {
                expected: self.byte_order,
                found: persisted.byte_order,
            });
        }
        if persisted.channel_count != self.channel_count {
            return Err(StorageError::ChannelCountMismatch {
                configured: self.channel_count,
                persisted: persisted.channel_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert!(c.directory.is_none());
        assert_eq!(c.channel_count, ChannelCount::ONE);
        assert_eq!(c.max_file_size, 8 * 1024 * 1024);
        assert_eq!(c.byte_order, ByteOrder::Little);
        assert_eq!(c.oid_threshold, Oid::DEFAULT_ENTITY_START);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = StorageConfig::from_toml_str("channel_count = 4\nbyte_order = \"big\"\n").unwrap();
        assert_eq!(c.channel_count.get(), 4);
        assert_eq!(c.byte_order, ByteOrder::Big);
        assert_eq!(c.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(StorageConfig::from_toml_str(&c.to_toml_string().unwrap()).unwrap(), c);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(StorageConfig::from_toml_str("channel_count = 0\n").is_err());
        assert!(StorageConfig::from_toml_str("max_file_size = 8\n").is_err());
        assert!(StorageConfig::from_toml_str("oid_threshold = 1\n").is_err());
        assert!(StorageConfig::from_toml_str("byte_order = \"middle\"\n").is_err());
    }

    #[test]
    fn store_format_checks() {
        let provider = InMemoryFileProvider::new();
        assert!(StoreFormat::read(&provider).unwrap().is_none());
        let four = StoreFormat {
            byte_order: ByteOrder::Little,
            channel_count: ChannelCount::new(4).unwrap(),
        };
        four.write(&provider).unwrap();
        let persisted = StoreFormat::read(&provider).unwrap().unwrap();
        assert_eq!(persisted, four);

        let two = StoreFormat {
            channel_count: ChannelCount::new(2).unwrap(),
            ..four
        };
        assert!(matches!(
            two.check(&persisted),
            Err(StorageError::ChannelCountMismatch { .. })
        ));
        let big = StoreFormat {
            byte_order: ByteOrder::Big,
            ..four
        };
        assert!(matches!(big.check(&persisted), Err(StorageError::FormatMismatch { .. })));
    }
}
