use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use ogre_types::ChannelIndex;

use crate::error::{StorageError, StorageResult};
use crate::traits::{check_range, AppendHandle, DataFile, FileProvider};

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<DataFile, Vec<u8>>,
    resources: HashMap<String, Vec<u8>>,
}

/// In-memory file provider.
///
/// Intended for tests and embedding. Clones share the same files, so a clone
/// can stand in for "reopening" a store.
#[derive(Clone, Default)]
pub struct InMemoryFileProvider {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes across all data files.
    pub fn total_bytes(&self) -> u64 {
        self.state
            .read()
            .expect("lock poisoned")
            .files
            .values()
            .map(|f| f.len() as u64)
            .sum()
    }

    /// Every data file, ordered by channel then sequence.
    pub fn all_files(&self) -> Vec<DataFile> {
        self.state.read().expect("lock poisoned").files.keys().copied().collect()
    }

    /// Replace a file's content outright. Test hook for corrupt stores.
    pub fn put_file(&self, file: DataFile, bytes: Vec<u8>) {
        self.state.write().expect("lock poisoned").files.insert(file, bytes);
    }
}

impl FileProvider for InMemoryFileProvider {
    fn data_files(&self, channel: ChannelIndex) -> StorageResult<Vec<DataFile>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .files
            .keys()
            .filter(|f| f.channel == channel)
            .rev()
            .copied()
            .collect())
    }

    fn channels(&self) -> StorageResult<Vec<ChannelIndex>> {
        let state = self.state.read().expect("lock poisoned");
        let channels: BTreeSet<ChannelIndex> = state.files.keys().map(|f| f.channel).collect();
        Ok(channels.into_iter().collect())
    }

    fn read(&self, file: &DataFile) -> StorageResult<Bytes> {
        let state = self.state.read().expect("lock poisoned");
        state
            .files
            .get(file)
            .map(|bytes| Bytes::copy_from_slice(bytes))
            .ok_or(StorageError::FileNotFound(*file))
    }

    fn read_range(&self, file: &DataFile, offset: u64, len: usize) -> StorageResult<Bytes> {
        let state = self.state.read().expect("lock poisoned");
        let bytes = state.files.get(file).ok_or(StorageError::FileNotFound(*file))?;
        check_range(file, offset, len, bytes.len() as u64)?;
        let start = offset as usize;
        Ok(Bytes::copy_from_slice(&bytes[start..start + len]))
    }

    fn file_size(&self, file: &DataFile) -> StorageResult<u64> {
        let state = self.state.read().expect("lock poisoned");
        state
            .files
            .get(file)
            .map(|f| f.len() as u64)
            .ok_or(StorageError::FileNotFound(*file))
    }

    fn open_for_append(&self, channel: ChannelIndex, sequence: u64) -> StorageResult<Box<dyn AppendHandle>> {
        let file = DataFile::new(channel, sequence);
        let size = {
            let mut state = self.state.write().expect("lock poisoned");
            state.files.entry(file).or_default().len() as u64
        };
        Ok(Box::new(MemoryAppendHandle {
            state: Arc::clone(&self.state),
            file,
            size,
        }))
    }

    fn delete(&self, file: &DataFile) -> StorageResult<()> {
        self.state.write().expect("lock poisoned").files.remove(file);
        Ok(())
    }

    fn read_resource(&self, name: &str) -> StorageResult<Option<Bytes>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.resources.get(name).map(|b| Bytes::copy_from_slice(b)))
    }

    fn write_resource(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.state
            .write()
            .expect("lock poisoned")
            .resources
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

struct MemoryAppendHandle {
    state: Arc<RwLock<MemoryState>>,
    file: DataFile,
    size: u64,
}

impl AppendHandle for MemoryAppendHandle {
    fn file(&self) -> DataFile {
        self.file
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.files.entry(self.file).or_default().extend_from_slice(bytes);
        self.size += bytes.len() as u64;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn release(self: Box<Self>) -> StorageResult<DataFile> {
        Ok(self.file)
    }

    fn discard(self: Box<Self>) -> StorageResult<()> {
        self.state.write().expect("lock poisoned").files.remove(&self.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TYPE_DICTIONARY_RESOURCE;

    fn channel(i: u32) -> ChannelIndex {
        ChannelIndex::new(i)
    }

    #[test]
    fn appended_bytes_are_readable() {
        let provider = InMemoryFileProvider::new();
        let mut handle = provider.open_for_append(channel(0), 1).unwrap();
        handle.append(b"hello ").unwrap();
        handle.append(b"world").unwrap();
        assert_eq!(handle.size(), 11);
        let file = handle.release().unwrap();
        assert_eq!(&provider.read(&file).unwrap()[..], b"hello world");
        assert_eq!(&provider.read_range(&file, 6, 5).unwrap()[..], b"world");
        assert!(matches!(
            provider.read_range(&file, 8, 5),
            Err(StorageError::ReadOutOfRange { .. })
        ));
    }

    #[test]
    fn files_listed_newest_first() {
        let provider = InMemoryFileProvider::new();
        for seq in [1, 3, 2] {
            provider.open_for_append(channel(1), seq).unwrap().release().unwrap();
        }
        provider.open_for_append(channel(0), 7).unwrap().release().unwrap();
        let sequences: Vec<u64> = provider
            .data_files(channel(1))
            .unwrap()
            .iter()
            .map(|f| f.sequence)
            .collect();
        assert_eq!(sequences, vec![3, 2, 1]);
        assert_eq!(provider.channels().unwrap(), vec![channel(0), channel(1)]);
    }

    #[test]
    fn discard_removes_file() {
        let provider = InMemoryFileProvider::new();
        let mut handle = provider.open_for_append(channel(0), 1).unwrap();
        handle.append(b"partial").unwrap();
        handle.discard().unwrap();
        assert!(provider.is_empty().unwrap());
    }

    #[test]
    fn resources_and_dictionary() {
        let provider = InMemoryFileProvider::new();
        assert!(provider.load_type_dictionary().unwrap().is_none());
        provider.store_type_dictionary("1 a.B {\n}\n").unwrap();
        assert_eq!(provider.load_type_dictionary().unwrap().unwrap(), "1 a.B {\n}\n");
        provider
            .write_resource(TYPE_DICTIONARY_RESOURCE, &[0xFF, 0xFE])
            .unwrap();
        assert!(matches!(
            provider.load_type_dictionary(),
            Err(StorageError::MalformedResource { .. })
        ));
    }
}
