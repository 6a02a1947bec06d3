//! Provider that fails appends or releases for chosen channels.

use std::io;

use bytes::Bytes;
use ogre_types::ChannelIndex;

use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryFileProvider;
use crate::traits::{AppendHandle, DataFile, FileProvider};

#[derive(Clone, Default)]
pub(crate) struct FailingProvider {
    pub inner: InMemoryFileProvider,
    pub fail_append: Option<ChannelIndex>,
    pub fail_release: Option<ChannelIndex>,
}

fn injected(what: &str, file: DataFile) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected {what} failure on {file}")))
}

struct FailingHandle {
    inner: Box<dyn AppendHandle>,
    fail_append: bool,
    fail_release: bool,
}

impl AppendHandle for FailingHandle {
    fn file(&self) -> DataFile {
        self.inner.file()
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<()> {
        if self.fail_append {
            return Err(injected("append", self.file()));
        }
        self.inner.append(bytes)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn release(self: Box<Self>) -> StorageResult<DataFile> {
        if self.fail_release {
            return Err(injected("release", self.file()));
        }
        self.inner.release()
    }

    fn discard(self: Box<Self>) -> StorageResult<()> {
        self.inner.discard()
    }
}

impl FileProvider for FailingProvider {
    fn data_files(&self, channel: ChannelIndex) -> StorageResult<Vec<DataFile>> {
        self.inner.data_files(channel)
    }

    fn channels(&self) -> StorageResult<Vec<ChannelIndex>> {
        self.inner.channels()
    }

    fn read(&self, file: &DataFile) -> StorageResult<Bytes> {
        self.inner.read(file)
    }

    fn read_range(&self, file: &DataFile, offset: u64, len: usize) -> StorageResult<Bytes> {
        self.inner.read_range(file, offset, len)
    }

    fn file_size(&self, file: &DataFile) -> StorageResult<u64> {
        self.inner.file_size(file)
    }

    fn open_for_append(&self, channel: ChannelIndex, sequence: u64) -> StorageResult<Box<dyn AppendHandle>> {
        Ok(Box::new(FailingHandle {
            inner: self.inner.open_for_append(channel, sequence)?,
            fail_append: self.fail_append == Some(channel),
            fail_release: self.fail_release == Some(channel),
        }))
    }

    fn delete(&self, file: &DataFile) -> StorageResult<()> {
        self.inner.delete(file)
    }

    fn read_resource(&self, name: &str) -> StorageResult<Option<Bytes>> {
        self.inner.read_resource(name)
    }

    fn write_resource(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.inner.write_resource(name, bytes)
    }
}
