use std::sync::Arc;

use ogre_types::ChannelIndex;
use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::traits::{AppendHandle, DataFile, FileProvider};

/// Where an appended record landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLocation {
    pub file: DataFile,
    pub offset: u64,
    pub length: u64,
}

/// Append-only writer for one channel with size-based rotation.
///
/// A new file is opened lazily on the first append. Before an append that
/// would push a non-empty file past `max_file_size`, the current file is
/// released and the next sequence is opened. A single record larger than
/// the limit still gets a file of its own.
pub struct ChannelWriter {
    provider: Arc<dyn FileProvider>,
    channel: ChannelIndex,
    max_file_size: u64,
    next_sequence: u64,
    current: Option<Box<dyn AppendHandle>>,
    sealed: Vec<DataFile>,
    records: u64,
    bytes: u64,
}

impl ChannelWriter {
    pub fn new(
        provider: Arc<dyn FileProvider>,
        channel: ChannelIndex,
        max_file_size: u64,
        next_sequence: u64,
    ) -> Self {
        Self {
            provider,
            channel,
            max_file_size,
            next_sequence,
            current: None,
            sealed: Vec::new(),
            records: 0,
            bytes: 0,
        }
    }

    /// A writer continuing after the newest existing file of `channel`.
    pub fn resume(
        provider: Arc<dyn FileProvider>,
        channel: ChannelIndex,
        max_file_size: u64,
    ) -> StorageResult<Self> {
        let next_sequence = provider
            .data_files(channel)?
            .first()
            .map(|f| f.sequence + 1)
            .unwrap_or(1);
        Ok(Self::new(provider, channel, max_file_size, next_sequence))
    }

    pub fn channel(&self) -> ChannelIndex {
        self.channel
    }

    pub fn append(&mut self, record: &[u8]) -> StorageResult<RecordLocation> {
        let len = record.len() as u64;
        if let Some(handle) = &self.current {
            if handle.size() > 0 && handle.size() + len > self.max_file_size {
                self.rotate()?;
            }
        }
        let handle = match self.current.take() {
            Some(handle) => handle,
            None => {
                let handle = self.provider.open_for_append(self.channel, self.next_sequence)?;
                self.next_sequence += 1;
                handle
            }
        };
        let handle = self.current.insert(handle);
        let offset = handle.size();
        handle.append(record)?;
        self.records += 1;
        self.bytes += len;
        Ok(RecordLocation {
            file: handle.file(),
            offset,
            length: len,
        })
    }

    /// A file whose release failed is still tracked so `discard` removes it.
    fn rotate(&mut self) -> StorageResult<()> {
        if let Some(handle) = self.current.take() {
            let file = handle.file();
            let released = handle.release();
            self.sealed.push(file);
            released?;
            debug!(%file, "rotated data file");
        }
        Ok(())
    }

    /// Release the open file and return every file this writer produced.
    ///
    /// If the release fails every file of the writer is deleted.
    pub fn seal(mut self) -> StorageResult<Vec<DataFile>> {
        if let Err(e) = self.rotate() {
            self.discard();
            return Err(e);
        }
        Ok(std::mem::take(&mut self.sealed))
    }

    /// Release the open file; the next append starts a new one.
    pub fn release_current(&mut self) -> StorageResult<()> {
        self.rotate()
    }

    /// Delete every file this writer produced. Failures are logged, not returned.
    pub fn discard(mut self) {
        if let Some(handle) = self.current.take() {
            let file = handle.file();
            if let Err(e) = handle.discard() {
                warn!(%file, error = %e, "failed to discard open data file");
            }
        }
        for file in std::mem::take(&mut self.sealed) {
            if let Err(e) = self.provider.delete(&file) {
                warn!(%file, error = %e, "failed to discard sealed data file");
            }
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Files produced so far, including the open one.
    pub fn files(&self) -> Vec<DataFile> {
        let mut files = self.sealed.clone();
        files.extend(self.current.as_ref().map(|h| h.file()));
        files
    }
}
