use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ogre_types::ChannelIndex;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::{check_range, AppendHandle, DataFile, FileProvider};

/// File provider over a directory.
///
/// ```text
/// <root>/
///   store_format.toml
///   type_dictionary.ptd
///   channel_0/channel_0_1.dat
///   channel_1/channel_1_1.dat
/// ```
#[derive(Clone, Debug)]
pub struct DirectoryFileProvider {
    root: PathBuf,
}

impl DirectoryFileProvider {
    /// Open (or create) a store directory.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn channel_dir(&self, channel: ChannelIndex) -> PathBuf {
        self.root.join(format!("channel_{channel}"))
    }

    /// Absolute path of a data file.
    pub fn path_of(&self, file: &DataFile) -> PathBuf {
        self.channel_dir(file.channel).join(file.file_name())
    }

    fn not_found(file: &DataFile, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::FileNotFound(*file)
        } else {
            StorageError::Io(e)
        }
    }
}

impl FileProvider for DirectoryFileProvider {
    fn data_files(&self, channel: ChannelIndex) -> StorageResult<Vec<DataFile>> {
        let dir = self.channel_dir(channel);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(file) = entry
                .file_name()
                .to_str()
                .and_then(|name| DataFile::parse_file_name(channel, name))
            {
                files.push(file);
            }
        }
        files.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(files)
    }

    fn channels(&self) -> StorageResult<Vec<ChannelIndex>> {
        let mut channels = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(index) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("channel_"))
                .and_then(|k| k.parse::<u32>().ok())
            else {
                continue;
            };
            let channel = ChannelIndex::new(index);
            if !self.data_files(channel)?.is_empty() {
                channels.push(channel);
            }
        }
        channels.sort();
        Ok(channels)
    }

    fn read(&self, file: &DataFile) -> StorageResult<Bytes> {
        fs::read(self.path_of(file))
            .map(Bytes::from)
            .map_err(|e| Self::not_found(file, e))
    }

    fn read_range(&self, file: &DataFile, offset: u64, len: usize) -> StorageResult<Bytes> {
        let mut handle = File::open(self.path_of(file)).map_err(|e| Self::not_found(file, e))?;
        check_range(file, offset, len, handle.metadata()?.len())?;
        handle.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        handle.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn file_size(&self, file: &DataFile) -> StorageResult<u64> {
        fs::metadata(self.path_of(file))
            .map(|m| m.len())
            .map_err(|e| Self::not_found(file, e))
    }

    fn open_for_append(&self, channel: ChannelIndex, sequence: u64) -> StorageResult<Box<dyn AppendHandle>> {
        let file = DataFile::new(channel, sequence);
        fs::create_dir_all(self.channel_dir(channel))?;
        let path = self.path_of(&file);
        let handle = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = handle.metadata()?.len();
        debug!(%file, size, "opened data file for append");
        Ok(Box::new(DirectoryAppendHandle {
            file,
            path,
            writer: BufWriter::new(handle),
            size,
        }))
    }

    fn delete(&self, file: &DataFile) -> StorageResult<()> {
        match fs::remove_file(self.path_of(file)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_resource(&self, name: &str) -> StorageResult<Option<Bytes>> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_resource(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        let target = self.root.join(name);
        let staging = self.root.join(format!("{name}.tmp"));
        {
            let mut file = File::create(&staging)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)?;
        Ok(())
    }
}

struct DirectoryAppendHandle {
    file: DataFile,
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
}

impl AppendHandle for DirectoryAppendHandle {
    fn file(&self) -> DataFile {
        self.file
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn release(mut self: Box<Self>) -> StorageResult<DataFile> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        debug!(file = %self.file, size = self.size, "released data file");
        Ok(self.file)
    }

    fn discard(self: Box<Self>) -> StorageResult<()> {
        let DirectoryAppendHandle { path, writer, .. } = *self;
        drop(writer);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
