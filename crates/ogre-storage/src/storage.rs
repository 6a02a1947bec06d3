use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ogre_frame::{EntityFrame, FrameBuffer, FrameCodec, OwnedEntity};
use ogre_types::{ChannelCount, ChannelIndex, Oid};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{StorageConfig, StoreFormat};
use crate::error::{StorageError, StorageResult};
use crate::traits::{DataFile, FileProvider};
use crate::writer::{ChannelWriter, RecordLocation};

/// Per-channel counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub channel: u32,
    pub files: usize,
    /// Live entities (latest record per OID).
    pub entities: usize,
    /// Records shadowed by a newer record of the same OID.
    pub superseded: u64,
    pub gaps: usize,
    pub live_bytes: u64,
}

/// Outcome of [`ChannelStorage::consolidate`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    pub channel: u32,
    pub files_removed: usize,
    pub files_written: usize,
    /// Live records copied.
    pub records: usize,
    pub reclaimed_bytes: u64,
}

type Appended = Vec<(Oid, RecordLocation)>;

struct ChannelState {
    writer: ChannelWriter,
    index: HashMap<Oid, RecordLocation>,
    superseded: u64,
    gaps: usize,
}

impl ChannelState {
    fn record(&mut self, oid: Oid, location: RecordLocation) {
        if self.index.insert(oid, location).is_some() {
            self.superseded += 1;
        }
    }
}

/// Channel-partitioned entity storage.
///
/// Channel `k` owns every OID with `oid mod channel_count == k`. On open each
/// channel's files are scanned newest first to build an OID → location
/// index in which the latest record of an OID wins. Writes are routed to the
/// owning channel; distinct channels are written in parallel.
pub struct ChannelStorage {
    provider: Arc<dyn FileProvider>,
    config: StorageConfig,
    codec: FrameCodec,
    channels: Vec<Mutex<ChannelState>>,
}

impl ChannelStorage {
    /// Open the store behind `config`.
    pub fn open_config(config: StorageConfig) -> StorageResult<Self> {
        let provider = config.open_provider()?;
        Self::open(provider, config)
    }

    /// Open (initializing if empty) the store held by `provider`.
    pub fn open(provider: Arc<dyn FileProvider>, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let expected = config.format();
        match StoreFormat::read(provider.as_ref())? {
            Some(persisted) => expected.check(&persisted)?,
            None => {
                if !provider.is_empty()? {
                    return Err(StorageError::MissingFormat);
                }
                expected.write(provider.as_ref())?;
                debug!(?expected, "initialized store format");
            }
        }

        let codec = FrameCodec::new(config.byte_order);
        let channels = config
            .channel_count
            .channels()
            .map(|channel| index_channel(&provider, &config, codec, channel).map(Mutex::new))
            .collect::<StorageResult<Vec<_>>>()?;

        let storage = Self {
            provider,
            config,
            codec,
            channels,
        };
        info!(
            channels = storage.channels.len(),
            entities = storage.len(),
            "opened channel storage"
        );
        Ok(storage)
    }

    fn state(&self, channel: ChannelIndex) -> MutexGuard<'_, ChannelState> {
        self.channels[channel.as_usize()].lock().expect("lock poisoned")
    }

    pub fn channel_count(&self) -> ChannelCount {
        self.config.channel_count
    }

    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    /// Append every entity record of `buffer` to its owning channel.
    ///
    /// The records become visible only once every channel has written its
    /// share. If a channel fails, nothing of the batch is indexed, and OIDs
    /// that already had a record get that record appended again so the
    /// newest record on disk is still the previous one. Records of new OIDs
    /// from a failed batch stay in their files unreferenced.
    pub fn write_records(&self, buffer: &FrameBuffer) -> StorageResult<usize> {
        if buffer.codec().order() != self.codec.order() {
            return Err(StorageError::FormatMismatch {
                expected: self.codec.order(),
                found: buffer.codec().order(),
            });
        }
        let count = self.config.channel_count;
        let mut groups: Vec<Vec<EntityFrame<'_>>> = vec![Vec::new(); count.get() as usize];
        for frame in buffer.scan() {
            let frame = frame?;
            groups[frame.oid().channel(count).as_usize()].push(frame);
        }
        let active: Vec<(ChannelIndex, Vec<EntityFrame<'_>>)> = count
            .channels()
            .zip(groups)
            .filter(|(_, frames)| !frames.is_empty())
            .collect();
        let written: usize = active.iter().map(|(_, frames)| frames.len()).sum();

        let results: Vec<(ChannelIndex, Appended, StorageResult<()>)> = if active.len() <= 1 {
            active
                .iter()
                .map(|(channel, frames)| {
                    let (appended, result) = self.append_channel(*channel, frames);
                    (*channel, appended, result)
                })
                .collect()
        } else {
            std::thread::scope(|s| {
                let tasks: Vec<_> = active
                    .iter()
                    .map(|(channel, frames)| (*channel, s.spawn(move || self.append_channel(*channel, frames))))
                    .collect();
                tasks
                    .into_iter()
                    .map(|(channel, task)| {
                        let (appended, result) = task.join().expect("channel writer panicked");
                        (channel, appended, result)
                    })
                    .collect()
            })
        };

        let mut batch = Vec::with_capacity(results.len());
        let mut failure = None;
        for (channel, appended, result) in results {
            if let Err(e) = result {
                failure.get_or_insert((channel, e));
            }
            batch.push((channel, appended));
        }
        if let Some((channel, error)) = failure {
            for (channel, appended) in &batch {
                self.restore_previous(*channel, appended);
            }
            warn!(%channel, error = %error, "batch write failed, records not indexed");
            return Err(error);
        }
        for (channel, appended) in batch {
            let mut state = self.state(channel);
            for (oid, location) in appended {
                state.record(oid, location);
            }
        }
        debug!(records = written, channels = active.len(), "wrote records");
        Ok(written)
    }

    fn append_channel(&self, channel: ChannelIndex, frames: &[EntityFrame<'_>]) -> (Appended, StorageResult<()>) {
        let mut state = self.state(channel);
        let mut appended = Vec::with_capacity(frames.len());
        for frame in frames {
            match state.writer.append(frame.bytes()) {
                Ok(location) => appended.push((frame.oid(), location)),
                Err(e) => return (appended, Err(e)),
            }
        }
        (appended, Ok(()))
    }

    /// Re-append the indexed record of every OID in `appended`. Best effort.
    fn restore_previous(&self, channel: ChannelIndex, appended: &Appended) {
        let mut state = self.state(channel);
        for (oid, _) in appended {
            let Some(previous) = state.index.get(oid).copied() else {
                continue;
            };
            let restored = self
                .provider
                .read_range(&previous.file, previous.offset, previous.length as usize)
                .and_then(|bytes| state.writer.append(&bytes));
            match restored {
                Ok(location) => {
                    state.index.insert(*oid, location);
                    state.superseded += 1;
                }
                Err(e) => warn!(%oid, error = %e, "failed to restore previous record"),
            }
        }
    }

    /// Rewrite the live records of `channel` into fresh files and delete the
    /// files they came from, reclaiming superseded records and gaps.
    ///
    /// The new files are released before anything is deleted. Until the old
    /// files are gone both copies exist and the newer one wins.
    pub fn consolidate(&self, channel: ChannelIndex) -> StorageResult<ConsolidationReport> {
        let mut state = self.state(channel);
        state.writer.release_current()?;
        let old_files = self.provider.data_files(channel)?;
        let mut report = ConsolidationReport {
            channel: channel.get(),
            files_removed: old_files.len(),
            ..ConsolidationReport::default()
        };
        if old_files.is_empty() {
            return Ok(report);
        }
        let bytes_before = old_files
            .iter()
            .map(|file| self.provider.file_size(file))
            .sum::<StorageResult<u64>>()?;

        let mut live: Vec<(Oid, RecordLocation)> = state.index.iter().map(|(oid, l)| (*oid, *l)).collect();
        live.sort_by_key(|(_, l)| (l.file.sequence, l.offset));

        let mut writer = ChannelWriter::resume(Arc::clone(&self.provider), channel, self.config.max_file_size)?;
        let mut relocated = HashMap::with_capacity(live.len());
        for (oid, location) in &live {
            let copied = self
                .provider
                .read_range(&location.file, location.offset, location.length as usize)
                .and_then(|bytes| writer.append(&bytes));
            match copied {
                Ok(new_location) => {
                    relocated.insert(*oid, new_location);
                }
                Err(e) => {
                    writer.discard();
                    return Err(e);
                }
            }
        }
        let new_files = writer.seal()?;

        state.index = relocated;
        state.superseded = 0;
        state.gaps = 0;
        for file in &old_files {
            self.provider.delete(file)?;
        }
        state.writer = ChannelWriter::resume(Arc::clone(&self.provider), channel, self.config.max_file_size)?;

        report.files_written = new_files.len();
        report.records = live.len();
        let bytes_after = state.index.values().map(|l| l.length).sum::<u64>();
        report.reclaimed_bytes = bytes_before.saturating_sub(bytes_after);
        info!(
            %channel,
            removed = report.files_removed,
            written = report.files_written,
            reclaimed = report.reclaimed_bytes,
            "consolidated channel"
        );
        Ok(report)
    }

    /// [`consolidate`](Self::consolidate) every channel.
    pub fn consolidate_all(&self) -> StorageResult<Vec<ConsolidationReport>> {
        self.config
            .channel_count
            .channels()
            .map(|channel| self.consolidate(channel))
            .collect()
    }

    /// The latest record of `oid`, if stored.
    pub fn read_entity(&self, oid: Oid) -> StorageResult<Option<OwnedEntity>> {
        let location = match self.location(oid) {
            Some(location) => location,
            None => return Ok(None),
        };
        let bytes = self
            .provider
            .read_range(&location.file, location.offset, location.length as usize)?;
        OwnedEntity::parse(&self.codec, bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                file: location.file,
                source,
            })
    }

    pub fn location(&self, oid: Oid) -> Option<RecordLocation> {
        let channel = oid.channel(self.config.channel_count);
        self.state(channel).index.get(&oid).copied()
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.location(oid).is_some()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.lock().expect("lock poisoned").index.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest OID of any live entity.
    pub fn highest_oid(&self) -> Option<Oid> {
        self.channels
            .iter()
            .filter_map(|c| c.lock().expect("lock poisoned").index.keys().max().copied())
            .max()
    }

    /// Every live OID, sorted.
    pub fn oids(&self) -> Vec<Oid> {
        let mut oids: Vec<Oid> = self
            .channels
            .iter()
            .flat_map(|c| {
                c.lock()
                    .expect("lock poisoned")
                    .index
                    .keys()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect();
        oids.sort();
        oids
    }

    pub fn stats(&self) -> StorageResult<Vec<ChannelStats>> {
        self.config
            .channel_count
            .channels()
            .map(|channel| {
                let files = self.provider.data_files(channel)?.len();
                let state = self.state(channel);
                Ok(ChannelStats {
                    channel: channel.get(),
                    files,
                    entities: state.index.len(),
                    superseded: state.superseded,
                    gaps: state.gaps,
                    live_bytes: state.index.values().map(|l| l.length).sum(),
                })
            })
            .collect()
    }

    pub fn load_type_dictionary(&self) -> StorageResult<Option<String>> {
        self.provider.load_type_dictionary()
    }

    pub fn store_type_dictionary(&self, text: &str) -> StorageResult<()> {
        self.provider.store_type_dictionary(text)
    }

    /// Make every written record durable. Later writes start new files.
    pub fn sync(&self) -> StorageResult<()> {
        for channel in &self.channels {
            channel.lock().expect("lock poisoned").writer.release_current()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChannelStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStorage")
            .field("channel_count", &self.config.channel_count)
            .field("byte_order", &self.codec.order())
            .finish()
    }
}

fn index_channel(
    provider: &Arc<dyn FileProvider>,
    config: &StorageConfig,
    codec: FrameCodec,
    channel: ChannelIndex,
) -> StorageResult<ChannelState> {
    let mut state = ChannelState {
        writer: ChannelWriter::resume(Arc::clone(provider), channel, config.max_file_size)?,
        index: HashMap::new(),
        superseded: 0,
        gaps: 0,
    };
    for file in provider.data_files(channel)? {
        let (latest, shadowed, gaps) = scan_file(provider.as_ref(), codec, &file, config.channel_count)?;
        state.superseded += shadowed;
        state.gaps += gaps;
        for (oid, location) in latest {
            if state.index.contains_key(&oid) {
                state.superseded += 1;
            } else {
                state.index.insert(oid, location);
            }
        }
    }
    debug!(%channel, entities = state.index.len(), "indexed channel");
    Ok(state)
}

/// Latest record per OID within one file, plus shadowed and gap counts.
fn scan_file(
    provider: &dyn FileProvider,
    codec: FrameCodec,
    file: &DataFile,
    count: ChannelCount,
) -> StorageResult<(HashMap<Oid, RecordLocation>, u64, usize)> {
    let bytes = provider.read(file)?;
    let mut latest = HashMap::new();
    let mut shadowed = 0;
    let mut scanner = codec.scan(&bytes);
    for frame in scanner.by_ref() {
        let frame = frame.map_err(|source| StorageError::Corrupt { file: *file, source })?;
        let oid = frame.oid();
        if !file.channel.owns(oid, count) {
            return Err(StorageError::ChannelMismatch {
                file: *file,
                oid,
                expected: oid.channel(count),
            });
        }
        let location = RecordLocation {
            file: *file,
            offset: frame.offset as u64,
            length: frame.header.length,
        };
        if latest.insert(oid, location).is_some() {
            shadowed += 1;
        }
    }
    Ok((latest, shadowed, scanner.gaps_skipped()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryFileProvider;
    use crate::failing::FailingProvider;
    use crate::memory::InMemoryFileProvider;
    use ogre_frame::ByteOrder;
    use ogre_types::TypeId;

    fn config(channels: u32) -> StorageConfig {
        StorageConfig {
            channel_count: ChannelCount::new(channels).unwrap(),
            max_file_size: 256,
            ..StorageConfig::default()
        }
    }

    fn batch(records: &[(u64, &[u8])]) -> FrameBuffer {
        let mut buffer = FrameBuffer::new(FrameCodec::new(ByteOrder::Little));
        for (oid, payload) in records {
            buffer
                .push_entity(TypeId::FIRST_CUSTOM, Oid::new(*oid), payload)
                .unwrap();
        }
        buffer
    }

    #[test]
    fn routes_records_by_channel() {
        let provider = InMemoryFileProvider::new();
        let storage = ChannelStorage::open(Arc::new(provider.clone()), config(4)).unwrap();
        storage
            .write_records(&batch(&[(10, b"a"), (11, b"b"), (12, b"c"), (13, b"d"), (14, b"e")]))
            .unwrap();
        assert_eq!(storage.len(), 5);
        assert_eq!(storage.location(Oid::new(14)).unwrap().file.channel, ChannelIndex::new(2));
        assert_eq!(storage.read_entity(Oid::new(13)).unwrap().unwrap().payload(), b"d");
        assert!(storage.read_entity(Oid::new(99)).unwrap().is_none());
        assert_eq!(storage.highest_oid(), Some(Oid::new(14)));
    }

    #[test]
    fn reopen_rebuilds_latest_wins_index() {
        let provider = InMemoryFileProvider::new();
        {
            let storage = ChannelStorage::open(Arc::new(provider.clone()), config(2)).unwrap();
            storage.write_records(&batch(&[(4, b"old"), (6, b"six")])).unwrap();
            storage.sync().unwrap();
            storage.write_records(&batch(&[(4, b"new")])).unwrap();
            storage.write_records(&batch(&[(4, b"newest")])).unwrap();
            storage.sync().unwrap();
        }
        let storage = ChannelStorage::open(Arc::new(provider), config(2)).unwrap();
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.read_entity(Oid::new(4)).unwrap().unwrap().payload(), b"newest");
        let stats = storage.stats().unwrap();
        assert_eq!(stats[0].files, 2);
        assert_eq!(stats[0].superseded, 2);
    }

    #[test]
    fn rejects_mismatched_format() {
        let provider = InMemoryFileProvider::new();
        ChannelStorage::open(Arc::new(provider.clone()), config(2)).unwrap();
        assert!(matches!(
            ChannelStorage::open(Arc::new(provider.clone()), config(3)),
            Err(StorageError::ChannelCountMismatch { .. })
        ));
        let big = StorageConfig {
            byte_order: ByteOrder::Big,
            ..config(2)
        };
        assert!(matches!(
            ChannelStorage::open(Arc::new(provider), big),
            Err(StorageError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn detects_misplaced_records_and_missing_format() {
        let provider = InMemoryFileProvider::new();
        ChannelStorage::open(Arc::new(provider.clone()), config(2)).unwrap();
        let misplaced = batch(&[(3, b"odd")]);
        provider.put_file(DataFile::new(ChannelIndex::new(0), 1), misplaced.as_slice().to_vec());
        assert!(matches!(
            ChannelStorage::open(Arc::new(provider), config(2)),
            Err(StorageError::ChannelMismatch { oid, .. }) if oid == Oid::new(3)
        ));

        let orphan = InMemoryFileProvider::new();
        orphan.put_file(DataFile::new(ChannelIndex::new(0), 1), Vec::new());
        assert!(matches!(
            ChannelStorage::open(Arc::new(orphan), config(1)),
            Err(StorageError::MissingFormat)
        ));
    }

    #[test]
    fn corrupt_file_names_the_file() {
        let provider = InMemoryFileProvider::new();
        ChannelStorage::open(Arc::new(provider.clone()), config(1)).unwrap();
        provider.put_file(DataFile::new(ChannelIndex::new(0), 1), vec![0; 16]);
        match ChannelStorage::open(Arc::new(provider), config(1)) {
            Err(StorageError::Corrupt { file, .. }) => assert_eq!(file.sequence, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rotation_spreads_records_over_files() {
        let provider = InMemoryFileProvider::new();
        let storage = ChannelStorage::open(Arc::new(provider.clone()), config(1)).unwrap();
        let payload = [7u8; 100];
        let records: Vec<(u64, &[u8])> = (10..16).map(|oid| (oid, &payload[..])).collect();
        storage.write_records(&batch(&records)).unwrap();
        // 124-byte records, at most two per 256-byte file.
        assert_eq!(storage.stats().unwrap()[0].files, 3);
        for oid in 10..16 {
            assert_eq!(storage.read_entity(Oid::new(oid)).unwrap().unwrap().payload(), &payload);
        }
    }

    #[test]
    fn directory_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            directory: Some(dir.path().to_path_buf()),
            ..config(3)
        };
        {
            let storage = ChannelStorage::open_config(config.clone()).unwrap();
            storage
                .write_records(&batch(&[(30, b"x"), (31, b"y"), (32, b"z")]))
                .unwrap();
            storage.store_type_dictionary("1000000 app.X {\n}\n").unwrap();
            storage.sync().unwrap();
        }
        assert!(dir.path().join("store_format.toml").exists());
        let storage = ChannelStorage::open_config(config).unwrap();
        assert_eq!(storage.oids(), vec![Oid::new(30), Oid::new(31), Oid::new(32)]);
        assert_eq!(storage.read_entity(Oid::new(31)).unwrap().unwrap().payload(), b"y");
        assert!(storage.load_type_dictionary().unwrap().is_some());
    }

    #[test]
    fn failed_batch_is_not_indexed_and_keeps_previous_records() {
        let provider = FailingProvider::default();
        {
            let storage = ChannelStorage::open(Arc::new(provider.inner.clone()), config(2)).unwrap();
            storage.write_records(&batch(&[(4, b"old")])).unwrap();
            storage.sync().unwrap();
        }
        let flaky = FailingProvider {
            fail_append: Some(ChannelIndex::new(1)),
            ..provider.clone()
        };
        let storage = ChannelStorage::open(Arc::new(flaky), config(2)).unwrap();
        let result = storage.write_records(&batch(&[(4, b"new"), (6, b"six"), (5, b"five")]));
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(storage.read_entity(Oid::new(4)).unwrap().unwrap().payload(), b"old");
        assert!(!storage.contains(Oid::new(6)));
        assert!(!storage.contains(Oid::new(5)));
        drop(storage);

        let reopened = ChannelStorage::open(Arc::new(provider.inner), config(2)).unwrap();
        assert_eq!(reopened.read_entity(Oid::new(4)).unwrap().unwrap().payload(), b"old");
        assert!(!reopened.contains(Oid::new(5)));
    }

    #[test]
    fn consolidation_reclaims_superseded_records_and_gaps() {
        let provider = InMemoryFileProvider::new();
        ChannelStorage::open(Arc::new(provider.clone()), config(1)).unwrap();
        let mut first = FrameBuffer::new(FrameCodec::new(ByteOrder::Little));
        first.push_entity(TypeId::FIRST_CUSTOM, Oid::new(4), b"a").unwrap();
        first.push_gap(16).unwrap();
        first.push_entity(TypeId::FIRST_CUSTOM, Oid::new(5), b"b").unwrap();
        provider.put_file(DataFile::new(ChannelIndex::new(0), 1), first.as_slice().to_vec());

        let storage = ChannelStorage::open(Arc::new(provider.clone()), config(1)).unwrap();
        storage.write_records(&batch(&[(4, b"c")])).unwrap();
        let before = storage.stats().unwrap().remove(0);
        assert_eq!((before.files, before.superseded, before.gaps), (2, 1, 1));
        let bytes_before = provider.total_bytes();

        let report = storage.consolidate(ChannelIndex::new(0)).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.files_removed, 2);
        assert_eq!(report.files_written, 1);
        assert_eq!(report.reclaimed_bytes, bytes_before - provider.total_bytes());
        assert_eq!(provider.all_files(), vec![DataFile::new(ChannelIndex::new(0), 3)]);

        let after = storage.stats().unwrap().remove(0);
        assert_eq!((after.files, after.superseded, after.gaps), (1, 0, 0));
        assert_eq!(storage.read_entity(Oid::new(4)).unwrap().unwrap().payload(), b"c");

        storage.write_records(&batch(&[(6, b"d")])).unwrap();
        assert_eq!(storage.location(Oid::new(6)).unwrap().file.sequence, 4);
        drop(storage);
        let reopened = ChannelStorage::open(Arc::new(provider), config(1)).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.read_entity(Oid::new(4)).unwrap().unwrap().payload(), b"c");
        assert_eq!(reopened.read_entity(Oid::new(5)).unwrap().unwrap().payload(), b"b");
    }

    #[test]
    fn consolidating_an_empty_channel_is_a_no_op() {
        let storage = ChannelStorage::open(Arc::new(InMemoryFileProvider::new()), config(2)).unwrap();
        let reports = storage.consolidate_all().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.files_removed == 0 && r.records == 0));
    }

    #[test]
    fn wrong_byte_order_batch_rejected() {
        let storage = ChannelStorage::open(Arc::new(InMemoryFileProvider::new()), config(1)).unwrap();
        let mut buffer = FrameBuffer::new(FrameCodec::new(ByteOrder::Big));
        buffer.push_entity(TypeId::FIRST_CUSTOM, Oid::new(5), b"").unwrap();
        assert!(matches!(
            storage.write_records(&buffer),
            Err(StorageError::FormatMismatch { .. })
        ));
    }
}
