use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use ogre_frame::{EntityFrame, FrameCodec};
use ogre_storage::{
    ChannelWriter, DataFile, FileProvider, StorageConfig, StoreFormat, STORE_FORMAT_RESOURCE,
};
use ogre_types::{ChannelCount, ChannelIndex, Oid};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{ReshardError, ReshardResult};
use crate::report::{ReshardReport, SourceTally, TargetChannelReport};

/// Rewrites a store under a different channel count.
///
/// Each source channel is read newest file first. The first record met for
/// an OID is the latest one and is copied verbatim to target channel
/// `oid mod target_count`; every older record of that OID is skipped. Type
/// handlers are never involved.
///
/// The target store format is written only after every output file was
/// sealed, so a target without a format is an unfinished conversion. On any
/// failure the output files are discarded.
pub struct ReshardEngine {
    source: Arc<dyn FileProvider>,
    target: Arc<dyn FileProvider>,
    source_format: StoreFormat,
    target_format: StoreFormat,
    max_file_size: u64,
    parallel: bool,
    cancel: CancellationToken,
}

impl ReshardEngine {
    /// An engine copying `source` into the empty `target` laid out per `target_config`.
    pub fn new(
        source: Arc<dyn FileProvider>,
        target: Arc<dyn FileProvider>,
        target_config: &StorageConfig,
    ) -> ReshardResult<Self> {
        target_config.validate()?;
        let source_format =
            StoreFormat::read(source.as_ref())?.ok_or(ReshardError::MissingSourceFormat)?;
        let target_format = target_config.format();
        if source_format.byte_order != target_format.byte_order {
            return Err(ReshardError::ByteOrderMismatch {
                source_order: source_format.byte_order,
                target_order: target_format.byte_order,
            });
        }
        if !target.is_empty()? || target.read_resource(STORE_FORMAT_RESOURCE)?.is_some() {
            return Err(ReshardError::TargetNotEmpty);
        }
        Ok(Self {
            source,
            target,
            source_format,
            target_format,
            max_file_size: target_config.max_file_size,
            parallel: true,
            cancel: CancellationToken::new(),
        })
    }

    /// An engine between the stores two configurations point at.
    pub fn from_configs(source: &StorageConfig, target: &StorageConfig) -> ReshardResult<Self> {
        Self::new(source.open_provider()?, target.open_provider()?, target)
    }

    /// Process source channels one after another instead of in parallel.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn source_format(&self) -> StoreFormat {
        self.source_format
    }

    pub fn target_format(&self) -> StoreFormat {
        self.target_format
    }

    /// Run the conversion.
    pub fn run(&self) -> ReshardResult<ReshardReport> {
        let source_count = self.source_format.channel_count;
        let target_count = self.target_format.channel_count;
        info!(
            source_channels = source_count.get(),
            target_channels = target_count.get(),
            parallel = self.parallel,
            "starting reshard"
        );

        let dictionary = self.source.load_type_dictionary()?;
        if let Some(text) = &dictionary {
            self.target.store_type_dictionary(text)?;
        }

        let writers: Vec<Mutex<ChannelWriter>> = target_count
            .channels()
            .map(|channel| {
                Mutex::new(ChannelWriter::new(
                    Arc::clone(&self.target),
                    channel,
                    self.max_file_size,
                    1,
                ))
            })
            .collect();

        let tally = match self.copy_channels(source_count, &writers) {
            Ok(tally) => tally,
            Err(e) => {
                warn!(error = %e, "reshard aborted, discarding output");
                for writer in writers {
                    writer.into_inner().expect("lock poisoned").discard();
                }
                return Err(e);
            }
        };

        let (targets, sealed) = self.seal_all(writers)?;
        if let Err(e) = self.target_format.write(self.target.as_ref()) {
            warn!(error = %e, "writing target format failed, discarding output");
            self.delete_sealed(&sealed);
            return Err(e.into());
        }

        let report = ReshardReport {
            source_channels: source_count.get(),
            target_channels: target_count.get(),
            files_read: tally.files_read,
            files_written: targets.iter().map(|t| t.files).sum(),
            transferred: tally.transferred,
            superseded: tally.superseded,
            gaps_skipped: tally.gaps_skipped,
            bytes_transferred: tally.bytes,
            dictionary_copied: dictionary.is_some(),
            targets,
        };
        info!(
            transferred = report.transferred,
            superseded = report.superseded,
            files_written = report.files_written,
            "reshard complete"
        );
        Ok(report)
    }

    /// Seal every target writer. If one fails, the files already sealed and
    /// the remaining writers are discarded.
    fn seal_all(
        &self,
        writers: Vec<Mutex<ChannelWriter>>,
    ) -> ReshardResult<(Vec<TargetChannelReport>, Vec<DataFile>)> {
        let mut targets = Vec::with_capacity(writers.len());
        let mut sealed = Vec::new();
        let mut remaining = writers
            .into_iter()
            .map(|writer| writer.into_inner().expect("lock poisoned"));
        while let Some(writer) = remaining.next() {
            let channel = writer.channel();
            let (records, bytes) = (writer.records_written(), writer.bytes_written());
            match writer.seal() {
                Ok(files) => {
                    targets.push(TargetChannelReport {
                        channel: channel.get(),
                        records,
                        bytes,
                        files: files.len(),
                    });
                    sealed.extend(files);
                }
                Err(e) => {
                    warn!(%channel, error = %e, "sealing failed, discarding output");
                    for writer in remaining.by_ref() {
                        writer.discard();
                    }
                    self.delete_sealed(&sealed);
                    return Err(e.into());
                }
            }
        }
        Ok((targets, sealed))
    }

    fn delete_sealed(&self, files: &[DataFile]) {
        for file in files {
            if let Err(e) = self.target.delete(file) {
                warn!(%file, error = %e, "failed to delete sealed output file");
            }
        }
    }

    fn copy_channels(
        &self,
        source_count: ChannelCount,
        writers: &[Mutex<ChannelWriter>],
    ) -> ReshardResult<SourceTally> {
        let results: Vec<ReshardResult<SourceTally>> = if self.parallel {
            std::thread::scope(|s| {
                let tasks: Vec<_> = source_count
                    .channels()
                    .map(|channel| s.spawn(move || self.copy_channel_or_cancel(channel, writers)))
                    .collect();
                tasks
                    .into_iter()
                    .map(|task| task.join().expect("reshard worker panicked"))
                    .collect()
            })
        } else {
            let mut results = Vec::new();
            for channel in source_count.channels() {
                let result = self.copy_channel_or_cancel(channel, writers);
                let failed = result.is_err();
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        };

        let mut total = SourceTally::default();
        let mut cancelled = false;
        for result in results {
            match result {
                Ok(tally) => total.merge(tally),
                Err(ReshardError::Cancelled) => cancelled = true,
                Err(e) => return Err(e),
            }
        }
        if cancelled {
            return Err(ReshardError::Cancelled);
        }
        Ok(total)
    }

    /// Copy one channel; a failure cancels the other channels.
    fn copy_channel_or_cancel(
        &self,
        channel: ChannelIndex,
        writers: &[Mutex<ChannelWriter>],
    ) -> ReshardResult<SourceTally> {
        let result = self.copy_channel(channel, writers);
        if let Err(e) = &result {
            if !matches!(e, ReshardError::Cancelled) {
                self.cancel.cancel();
            }
        }
        result
    }

    fn copy_channel(
        &self,
        channel: ChannelIndex,
        writers: &[Mutex<ChannelWriter>],
    ) -> ReshardResult<SourceTally> {
        let codec = FrameCodec::new(self.source_format.byte_order);
        let mut transferred: HashSet<Oid> = HashSet::new();
        let mut tally = SourceTally::default();

        for file in self.source.data_files(channel)? {
            if self.cancel.is_cancelled() {
                return Err(ReshardError::Cancelled);
            }
            let bytes = self.source.read(&file)?;
            let frames = self.scan_file(&codec, &file, &bytes, &mut tally)?;

            let mut latest: HashMap<Oid, usize> = HashMap::with_capacity(frames.len());
            for frame in &frames {
                latest.insert(frame.oid(), frame.offset);
            }

            let mut batches: Vec<Vec<&[u8]>> = vec![Vec::new(); writers.len()];
            for frame in &frames {
                let oid = frame.oid();
                if latest[&oid] != frame.offset || !transferred.insert(oid) {
                    tally.superseded += 1;
                    continue;
                }
                let target = oid.channel(self.target_format.channel_count);
                batches[target.as_usize()].push(frame.bytes());
                tally.transferred += 1;
                tally.bytes += frame.header.length;
            }
            for (target, records) in batches.iter().enumerate() {
                if records.is_empty() {
                    continue;
                }
                let mut writer = writers[target].lock().expect("lock poisoned");
                for record in records {
                    writer.append(record)?;
                }
            }
            tally.files_read += 1;
            debug!(%file, transferred = transferred.len(), "resharded source file");
        }
        Ok(tally)
    }

    /// Every live frame of `file`, checked against the source channel layout.
    fn scan_file<'a>(
        &self,
        codec: &FrameCodec,
        file: &DataFile,
        bytes: &'a [u8],
        tally: &mut SourceTally,
    ) -> ReshardResult<Vec<EntityFrame<'a>>> {
        let count = self.source_format.channel_count;
        let mut scanner = codec.scan(bytes);
        let mut frames = Vec::new();
        for frame in scanner.by_ref() {
            let frame = frame.map_err(|source| ReshardError::Corrupt { file: *file, source })?;
            let oid = frame.oid();
            if !file.channel.owns(oid, count) {
                return Err(ReshardError::MisplacedRecord {
                    file: *file,
                    oid,
                    expected: oid.channel(count),
                });
            }
            frames.push(frame);
        }
        tally.gaps_skipped += scanner.gaps_skipped();
        Ok(frames)
    }
}

impl std::fmt::Debug for ReshardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReshardEngine")
            .field("source", &self.source_format)
            .field("target", &self.target_format)
            .field("parallel", &self.parallel)
            .finish()
    }
}
