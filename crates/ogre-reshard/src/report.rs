use serde::Serialize;

/// What one target channel received.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TargetChannelReport {
    pub channel: u32,
    pub records: u64,
    pub bytes: u64,
    pub files: usize,
}

/// Summary of a completed resharding run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReshardReport {
    pub source_channels: u32,
    pub target_channels: u32,
    pub files_read: usize,
    pub files_written: usize,
    /// Records copied to the target.
    pub transferred: u64,
    /// Older records of an OID that was already transferred.
    pub superseded: u64,
    pub gaps_skipped: usize,
    pub bytes_transferred: u64,
    pub dictionary_copied: bool,
    pub targets: Vec<TargetChannelReport>,
}

/// Counters gathered from one source channel.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SourceTally {
    pub files_read: usize,
    pub transferred: u64,
    pub superseded: u64,
    pub gaps_skipped: usize,
    pub bytes: u64,
}

impl SourceTally {
    pub(crate) fn merge(&mut self, other: SourceTally) {
        self.files_read += other.files_read;
        self.transferred += other.transferred;
        self.superseded += other.superseded;
        self.gaps_skipped += other.gaps_skipped;
        self.bytes += other.bytes;
    }
}
