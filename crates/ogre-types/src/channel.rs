use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::oid::Oid;

/// Number of channels a store is partitioned into.
///
/// Fixed for the lifetime of a store; only the resharding engine changes it,
/// by rewriting every record into a new store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ChannelCount(u32);

impl ChannelCount {
    pub const ONE: ChannelCount = ChannelCount(1);

    pub fn new(count: u32) -> Result<Self, TypeError> {
        if count == 0 {
            return Err(TypeError::InvalidChannelCount(count));
        }
        Ok(Self(count))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// `channel(oid) = oid mod channelCount`.
    pub fn channel_of(self, oid: Oid) -> ChannelIndex {
        ChannelIndex((oid.value() % u64::from(self.0)) as u32)
    }

    /// Validate that `index` is a channel of this count.
    pub fn index(self, index: u32) -> Result<ChannelIndex, TypeError> {
        if index >= self.0 {
            return Err(TypeError::ChannelOutOfRange {
                index,
                count: self.0,
            });
        }
        Ok(ChannelIndex(index))
    }

    /// Iterate over all channel indices in ascending order.
    pub fn channels(self) -> impl Iterator<Item = ChannelIndex> {
        (0..self.0).map(ChannelIndex)
    }
}

impl TryFrom<u32> for ChannelCount {
    type Error = TypeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelCount> for u32 {
    fn from(count: ChannelCount) -> Self {
        count.0
    }
}

impl fmt::Debug for ChannelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelCount({})", self.0)
    }
}

impl fmt::Display for ChannelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of one channel within a [`ChannelCount`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelIndex(u32);

impl ChannelIndex {
    /// An index not yet checked against a count; see [`ChannelCount::index`].
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether `oid` belongs to this channel under `count`.
    pub fn owns(self, oid: Oid, count: ChannelCount) -> bool {
        count.channel_of(oid) == self
    }
}

impl fmt::Debug for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelIndex({})", self.0)
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
