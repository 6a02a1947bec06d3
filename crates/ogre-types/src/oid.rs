use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelCount, ChannelIndex};
use crate::error::TypeError;

/// Object identifier of a persisted instance.
///
/// OIDs are assigned monotonically and never change once bound to an
/// instance. The value space is split into ranges:
///
/// - `0` is the null reference ([`Oid::NULL`])
/// - `1` is the roots record ([`Oid::ROOTS`])
/// - everything below [`Oid::DEFAULT_ENTITY_START`] is reserved for constants
///   and roots unless a store is configured with a different threshold
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(u64);

impl Oid {
    /// The null reference.
    pub const NULL: Oid = Oid(0);

    /// OID of the roots record.
    pub const ROOTS: Oid = Oid(1);

    /// First OID handed out to application instances by default.
    pub const DEFAULT_ENTITY_START: u64 = 1_000_000_000_000_000_000;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The channel owning this OID under the given channel count.
    pub fn channel(self, count: ChannelCount) -> ChannelIndex {
        count.channel_of(self)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Oid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Oid> for u64 {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| TypeError::InvalidIdentifier(format!("oid {s:?}: {e}")))
    }
}
