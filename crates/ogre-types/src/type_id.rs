use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Persisted type identifier.
///
/// Written into every entity header and keyed into the store's type
/// dictionary. A type id is never reused for a structurally different type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u64);

impl TypeId {
    /// Type id of the roots record.
    pub const ROOTS: TypeId = TypeId(1);

    /// First id assigned to registered handlers.
    pub const FIRST_CUSTOM: TypeId = TypeId(1_000_000);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TypeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for TypeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| TypeError::InvalidIdentifier(format!("type id {s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_start_above_roots() {
        assert!(TypeId::ROOTS < TypeId::FIRST_CUSTOM);
        assert_eq!(TypeId::FIRST_CUSTOM.next().value(), 1_000_001);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("1000000".parse::<TypeId>().unwrap(), TypeId::FIRST_CUSTOM);
        assert!(matches!(
            "x1".parse::<TypeId>(),
            Err(TypeError::InvalidIdentifier(_))
        ));
    }
}
