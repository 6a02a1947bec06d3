use ogre_types::Oid;

use crate::session::LoadPhase;
use crate::traits::LoaderError;

/// Errors from the identity registry and load sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The OID is bound to another instance, or the instance to another OID.
    #[error("identity conflict for {oid}: registered {existing}, incoming {incoming}")]
    IdentityConflict {
        oid: Oid,
        existing: String,
        incoming: String,
    },

    /// An instance was requested before its shell exists.
    #[error("{oid} looked up before its shell was created")]
    PrematureLookup { oid: Oid },

    /// A load phase was entered out of order.
    #[error("{oid} cannot move from {from} to {to}")]
    PhaseViolation {
        oid: Oid,
        from: LoadPhase,
        to: LoadPhase,
    },

    /// The null OID cannot be bound to an instance.
    #[error("the null OID cannot be registered")]
    NullOid,

    /// The OID space above the reserved threshold is used up.
    #[error("object identifiers exhausted")]
    OidExhausted,
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from dereferencing a [`Lazy`](crate::Lazy).
#[derive(Debug, thiserror::Error)]
pub enum LazyError {
    /// The lazy has an OID but nothing to load it with.
    #[error("no loader linked for {0}")]
    NoLoader(Oid),

    /// The loader failed.
    #[error("failed to load {oid}: {source}")]
    Load {
        oid: Oid,
        #[source]
        source: LoaderError,
    },

    /// The loaded instance is not of the lazy's referent type.
    #[error("{oid} is not a {expected}")]
    TypeMismatch { oid: Oid, expected: &'static str },
}

/// Result alias for lazy dereferencing.
pub type LazyResult<T> = Result<T, LazyError>;
