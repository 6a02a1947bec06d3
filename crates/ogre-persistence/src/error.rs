use ogre_frame::FrameError;
use ogre_handler::HandlerError;
use ogre_registry::RegistryError;
use ogre_storage::StorageError;
use ogre_types::Oid;

/// Errors from storing and loading object graphs.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A reachable OID has no record in storage.
    #[error("object {0} is not in storage")]
    ObjectNotFound(Oid),

    /// A loaded instance is not of the requested Rust type.
    #[error("object {oid} is not a {expected}")]
    TypeMismatch { oid: Oid, expected: &'static str },

    /// The roots record could not be decoded.
    #[error("malformed roots record: {0}")]
    MalformedRoots(String),

    /// The manager was dropped while a lazy still pointed at it.
    #[error("persistence manager is closed")]
    Closed,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
