use ogre_frame::FrameError;
use ogre_registry::{LazyError, RegistryError};
use ogre_types::{Oid, TypeId};

/// Errors from type handler registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// No handler is registered for the instance's Rust type.
    #[error("no type handler registered for {rust_type}")]
    NoHandlerForType { rust_type: String },

    /// A record carries a type id no handler is registered for.
    #[error("unknown type id {type_id} in record of object {oid}")]
    UnknownTypeId { type_id: TypeId, oid: Oid },

    /// An instance or resolved reference is not of the expected Rust type.
    #[error("object {oid} is not a {expected}")]
    TypeMismatch { oid: Oid, expected: &'static str },

    /// The persisted layout of a type differs from its registered handler.
    #[error("type {type_name} changed: persisted {persisted}, registered {current}")]
    DescriptorMismatch {
        type_name: String,
        persisted: String,
        current: String,
    },

    /// Two handlers were registered for the same type.
    #[error("type {type_name} is already registered")]
    DuplicateType { type_name: String },

    /// The type dictionary text could not be parsed.
    #[error("type dictionary line {line}: {reason}")]
    InvalidDictionary { line: usize, reason: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Lazy(#[from] LazyError),
}

/// Result alias for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
