//! Foundation types for OGRE, the Object Graph Record Engine.
//!
//! Every other OGRE crate depends on `ogre-types`. The types here are plain
//! values with no I/O: they describe *which* object a record belongs to,
//! *which* type handler understands it, and *which* channel stores it.
//!
//! # Key Types
//!
//! - [`Oid`] -- 64-bit object identifier, unique for the lifetime of a store
//! - [`TypeId`] -- persisted type identifier keyed into the type dictionary
//! - [`ChannelCount`] / [`ChannelIndex`] -- the static OID partitioning that
//!   makes channels the unit of storage parallelism

pub mod channel;
pub mod error;
pub mod oid;
pub mod type_id;

pub use channel::{ChannelCount, ChannelIndex};
pub use error::TypeError;
pub use oid::Oid;
pub use type_id::TypeId;
