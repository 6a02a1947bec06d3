//! Type handlers for OGRE.
//!
//! A [`TypeHandler`] knows how to flatten one Rust type into a record payload
//! and how to rebuild it in three load phases. Application types describe
//! themselves with [`EntityHandlerBuilder`] instead of reflection; strings,
//! number lists and [`ObjectList`] have built-in handlers.
//!
//! Every registered type is recorded in the [`TypeDictionary`], the persisted
//! catalogue that pins type ids and field layouts across sessions.
//!
//! # Modules
//!
//! - [`traits`] -- [`TypeHandler`], [`StoreContext`], [`LoadContext`]
//! - [`descriptor`] -- [`FieldKind`], [`FieldDescriptor`], [`TypeDescriptor`]
//! - [`dictionary`] -- [`TypeDictionary`] text format
//! - [`entity`] -- [`EntityHandlerBuilder`] and [`FieldValue`]
//! - [`builtin`] -- handlers for `String`, `Vec<i64>` and [`ObjectList`]
//! - [`registry`] -- [`TypeHandlerRegistry`]

pub mod builtin;
pub mod descriptor;
pub mod dictionary;
pub mod entity;
pub mod error;
pub mod registry;
pub mod traits;

pub use builtin::{I64ListHandler, ObjectList, ObjectListHandler, StringHandler};
pub use descriptor::{FieldDescriptor, FieldKind, TypeDescriptor};
pub use dictionary::TypeDictionary;
pub use entity::{EntityHandler, EntityHandlerBuilder, FieldValue};
pub use error::{HandlerError, HandlerResult};
pub use registry::{RegisteredHandler, TypeHandlerRegistry};
pub use traits::{LoadContext, StoreContext, TypeHandler};
