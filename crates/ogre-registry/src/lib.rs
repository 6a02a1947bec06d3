//! Identity registry and lazy references for OGRE.
//!
//! Every live instance that has ever been stored or loaded is bound to exactly
//! one [`Oid`](ogre_types::Oid) by the [`ObjectRegistry`]. Identity is by
//! allocation, not by value: two equal strings held in two `Arc`s are two
//! objects.
//!
//! # Architecture
//!
//! ```text
//! ObjectRegistry ── oid ⇄ instance, OID provider
//!      ▲
//!      │ commit (only after every phase succeeded)
//! LoadSession ──── shells + per-OID LoadPhase
//!
//! Lazy<T> ──────── Empty | Unloaded | Loaded | Cleared, loads via ObjectLoader
//! LazyReferenceManager ── weakly tracks lazies, clears idle ones
//! ```
//!
//! # Modules
//!
//! - [`identity`] -- [`ObjectRegistry`], [`ObjectRef`]
//! - [`session`] -- [`LoadSession`], [`LoadPhase`]
//! - [`lazy`] -- [`Lazy`]
//! - [`manager`] -- [`LazyReferenceManager`]
//! - [`traits`] -- [`ObjectLoader`], [`LazyObserver`], [`LazyClearable`],
//!   [`LazyLink`]

pub mod error;
pub mod identity;
pub mod lazy;
pub mod manager;
pub mod session;
pub mod traits;

pub use error::{LazyError, LazyResult, RegistryError, RegistryResult};
pub use identity::{describe, erase, ObjectRef, ObjectRegistry};
pub use lazy::Lazy;
pub use manager::{LazyClearingTask, LazyReferenceManager};
pub use session::{LoadPhase, LoadSession};
pub use traits::{LazyClearable, LazyLink, LazyObserver, LoaderError, ObjectLoader};
