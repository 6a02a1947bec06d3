//! Persistence manager for OGRE.
//!
//! Ties the layers together: [`PersistenceBuilder`] opens a
//! [`ChannelStorage`](ogre_storage::ChannelStorage), binds type handlers to
//! the persisted type dictionary and hands out a [`PersistenceManager`].
//!
//! Storing walks the live graph through the handlers, assigning OIDs on the
//! way, and writes all new records as one batch. Loading reads the eager
//! closure of an OID and rebuilds it in three global passes (create, update,
//! complete) so cycles resolve to the same instances. Lazy fields are linked
//! to the manager and loaded on first access.

mod builder;
mod context;
pub mod error;
mod manager;

pub use builder::PersistenceBuilder;
pub use error::{PersistenceError, PersistenceResult};
pub use manager::PersistenceManager;
