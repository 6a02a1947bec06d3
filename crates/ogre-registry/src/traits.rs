use std::sync::Arc;
use std::time::{Duration, Instant};

use ogre_types::Oid;

use crate::identity::ObjectRef;

/// Boxed error returned by an [`ObjectLoader`].
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Materializes a stored instance by OID.
///
/// Implemented by the persistence layer; lazies hold one to reload their
/// referent after a clear.
pub trait ObjectLoader: Send + Sync {
    fn load_object(&self, oid: Oid) -> Result<ObjectRef, LoaderError>;
}

/// Hooks invoked when a lazy loads or drops its referent.
pub trait LazyObserver: Send + Sync {
    fn on_load(&self, _oid: Oid) {}
    fn on_clear(&self, _oid: Oid) {}
}

/// Type-erased view of a lazy used by [`LazyReferenceManager`](crate::LazyReferenceManager).
pub trait LazyClearable: Send + Sync {
    fn last_touched(&self) -> Instant;

    fn is_loaded(&self) -> bool;

    /// Clear the referent if it has not been touched within `timeout` of `now`.
    fn clear_if_idle(&self, now: Instant, timeout: Duration) -> bool;
}

/// Type-erased binding of a lazy to a stored OID.
///
/// Stores collect these and apply them only once their records are written.
pub trait LazyLink: Send + Sync {
    fn link_stored(&self, oid: Oid, loader: Arc<dyn ObjectLoader>);
}
