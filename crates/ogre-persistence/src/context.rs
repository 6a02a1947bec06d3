//! Handler contexts used by the manager's store and load passes.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use ogre_frame::ByteOrder;
use ogre_handler::{HandlerResult, LoadContext, StoreContext};
use ogre_registry::{
    LazyClearable, LazyLink, LazyReferenceManager, LoadSession, ObjectLoader, ObjectRef, ObjectRegistry,
};
use ogre_types::Oid;
use tracing::trace;

/// Collects the instances a store must write.
///
/// Every OID assigned through [`apply`](StoreContext::apply) is remembered so
/// a failed store can unbind it again. Lazy links are held back until
/// [`commit`](Self::commit).
pub(crate) struct Storer<'m> {
    registry: &'m ObjectRegistry,
    loader: Arc<dyn ObjectLoader>,
    pub(crate) pending: VecDeque<(Oid, ObjectRef)>,
    pub(crate) assigned: Vec<Oid>,
    links: Vec<(Arc<dyn LazyLink>, Oid)>,
}

impl<'m> Storer<'m> {
    pub(crate) fn new(registry: &'m ObjectRegistry, loader: Arc<dyn ObjectLoader>) -> Self {
        Self {
            registry,
            loader,
            pending: VecDeque::new(),
            assigned: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Link the stored lazies. Call only after the records are written.
    pub(crate) fn commit(&mut self) {
        for (lazy, oid) in self.links.drain(..) {
            lazy.link_stored(oid, Arc::clone(&self.loader));
        }
    }

    /// Queue an explicitly stored instance, whether or not it is new.
    pub(crate) fn enqueue(&mut self, instance: &ObjectRef) -> HandlerResult<Oid> {
        let (oid, fresh) = self.registry.ensure_oid(instance)?;
        if fresh {
            self.assigned.push(oid);
        }
        self.pending.push_back((oid, Arc::clone(instance)));
        Ok(oid)
    }

    /// Unbind every OID this store assigned and drop the pending links.
    pub(crate) fn roll_back(&mut self) {
        for oid in &self.assigned {
            self.registry.remove(*oid);
        }
        self.links.clear();
    }
}

impl StoreContext for Storer<'_> {
    fn apply(&mut self, referent: &ObjectRef) -> HandlerResult<Oid> {
        let (oid, fresh) = self.registry.ensure_oid(referent)?;
        if fresh {
            trace!(%oid, "queued referenced instance");
            self.assigned.push(oid);
            self.pending.push_back((oid, Arc::clone(referent)));
        }
        Ok(oid)
    }

    fn link_lazy(&mut self, lazy: Arc<dyn LazyLink>, oid: Oid) {
        self.links.push((lazy, oid));
    }
}

/// Load context over one [`LoadSession`].
pub(crate) struct Loading<'s, 'r> {
    pub(crate) session: &'s LoadSession<'r>,
    pub(crate) byte_order: ByteOrder,
    pub(crate) loader: &'s Arc<dyn ObjectLoader>,
    pub(crate) lazies: Option<&'s LazyReferenceManager>,
}

impl LoadContext for Loading<'_, '_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn lookup_object(&self, oid: Oid) -> HandlerResult<ObjectRef> {
        Ok(self.session.lookup_object(oid)?)
    }

    fn peek_object(&self, oid: Oid) -> Option<ObjectRef> {
        self.session.peek_object(oid)
    }

    fn loader(&self) -> Arc<dyn ObjectLoader> {
        Arc::clone(self.loader)
    }

    fn track_lazy(&self, lazy: Weak<dyn LazyClearable>) {
        if let Some(manager) = self.lazies {
            manager.track_erased(lazy);
        }
    }
}
