use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ogre_types::Oid;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// A live, type-erased instance of the object graph.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Erase a typed instance. The allocation, and therefore the identity, is kept.
pub fn erase<T: Any + Send + Sync>(instance: Arc<T>) -> ObjectRef {
    instance
}

fn address_of(instance: &ObjectRef) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// Human-readable identity of an instance for error messages.
pub fn describe(instance: &ObjectRef) -> String {
    format!("instance@{:#x}", address_of(instance))
}

struct RegistryState {
    by_oid: HashMap<Oid, ObjectRef>,
    by_address: HashMap<usize, Oid>,
    next_oid: u64,
}

impl RegistryState {
    fn check(&self, oid: Oid, instance: &ObjectRef) -> RegistryResult<bool> {
        if oid.is_null() {
            return Err(RegistryError::NullOid);
        }
        let address = address_of(instance);
        if let Some(existing) = self.by_oid.get(&oid) {
            if address_of(existing) == address {
                return Ok(false);
            }
            return Err(RegistryError::IdentityConflict {
                oid,
                existing: describe(existing),
                incoming: describe(instance),
            });
        }
        if let Some(bound) = self.by_address.get(&address) {
            return Err(RegistryError::IdentityConflict {
                oid,
                existing: format!("{} bound to {bound}", describe(instance)),
                incoming: describe(instance),
            });
        }
        Ok(true)
    }

    fn insert(&mut self, oid: Oid, instance: &ObjectRef) {
        self.by_address.insert(address_of(instance), oid);
        self.by_oid.insert(oid, Arc::clone(instance));
        self.observe(oid);
    }

    fn observe(&mut self, oid: Oid) {
        if oid.value() >= self.next_oid {
            self.next_oid = oid.value().saturating_add(1);
        }
    }
}

/// Bidirectional OID ⇄ instance map plus the OID provider.
///
/// One registry per store. All mutations happen under a single write lock, so
/// [`ensure_oid`](Self::ensure_oid) and [`register_object`](Self::register_object)
/// are atomic with respect to each other. The registry holds strong
/// references; eviction is the caller's business via [`remove`](Self::remove).
pub struct ObjectRegistry {
    state: RwLock<RegistryState>,
    threshold: u64,
}

impl ObjectRegistry {
    /// A registry whose provider starts at [`Oid::DEFAULT_ENTITY_START`].
    pub fn new() -> Self {
        Self::with_threshold(Oid::DEFAULT_ENTITY_START)
    }

    /// A registry that never assigns OIDs below `threshold`.
    pub fn with_threshold(threshold: u64) -> Self {
        let threshold = threshold.max(Oid::ROOTS.value() + 1);
        Self {
            state: RwLock::new(RegistryState {
                by_oid: HashMap::new(),
                by_address: HashMap::new(),
                next_oid: threshold,
            }),
            threshold,
        }
    }

    /// First OID the provider may hand out.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Bind `oid` to `instance`. Re-binding the same pair is a no-op.
    pub fn register_object(&self, oid: Oid, instance: &ObjectRef) -> RegistryResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.check(oid, instance)? {
            state.insert(oid, instance);
            debug!(%oid, "registered instance");
        }
        Ok(())
    }

    /// Bind every pair or none of them.
    pub fn register_all(&self, entries: &[(Oid, ObjectRef)]) -> RegistryResult<usize> {
        let mut state = self.state.write().expect("lock poisoned");
        let mut fresh = Vec::with_capacity(entries.len());
        for (oid, instance) in entries {
            if state.check(*oid, instance)? {
                fresh.push((*oid, instance));
            }
        }
        for (oid, instance) in &fresh {
            state.insert(*oid, instance);
        }
        Ok(fresh.len())
    }

    /// The OID of `instance`, assigning the next free one if it has none.
    ///
    /// Returns `true` alongside the OID when it was assigned by this call.
    pub fn ensure_oid(&self, instance: &ObjectRef) -> RegistryResult<(Oid, bool)> {
        let address = address_of(instance);
        if let Some(oid) = self.state.read().expect("lock poisoned").by_address.get(&address) {
            return Ok((*oid, false));
        }
        let mut state = self.state.write().expect("lock poisoned");
        // Another writer may have won the race between the two locks.
        if let Some(oid) = state.by_address.get(&address) {
            return Ok((*oid, false));
        }
        if state.next_oid == u64::MAX {
            return Err(RegistryError::OidExhausted);
        }
        let oid = Oid::new(state.next_oid);
        state.insert(oid, instance);
        debug!(%oid, "assigned object id");
        Ok((oid, true))
    }

    pub fn lookup_object(&self, oid: Oid) -> Option<ObjectRef> {
        self.state.read().expect("lock poisoned").by_oid.get(&oid).cloned()
    }

    pub fn lookup_oid(&self, instance: &ObjectRef) -> Option<Oid> {
        self.state
            .read()
            .expect("lock poisoned")
            .by_address
            .get(&address_of(instance))
            .copied()
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.state.read().expect("lock poisoned").by_oid.contains_key(&oid)
    }

    /// Unbind `oid`. The provider is not rewound.
    pub fn remove(&self, oid: Oid) -> Option<ObjectRef> {
        let mut state = self.state.write().expect("lock poisoned");
        let instance = state.by_oid.remove(&oid)?;
        state.by_address.remove(&address_of(&instance));
        Some(instance)
    }

    /// Advance the provider past an OID found in storage.
    pub fn observe_oid(&self, oid: Oid) {
        self.state.write().expect("lock poisoned").observe(oid);
    }

    /// The OID the provider would assign next.
    pub fn peek_next_oid(&self) -> Oid {
        Oid::new(self.state.read().expect("lock poisoned").next_oid)
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").by_oid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("ObjectRegistry")
            .field("objects", &state.by_oid.len())
            .field("next_oid", &state.next_oid)
            .finish()
    }
}
