use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ogre_types::Oid;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::identity::{ObjectRef, ObjectRegistry};

/// Load state of one OID within a [`LoadSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadPhase {
    Unseen,
    Shelled,
    Updated,
    Complete,
}

impl LoadPhase {
    fn successor(self) -> Option<LoadPhase> {
        match self {
            Self::Unseen => Some(Self::Shelled),
            Self::Shelled => Some(Self::Updated),
            Self::Updated => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unseen => "unseen",
            Self::Shelled => "shelled",
            Self::Updated => "updated",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Scratch space for one graph load.
///
/// Shells created during a load are visible to lookups of the same session
/// but reach the shared registry only through [`commit`](Self::commit), after
/// every OID has passed through all phases. Dropping a session discards its
/// shells.
pub struct LoadSession<'r> {
    registry: &'r ObjectRegistry,
    shells: HashMap<Oid, ObjectRef>,
    phases: HashMap<Oid, LoadPhase>,
    order: Vec<Oid>,
}

impl<'r> LoadSession<'r> {
    pub fn new(registry: &'r ObjectRegistry) -> Self {
        Self {
            registry,
            shells: HashMap::new(),
            phases: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r ObjectRegistry {
        self.registry
    }

    pub fn phase(&self, oid: Oid) -> LoadPhase {
        self.phases.get(&oid).copied().unwrap_or(LoadPhase::Unseen)
    }

    /// `true` if `oid` is materialized here or already registered.
    pub fn is_resident(&self, oid: Oid) -> bool {
        self.shells.contains_key(&oid) || self.registry.contains(oid)
    }

    /// Record the shell for `oid`: `Unseen → Shelled`.
    pub fn add_shell(&mut self, oid: Oid, instance: ObjectRef) -> RegistryResult<()> {
        if oid.is_null() {
            return Err(RegistryError::NullOid);
        }
        self.advance(oid, LoadPhase::Shelled)?;
        self.shells.insert(oid, instance);
        self.order.push(oid);
        Ok(())
    }

    /// `Shelled → Updated`.
    pub fn mark_updated(&mut self, oid: Oid) -> RegistryResult<()> {
        self.advance(oid, LoadPhase::Updated)
    }

    /// `Updated → Complete`.
    pub fn mark_complete(&mut self, oid: Oid) -> RegistryResult<()> {
        self.advance(oid, LoadPhase::Complete)
    }

    fn advance(&mut self, oid: Oid, to: LoadPhase) -> RegistryResult<()> {
        let from = self.phase(oid);
        if from.successor() != Some(to) {
            return Err(RegistryError::PhaseViolation { oid, from, to });
        }
        self.phases.insert(oid, to);
        Ok(())
    }

    /// Resolve a reference: session shells first, then the registry.
    pub fn lookup_object(&self, oid: Oid) -> RegistryResult<ObjectRef> {
        self.peek_object(oid)
            .ok_or(RegistryError::PrematureLookup { oid })
    }

    pub fn peek_object(&self, oid: Oid) -> Option<ObjectRef> {
        match self.shells.get(&oid) {
            Some(instance) => Some(Arc::clone(instance)),
            None => self.registry.lookup_object(oid),
        }
    }

    /// Shelled OIDs in the order their shells were created.
    pub fn oids(&self) -> &[Oid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Publish every shell to the registry. Fails unless all are complete.
    pub fn commit(self) -> RegistryResult<usize> {
        for oid in &self.order {
            let phase = self.phase(*oid);
            if phase != LoadPhase::Complete {
                return Err(RegistryError::PhaseViolation {
                    oid: *oid,
                    from: phase,
                    to: LoadPhase::Complete,
                });
            }
        }
        let entries: Vec<(Oid, ObjectRef)> = self
            .order
            .iter()
            .map(|oid| (*oid, Arc::clone(&self.shells[oid])))
            .collect();
        let registered = self.registry.register_all(&entries)?;
        debug!(registered, "committed load session");
        Ok(registered)
    }
}

impl fmt::Debug for LoadSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadSession")
            .field("shells", &self.order.len())
            .finish()
    }
}
