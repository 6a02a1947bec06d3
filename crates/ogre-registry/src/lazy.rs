use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use ogre_types::Oid;
use tracing::{debug, trace};

use crate::error::{LazyError, LazyResult};
use crate::identity::ObjectRef;
use crate::traits::{LazyClearable, LazyLink, LazyObserver, ObjectLoader};

enum LazyState<T> {
    /// Null reference.
    Empty,
    /// Stored, never materialized in this process.
    Unloaded(Oid),
    /// Referent present. `oid` is `None` until the lazy is first stored.
    Loaded { oid: Option<Oid>, value: Arc<T> },
    /// Referent dropped; reloadable by OID.
    Cleared(Oid),
}

struct Inner<T> {
    state: LazyState<T>,
    loader: Option<Arc<dyn ObjectLoader>>,
    observer: Option<Arc<dyn LazyObserver>>,
    loading: bool,
    generation: u64,
    last_touched: Instant,
}

/// A reference whose referent is materialized on first access.
///
/// Entity types hold lazies as `Arc<Lazy<U>>` fields. Only one load runs per
/// handle at a time; concurrent callers of [`get`](Self::get) wait for it.
/// [`clear`](Self::clear) may run during a load, in which case the loaded
/// value is handed to the waiting caller but not kept.
pub struct Lazy<T> {
    inner: Mutex<Inner<T>>,
    loaded: Condvar,
}

impl<T: Any + Send + Sync> Lazy<T> {
    fn with_state(state: LazyState<T>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                loader: None,
                observer: None,
                loading: false,
                generation: 0,
                last_touched: Instant::now(),
            }),
            loaded: Condvar::new(),
        }
    }

    /// A null lazy.
    pub fn empty() -> Self {
        Self::with_state(LazyState::Empty)
    }

    /// A lazy holding a referent that has not been stored yet.
    pub fn new(value: Arc<T>) -> Self {
        Self::with_state(LazyState::Loaded { oid: None, value })
    }

    /// A lazy pointing at a stored referent that is not in memory.
    pub fn unloaded(oid: Oid, loader: Arc<dyn ObjectLoader>) -> Self {
        let lazy = Self::with_state(LazyState::Unloaded(oid));
        lazy.lock().loader = Some(loader);
        lazy
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().expect("lock poisoned")
    }

    /// Install the load/clear observer.
    pub fn set_observer(&self, observer: Arc<dyn LazyObserver>) {
        self.lock().observer = Some(observer);
    }

    /// Dereference, loading the referent if needed. `None` for a null lazy.
    pub fn get(&self) -> LazyResult<Option<Arc<T>>> {
        let mut inner = self.lock();
        loop {
            inner.last_touched = Instant::now();
            let oid = match &inner.state {
                LazyState::Empty => return Ok(None),
                LazyState::Loaded { value, .. } => return Ok(Some(Arc::clone(value))),
                LazyState::Unloaded(oid) | LazyState::Cleared(oid) => *oid,
            };
            if inner.loading {
                inner = self.loaded.wait(inner).expect("lock poisoned");
                continue;
            }
            let loader = inner.loader.clone().ok_or(LazyError::NoLoader(oid))?;
            inner.loading = true;
            let generation = inner.generation;
            drop(inner);

            trace!(%oid, "loading lazy referent");
            let result = loader.load_object(oid);

            inner = self.lock();
            inner.loading = false;
            self.loaded.notify_all();

            let value = downcast::<T>(oid, result.map_err(|source| LazyError::Load { oid, source })?)?;
            if inner.generation != generation {
                debug!(%oid, "lazy cleared during load, result not kept");
                return Ok(Some(value));
            }
            inner.state = LazyState::Loaded {
                oid: Some(oid),
                value: Arc::clone(&value),
            };
            let observer = inner.observer.clone();
            drop(inner);
            if let Some(observer) = observer {
                observer.on_load(oid);
            }
            return Ok(Some(value));
        }
    }

    /// The referent if it is in memory. Never loads and does not touch.
    pub fn peek(&self) -> Option<Arc<T>> {
        match &self.lock().state {
            LazyState::Loaded { value, .. } => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Drop the referent, keeping the OID for a later reload.
    ///
    /// Returns `true` if a referent was released. Repeating it is harmless.
    /// A lazy that was never stored keeps its referent and returns `false`.
    /// An in-flight load is invalidated.
    pub fn clear(&self) -> bool {
        let inner = self.lock();
        Self::clear_locked(inner)
    }

    /// Observers run after the guard is released.
    fn clear_locked(mut inner: MutexGuard<'_, Inner<T>>) -> bool {
        if inner.loading {
            inner.generation += 1;
        }
        let released = match inner.state {
            LazyState::Loaded { oid: Some(oid), .. } => Some(oid),
            LazyState::Unloaded(oid) => {
                inner.state = LazyState::Cleared(oid);
                None
            }
            _ => None,
        };
        let Some(oid) = released else {
            return false;
        };
        inner.state = LazyState::Cleared(oid);
        inner.generation += 1;
        let observer = inner.observer.clone();
        drop(inner);
        if let Some(observer) = observer {
            observer.on_clear(oid);
        }
        trace!(%oid, "cleared lazy referent");
        true
    }

    /// Replace the referent. The lazy is unstored until the next store.
    pub fn set(&self, value: Option<Arc<T>>) {
        let mut inner = self.lock();
        if inner.loading {
            inner.generation += 1;
        }
        inner.state = match value {
            Some(value) => LazyState::Loaded { oid: None, value },
            None => LazyState::Empty,
        };
        inner.last_touched = Instant::now();
    }

    /// Bind the lazy to a stored OID.
    ///
    /// A held referent is kept when it belongs to `oid` (or was unstored);
    /// otherwise the lazy becomes unloaded.
    pub fn link(&self, oid: Oid, loader: Arc<dyn ObjectLoader>) {
        let mut inner = self.lock();
        inner.loader = Some(loader);
        let state = std::mem::replace(&mut inner.state, LazyState::Empty);
        inner.state = match state {
            LazyState::Loaded { oid: None, value } => LazyState::Loaded {
                oid: Some(oid),
                value,
            },
            LazyState::Loaded { oid: Some(held), value } if held == oid => LazyState::Loaded {
                oid: Some(oid),
                value,
            },
            _ => {
                if inner.loading {
                    inner.generation += 1;
                }
                LazyState::Unloaded(oid)
            }
        };
    }

    /// Bind to `oid` using an instance that is already materialized.
    pub fn adopt(&self, oid: Oid, value: ObjectRef, loader: Arc<dyn ObjectLoader>) -> LazyResult<()> {
        let value = downcast::<T>(oid, value)?;
        let mut inner = self.lock();
        if inner.loading {
            inner.generation += 1;
        }
        inner.loader = Some(loader);
        inner.state = LazyState::Loaded {
            oid: Some(oid),
            value,
        };
        inner.last_touched = Instant::now();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.lock().state, LazyState::Loaded { .. })
    }

    /// `true` once the lazy has an OID.
    pub fn is_stored(&self) -> bool {
        self.object_id().is_some()
    }

    /// `true` for a null lazy.
    pub fn is_empty(&self) -> bool {
        matches!(self.lock().state, LazyState::Empty)
    }

    pub fn object_id(&self) -> Option<Oid> {
        match self.lock().state {
            LazyState::Empty | LazyState::Loaded { oid: None, .. } => None,
            LazyState::Unloaded(oid) | LazyState::Cleared(oid) => Some(oid),
            LazyState::Loaded { oid: Some(oid), .. } => Some(oid),
        }
    }

    pub fn last_touched(&self) -> Instant {
        self.lock().last_touched
    }
}

fn downcast<T: Any + Send + Sync>(oid: Oid, value: ObjectRef) -> LazyResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| LazyError::TypeMismatch {
        oid,
        expected: type_name::<T>(),
    })
}

impl<T: Any + Send + Sync> LazyClearable for Lazy<T> {
    fn last_touched(&self) -> Instant {
        Lazy::last_touched(self)
    }

    fn is_loaded(&self) -> bool {
        Lazy::is_loaded(self)
    }

    fn clear_if_idle(&self, now: Instant, timeout: Duration) -> bool {
        let inner = self.lock();
        if inner.loading || now.saturating_duration_since(inner.last_touched) < timeout {
            return false;
        }
        Self::clear_locked(inner)
    }
}

impl<T: Any + Send + Sync> LazyLink for Lazy<T> {
    fn link_stored(&self, oid: Oid, loader: Arc<dyn ObjectLoader>) {
        self.link(oid, loader);
    }
}

impl<T: Any + Send + Sync> Default for Lazy<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().expect("lock poisoned");
        match &inner.state {
            LazyState::Empty => f.write_str("Lazy(empty)"),
            LazyState::Unloaded(oid) => write!(f, "Lazy(unloaded {oid})"),
            LazyState::Loaded { oid: Some(oid), .. } => write!(f, "Lazy(loaded {oid})"),
            LazyState::Loaded { oid: None, .. } => f.write_str("Lazy(loaded, unstored)"),
            LazyState::Cleared(oid) => write!(f, "Lazy(cleared {oid})"),
        }
    }
}
