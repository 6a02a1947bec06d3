use std::any::{type_name, Any};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use ogre_frame::{FrameBuffer, OwnedEntity, PayloadReader, PayloadWriter};
use ogre_handler::{TypeHandler, TypeHandlerRegistry};
use ogre_registry::{
    LazyClearingTask, LazyReferenceManager, LoadSession, LoaderError, ObjectLoader, ObjectRef,
    ObjectRegistry,
};
use ogre_storage::{ChannelStorage, ConsolidationReport};
use ogre_types::{Oid, TypeId};
use tracing::{debug, info, warn};

use crate::context::{Loading, Storer};
use crate::error::{PersistenceError, PersistenceResult};

/// Stores and loads object graphs over one [`ChannelStorage`].
///
/// Built by [`PersistenceBuilder`](crate::PersistenceBuilder). The manager
/// owns the identity registry of its store: an instance keeps its OID for as
/// long as it stays registered, and loading an OID that is already
/// registered returns the registered instance.
pub struct PersistenceManager {
    storage: ChannelStorage,
    handlers: TypeHandlerRegistry,
    registry: ObjectRegistry,
    lazies: Option<Arc<LazyReferenceManager>>,
    clearing: Mutex<Option<LazyClearingTask>>,
    loader: Arc<dyn ObjectLoader>,
    store_lock: Mutex<()>,
    load_lock: Mutex<()>,
}

/// Loader handed to lazies. Holds the manager weakly so linked lazies never
/// keep it alive.
struct ManagerLoader(Weak<PersistenceManager>);

impl ObjectLoader for ManagerLoader {
    fn load_object(&self, oid: Oid) -> Result<ObjectRef, LoaderError> {
        let manager = self.0.upgrade().ok_or(PersistenceError::Closed)?;
        Ok(manager.load(oid)?)
    }
}

impl PersistenceManager {
    pub(crate) fn new_cyclic(
        storage: ChannelStorage,
        handlers: TypeHandlerRegistry,
        registry: ObjectRegistry,
        lazies: Option<Arc<LazyReferenceManager>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            storage,
            handlers,
            registry,
            lazies,
            clearing: Mutex::new(None),
            loader: Arc::new(ManagerLoader(this.clone())),
            store_lock: Mutex::new(()),
            load_lock: Mutex::new(()),
        })
    }

    pub(crate) fn set_clearing_task(&self, task: LazyClearingTask) {
        *self.clearing.lock().expect("lock poisoned") = Some(task);
    }

    pub fn storage(&self) -> &ChannelStorage {
        &self.storage
    }

    pub fn handlers(&self) -> &TypeHandlerRegistry {
        &self.handlers
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn lazy_manager(&self) -> Option<&Arc<LazyReferenceManager>> {
        self.lazies.as_ref()
    }

    /// The loader lazies of this store are linked to.
    pub fn loader(&self) -> Arc<dyn ObjectLoader> {
        Arc::clone(&self.loader)
    }

    /// OID of a registered instance.
    pub fn object_id(&self, instance: &ObjectRef) -> Option<Oid> {
        self.registry.lookup_oid(instance)
    }

    /// Store `instance` and every instance it reaches that has no OID yet.
    pub fn store(&self, instance: &ObjectRef) -> PersistenceResult<Oid> {
        let oids = self.store_all(std::slice::from_ref(instance))?;
        Ok(oids[0])
    }

    /// Store several instances in one batch.
    ///
    /// The passed instances are always written. Instances reached through
    /// references are written only if this call assigned their OID. Lazies
    /// are linked to their referent's OID only once the records are written.
    /// On failure every OID assigned here is unbound and no record of the
    /// batch becomes readable.
    pub fn store_all(&self, instances: &[ObjectRef]) -> PersistenceResult<Vec<Oid>> {
        let _guard = self.store_lock.lock().expect("lock poisoned");
        let mut storer = Storer::new(&self.registry, self.loader());
        match self.write_graph(&mut storer, instances) {
            Ok(oids) => {
                storer.commit();
                Ok(oids)
            }
            Err(e) => {
                warn!(assigned = storer.assigned.len(), error = %e, "store failed, rolling back");
                storer.roll_back();
                Err(e)
            }
        }
    }

    fn write_graph(&self, storer: &mut Storer<'_>, instances: &[ObjectRef]) -> PersistenceResult<Vec<Oid>> {
        let order = self.storage.codec().order();
        let mut roots = Vec::with_capacity(instances.len());
        for instance in instances {
            roots.push(storer.enqueue(instance)?);
        }

        let mut buffer = FrameBuffer::new(self.storage.codec());
        let mut written = HashSet::new();
        while let Some((oid, instance)) = storer.pending.pop_front() {
            if !written.insert(oid) {
                continue;
            }
            let registered = self.handlers.handler_for_instance(&instance)?;
            let mut payload = PayloadWriter::new(order);
            registered.handler.store(&mut payload, &instance, oid, storer)?;
            buffer.push_entity(registered.type_id, oid, payload.as_slice())?;
        }

        self.storage.write_records(&buffer)?;
        debug!(
            records = buffer.entity_count(),
            bytes = buffer.len(),
            "stored object graph"
        );
        Ok(roots)
    }

    /// The instance for `oid`, loading its eager closure if needed.
    ///
    /// Loading runs three passes over the whole closure: every shell is
    /// created, then every instance is updated, then every instance is
    /// completed. Instances become visible to the registry only after the
    /// last pass succeeded.
    pub fn load(&self, oid: Oid) -> PersistenceResult<ObjectRef> {
        if let Some(instance) = self.registry.lookup_object(oid) {
            return Ok(instance);
        }
        let _guard = self.load_lock.lock().expect("lock poisoned");
        if let Some(instance) = self.registry.lookup_object(oid) {
            return Ok(instance);
        }

        let order = self.storage.codec().order();
        let lazies = self.lazies.as_deref();
        let mut session = LoadSession::new(&self.registry);
        let mut records: Vec<(OwnedEntity, Arc<dyn TypeHandler>)> = Vec::new();
        let mut queue = VecDeque::from([oid]);
        let mut seen = HashSet::new();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) || session.is_resident(next) {
                continue;
            }
            let entity = self
                .storage
                .read_entity(next)?
                .ok_or(PersistenceError::ObjectNotFound(next))?;
            let handler = Arc::clone(&self.handlers.handler_for_type_id(entity.type_id(), next)?.handler);
            let frame = entity.as_frame();
            handler.iterate_persisted_references(&frame, order, &mut |r| queue.push_back(r))?;
            let shell = {
                let ctx = Loading {
                    session: &session,
                    byte_order: order,
                    loader: &self.loader,
                    lazies,
                };
                handler.create(&frame, &ctx)?
            };
            session.add_shell(next, shell)?;
            records.push((entity, handler));
        }

        for (entity, handler) in &records {
            let instance = session.lookup_object(entity.oid())?;
            {
                let ctx = Loading {
                    session: &session,
                    byte_order: order,
                    loader: &self.loader,
                    lazies,
                };
                handler.update(&entity.as_frame(), &instance, &ctx)?;
            }
            session.mark_updated(entity.oid())?;
        }

        for (entity, handler) in &records {
            let instance = session.lookup_object(entity.oid())?;
            {
                let ctx = Loading {
                    session: &session,
                    byte_order: order,
                    loader: &self.loader,
                    lazies,
                };
                handler.complete(&entity.as_frame(), &instance, &ctx)?;
            }
            session.mark_complete(entity.oid())?;
        }

        let instance = session.lookup_object(oid)?;
        let loaded = session.commit()?;
        debug!(%oid, loaded, "loaded object graph");
        Ok(instance)
    }

    /// [`load`](Self::load) and downcast.
    pub fn load_as<T: Any + Send + Sync>(&self, oid: Oid) -> PersistenceResult<Arc<T>> {
        self.load(oid)?
            .downcast::<T>()
            .map_err(|_| PersistenceError::TypeMismatch {
                oid,
                expected: type_name::<T>(),
            })
    }

    /// Store `instance` and record it as the root of the store.
    pub fn set_root(&self, instance: &ObjectRef) -> PersistenceResult<Oid> {
        let oid = self.store(instance)?;
        let order = self.storage.codec().order();
        let mut payload = PayloadWriter::new(order);
        payload.put_oid(oid);
        let mut buffer = FrameBuffer::new(self.storage.codec());
        buffer.push_entity(TypeId::ROOTS, Oid::ROOTS, payload.as_slice())?;
        self.storage.write_records(&buffer)?;
        info!(root = %oid, "updated store root");
        Ok(oid)
    }

    /// OID of the store root, if one was set.
    pub fn root_id(&self) -> PersistenceResult<Option<Oid>> {
        let Some(record) = self.storage.read_entity(Oid::ROOTS)? else {
            return Ok(None);
        };
        if record.type_id() != TypeId::ROOTS {
            return Err(PersistenceError::MalformedRoots(format!(
                "unexpected type id {}",
                record.type_id()
            )));
        }
        let mut reader = PayloadReader::new(self.storage.codec().order(), record.payload());
        let oid = reader.get_oid()?;
        if oid.is_null() || !reader.is_exhausted() {
            return Err(PersistenceError::MalformedRoots(format!(
                "expected one root id, found {} payload bytes",
                record.payload().len()
            )));
        }
        Ok(Some(oid))
    }

    /// The store root, loaded.
    pub fn root(&self) -> PersistenceResult<Option<ObjectRef>> {
        match self.root_id()? {
            Some(oid) => self.load(oid).map(Some),
            None => Ok(None),
        }
    }

    /// Rewrite every channel's live records into fresh files, reclaiming
    /// superseded records and gaps. Stores wait until it finishes.
    pub fn consolidate(&self) -> PersistenceResult<Vec<ConsolidationReport>> {
        let _guard = self.store_lock.lock().expect("lock poisoned");
        let reports = self.storage.consolidate_all()?;
        info!(
            reclaimed = reports.iter().map(|r| r.reclaimed_bytes).sum::<u64>(),
            "consolidated store"
        );
        Ok(reports)
    }

    /// Make every stored record durable.
    pub fn sync(&self) -> PersistenceResult<()> {
        Ok(self.storage.sync()?)
    }

    /// Stop idle clearing and sync.
    pub fn close(&self) -> PersistenceResult<()> {
        if let Some(task) = self.clearing.lock().expect("lock poisoned").take() {
            task.stop();
        }
        self.sync()?;
        info!(registered = self.registry.len(), "closed persistence manager");
        Ok(())
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("storage", &self.storage)
            .field("handlers", &self.handlers)
            .field("registered", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PersistenceBuilder;
    use ogre_handler::{EntityHandler, EntityHandlerBuilder, HandlerError, ObjectList};
    use ogre_registry::{erase, Lazy, LazyError};
    use ogre_storage::{FileProvider, InMemoryFileProvider, StorageConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;
    use std::time::Duration;

    #[derive(Default)]
    struct Node {
        label: String,
        weight: i64,
        next: RwLock<Option<Arc<Node>>>,
        completed: AtomicBool,
    }

    impl Node {
        fn new(label: &str, weight: i64) -> Arc<Self> {
            Arc::new(Self {
                label: label.into(),
                weight,
                ..Self::default()
            })
        }

        fn next(&self) -> Option<Arc<Node>> {
            self.next.read().unwrap().clone()
        }

        fn link(&self, next: &Arc<Node>) {
            *self.next.write().unwrap() = Some(Arc::clone(next));
        }
    }

    fn node_handler() -> EntityHandler<Node> {
        EntityHandlerBuilder::new("test.Node", Node::default)
            .field("label", |n: &Node| n.label.clone(), |n, v| n.label = v)
            .field("weight", |n: &Node| n.weight, |n, v| n.weight = v)
            .reference("next", |n: &Node| n.next(), |n, v| *n.next.write().unwrap() = v)
            .on_complete(|n| n.completed.store(true, Ordering::SeqCst))
            .build()
    }

    #[derive(Default)]
    struct Account {
        owner: String,
        history: Arc<Lazy<Vec<i64>>>,
    }

    fn account_handler() -> EntityHandler<Account> {
        EntityHandlerBuilder::new("test.Account", Account::default)
            .field("owner", |a: &Account| a.owner.clone(), |a, v| a.owner = v)
            .lazy("history", |a: &Account| &a.history)
            .build()
    }

    struct Stranger;

    #[derive(Default)]
    struct Holder {
        node: RwLock<Option<Arc<Node>>>,
        stranger: RwLock<Option<Arc<Stranger>>>,
    }

    fn holder_handler() -> EntityHandler<Holder> {
        EntityHandlerBuilder::new("test.Holder", Holder::default)
            .reference(
                "node",
                |h: &Holder| h.node.read().unwrap().clone(),
                |h, v| *h.node.write().unwrap() = v,
            )
            .reference(
                "stranger",
                |h: &Holder| h.stranger.read().unwrap().clone(),
                |h, v| *h.stranger.write().unwrap() = v,
            )
            .build()
    }

    fn open(provider: &InMemoryFileProvider) -> Arc<PersistenceManager> {
        PersistenceBuilder::new(StorageConfig::default())
            .with_provider(Arc::new(provider.clone()))
            .register(node_handler())
            .register(account_handler())
            .register(holder_handler())
            .track_lazies()
            .build()
            .unwrap()
    }

    #[test]
    fn graph_round_trips_through_a_new_manager() {
        let provider = InMemoryFileProvider::new();
        let head = Node::new("head", 1);
        let tail = Node::new("tail", 2);
        head.link(&tail);
        let oid = open(&provider).store(&erase(head)).unwrap();

        let manager = open(&provider);
        let head = manager.load_as::<Node>(oid).unwrap();
        assert_eq!(head.label, "head");
        let tail = head.next().unwrap();
        assert_eq!((tail.label.as_str(), tail.weight), ("tail", 2));
        assert!(tail.next().is_none());
        assert!(head.completed.load(Ordering::SeqCst));
        assert!(tail.completed.load(Ordering::SeqCst));
        assert_eq!(manager.registry().len(), 2);
    }

    #[test]
    fn cycles_load_to_the_same_instances() {
        let provider = InMemoryFileProvider::new();
        let a = Node::new("a", 1);
        let b = Node::new("b", 2);
        a.link(&b);
        b.link(&a);
        let oid = open(&provider).store(&erase(Arc::clone(&a))).unwrap();
        // Break the cycle so the test does not leak.
        *a.next.write().unwrap() = None;

        let manager = open(&provider);
        let a = manager.load_as::<Node>(oid).unwrap();
        let b = a.next().unwrap();
        assert!(Arc::ptr_eq(&b.next().unwrap(), &a));
        assert!(Arc::ptr_eq(&manager.load_as::<Node>(oid).unwrap(), &a));
        *a.next.write().unwrap() = None;
    }

    #[test]
    fn identity_is_stable_across_stores() {
        let provider = InMemoryFileProvider::new();
        let manager = open(&provider);
        let node: ObjectRef = erase(Node::new("n", 0));
        let first = manager.store(&node).unwrap();
        let second = manager.store(&node).unwrap();
        assert_eq!(first, second);
        assert!(first.value() >= Oid::DEFAULT_ENTITY_START);
        assert_eq!(manager.object_id(&node), Some(first));
        assert!(Arc::ptr_eq(&manager.load(first).unwrap(), &node));
        assert_eq!(manager.storage().stats().unwrap().iter().map(|s| s.superseded).sum::<u64>(), 1);
    }

    #[test]
    fn consolidation_keeps_the_latest_graph() {
        let provider = InMemoryFileProvider::new();
        let oid = {
            let manager = open(&provider);
            let head = Node::new("head", 1);
            head.link(&Node::new("tail", 2));
            let head: ObjectRef = erase(head);
            manager.store(&head).unwrap();
            manager.sync().unwrap();
            let oid = manager.store(&head).unwrap();
            let reports = manager.consolidate().unwrap();
            assert!(reports.iter().map(|r| r.reclaimed_bytes).sum::<u64>() > 0);
            let stats = manager.storage().stats().unwrap();
            assert_eq!(stats.iter().map(|s| s.superseded).sum::<u64>(), 0);
            manager.close().unwrap();
            oid
        };
        let manager = open(&provider);
        let head = manager.load_as::<Node>(oid).unwrap();
        assert_eq!(head.next().unwrap().label, "tail");
    }

    #[test]
    fn referenced_instances_are_written_once() {
        let provider = InMemoryFileProvider::new();
        let manager = open(&provider);
        let shared = Node::new("shared", 0);
        let a = Node::new("a", 1);
        let b = Node::new("b", 2);
        a.link(&shared);
        b.link(&shared);
        manager.store(&erase(a)).unwrap();
        manager.store(&erase(b)).unwrap();
        assert_eq!(manager.storage().len(), 3);
        let superseded: u64 = manager.storage().stats().unwrap().iter().map(|s| s.superseded).sum();
        assert_eq!(superseded, 0);
    }

    #[test]
    fn failed_store_rolls_back_assigned_oids() {
        let provider = InMemoryFileProvider::new();
        let manager = open(&provider);
        let holder = Holder::default();
        *holder.node.write().unwrap() = Some(Node::new("n", 0));
        *holder.stranger.write().unwrap() = Some(Arc::new(Stranger));
        let holder: ObjectRef = erase(Arc::new(holder));

        let err = manager.store(&holder).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Handler(HandlerError::NoHandlerForType { .. })
        ));
        assert!(manager.registry().is_empty());
        assert!(manager.storage().is_empty());
    }

    #[derive(Default)]
    struct Doc {
        body: Arc<Lazy<Vec<i64>>>,
        stranger: RwLock<Option<Arc<Stranger>>>,
    }

    fn doc_handler() -> EntityHandler<Doc> {
        EntityHandlerBuilder::new("test.Doc", Doc::default)
            .lazy("body", |d: &Doc| &d.body)
            .reference(
                "stranger",
                |d: &Doc| d.stranger.read().unwrap().clone(),
                |d, v| *d.stranger.write().unwrap() = v,
            )
            .build()
    }

    #[test]
    fn failed_store_leaves_lazies_unlinked() {
        let manager = PersistenceBuilder::new(StorageConfig::default())
            .register(doc_handler())
            .build()
            .unwrap();
        let doc = Doc::default();
        doc.body.set(Some(Arc::new(vec![1, 2, 3])));
        *doc.stranger.write().unwrap() = Some(Arc::new(Stranger));
        let doc = Arc::new(doc);

        assert!(manager.store(&erase(Arc::clone(&doc))).is_err());
        assert!(!doc.body.is_stored());
        assert!(manager.storage().is_empty());
        assert!(!doc.body.clear());
        assert_eq!(*doc.body.get().unwrap().unwrap(), vec![1, 2, 3]);

        *doc.stranger.write().unwrap() = None;
        manager.store(&erase(Arc::clone(&doc))).unwrap();
        assert!(doc.body.is_stored());
        assert!(doc.body.clear());
        assert_eq!(*doc.body.get().unwrap().unwrap(), vec![1, 2, 3]);
    }

    #[derive(Default)]
    struct Ledger {
        current: RwLock<Option<Arc<Node>>>,
        archive: Arc<Lazy<Node>>,
    }

    fn ledger_handler() -> EntityHandler<Ledger> {
        EntityHandlerBuilder::new("test.Ledger", Ledger::default)
            .reference(
                "current",
                |l: &Ledger| l.current.read().unwrap().clone(),
                |l, v| *l.current.write().unwrap() = v,
            )
            .lazy("archive", |l: &Ledger| &l.archive)
            .build()
    }

    #[test]
    fn lazy_adopts_an_instance_loaded_with_the_graph() {
        let provider = InMemoryFileProvider::new();
        let build = || {
            PersistenceBuilder::new(StorageConfig::default())
                .with_provider(Arc::new(provider.clone()))
                .register(node_handler())
                .register(ledger_handler())
                .build()
                .unwrap()
        };
        let oid = {
            let shared = Node::new("shared", 3);
            let ledger = Ledger::default();
            *ledger.current.write().unwrap() = Some(Arc::clone(&shared));
            ledger.archive.set(Some(shared));
            build().store(&erase(Arc::new(ledger))).unwrap()
        };

        let manager = build();
        let ledger = manager.load_as::<Ledger>(oid).unwrap();
        let current = ledger.current.read().unwrap().clone().unwrap();
        assert!(ledger.archive.is_loaded());
        assert!(Arc::ptr_eq(&ledger.archive.peek().unwrap(), &current));
        assert_eq!(manager.registry().len(), 2);
    }

    #[test]
    fn lazy_fields_load_on_demand() {
        let provider = InMemoryFileProvider::new();
        let account = Account {
            owner: "ada".into(),
            ..Account::default()
        };
        account.history.set(Some(Arc::new(vec![10, 20, 30])));
        let oid = open(&provider).store(&erase(Arc::new(account))).unwrap();

        let manager = open(&provider);
        let account = manager.load_as::<Account>(oid).unwrap();
        assert_eq!(account.owner, "ada");
        assert!(account.history.is_stored());
        assert!(!account.history.is_loaded());
        assert_eq!(manager.registry().len(), 1);

        let lazies = manager.lazy_manager().unwrap();
        assert_eq!(lazies.tracked_count(), 1);
        assert_eq!(*account.history.get().unwrap().unwrap(), vec![10, 20, 30]);
        assert_eq!(lazies.loaded_count(), 1);

        assert_eq!(lazies.clear_timed_out(Duration::ZERO), 1);
        assert!(!account.history.is_loaded());
        assert_eq!(*account.history.get().unwrap().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn lazy_outliving_its_manager_fails_to_load() {
        let provider = InMemoryFileProvider::new();
        let account = Account::default();
        account.history.set(Some(Arc::new(vec![1])));
        let oid = open(&provider).store(&erase(Arc::new(account))).unwrap();

        let manager = open(&provider);
        let account = manager.load_as::<Account>(oid).unwrap();
        drop(manager);
        assert!(matches!(account.history.get(), Err(LazyError::Load { .. })));
    }

    #[test]
    fn root_survives_reopen() {
        let provider = InMemoryFileProvider::new();
        {
            let manager = open(&provider);
            assert!(manager.root().unwrap().is_none());
            let list = ObjectList::new();
            list.push(erase(Node::new("x", 1)));
            list.push(erase(Arc::new("label".to_string())));
            manager.set_root(&erase(Arc::new(list))).unwrap();
            manager.close().unwrap();
        }
        let manager = open(&provider);
        let root = manager.root().unwrap().unwrap();
        let list = root.downcast_ref::<ObjectList>().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().downcast_ref::<Node>().unwrap().label, "x");
        assert_eq!(list.get(1).unwrap().downcast_ref::<String>().unwrap(), "label");
    }

    #[test]
    fn reopened_store_continues_oids() {
        let provider = InMemoryFileProvider::new();
        let stored = open(&provider).store(&erase(Node::new("a", 0))).unwrap();
        let manager = open(&provider);
        let fresh = manager.store(&erase(Node::new("b", 0))).unwrap();
        assert!(fresh > stored);
    }

    #[test]
    fn missing_and_mistyped_objects() {
        let provider = InMemoryFileProvider::new();
        let manager = open(&provider);
        assert!(matches!(
            manager.load(Oid::new(Oid::DEFAULT_ENTITY_START + 99)),
            Err(PersistenceError::ObjectNotFound(_))
        ));
        let oid = manager.store(&erase(Node::new("n", 0))).unwrap();
        assert!(matches!(
            manager.load_as::<Account>(oid),
            Err(PersistenceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn dictionary_is_persisted_and_checked() {
        let provider = InMemoryFileProvider::new();
        open(&provider);
        let text = provider.load_type_dictionary().unwrap().unwrap();
        assert!(text.contains("test.Node"));

        let changed = EntityHandlerBuilder::new("test.Node", Node::default)
            .field("label", |n: &Node| n.label.clone(), |n, v| n.label = v)
            .build();
        let result = PersistenceBuilder::new(StorageConfig::default())
            .with_provider(Arc::new(provider))
            .register(changed)
            .build();
        assert!(matches!(
            result,
            Err(PersistenceError::Handler(HandlerError::DescriptorMismatch { .. }))
        ));
    }

    #[test]
    fn directory_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            directory: Some(dir.path().to_path_buf()),
            ..StorageConfig::default()
        };
        let build = || {
            PersistenceBuilder::new(config.clone())
                .register(node_handler())
                .build()
                .unwrap()
        };
        let oid = {
            let manager = build();
            let head = Node::new("head", 7);
            head.link(&Node::new("tail", 8));
            let oid = manager.store(&erase(head)).unwrap();
            manager.close().unwrap();
            oid
        };
        let manager = build();
        let head = manager.load_as::<Node>(oid).unwrap();
        assert_eq!(head.next().unwrap().weight, 8);
    }

    #[test]
    fn background_clearing_stops_on_close() {
        let manager = PersistenceBuilder::new(StorageConfig::default())
            .register(account_handler())
            .clear_idle_lazies(Duration::from_millis(5), Duration::from_secs(3600))
            .build()
            .unwrap();
        assert!(manager.lazy_manager().is_some());
        manager.close().unwrap();
    }
}
