use std::sync::Arc;
use std::time::Duration;

use ogre_handler::{TypeDictionary, TypeHandler, TypeHandlerRegistry};
use ogre_registry::{LazyReferenceManager, ObjectRegistry};
use ogre_storage::{ChannelStorage, FileProvider, StorageConfig};
use tracing::info;

use crate::error::PersistenceResult;
use crate::manager::PersistenceManager;

#[derive(Clone, Copy, Debug)]
struct ClearingSchedule {
    interval: Duration,
    timeout: Duration,
}

/// Opens a store and binds handlers to its type dictionary.
///
/// ```no_run
/// # use ogre_persistence::PersistenceBuilder;
/// # use ogre_storage::StorageConfig;
/// let manager = PersistenceBuilder::new(StorageConfig::default())
///     .track_lazies()
///     .build()?;
/// # Ok::<(), ogre_persistence::PersistenceError>(())
/// ```
pub struct PersistenceBuilder {
    config: StorageConfig,
    provider: Option<Arc<dyn FileProvider>>,
    handlers: Vec<Arc<dyn TypeHandler>>,
    track_lazies: bool,
    clearing: Option<ClearingSchedule>,
}

impl PersistenceBuilder {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            provider: None,
            handlers: Vec::new(),
            track_lazies: false,
            clearing: None,
        }
    }

    /// Use `provider` instead of the one named by the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn register(self, handler: impl TypeHandler + 'static) -> Self {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Track loaded lazies in a [`LazyReferenceManager`].
    pub fn track_lazies(mut self) -> Self {
        self.track_lazies = true;
        self
    }

    /// Track lazies and clear those idle past `timeout` every `interval`.
    pub fn clear_idle_lazies(mut self, interval: Duration, timeout: Duration) -> Self {
        self.track_lazies = true;
        self.clearing = Some(ClearingSchedule { interval, timeout });
        self
    }

    pub fn build(self) -> PersistenceResult<Arc<PersistenceManager>> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => self.config.open_provider()?,
        };
        let threshold = self.config.oid_threshold;
        let storage = ChannelStorage::open(provider, self.config)?;

        let dictionary = match storage.load_type_dictionary()? {
            Some(text) => TypeDictionary::parse(&text)?,
            None => TypeDictionary::new(),
        };
        let mut handlers = TypeHandlerRegistry::new(dictionary)?;
        for handler in self.handlers {
            handlers.register_arc(handler)?;
        }
        if handlers.is_dictionary_dirty() {
            storage.store_type_dictionary(&handlers.dictionary().assemble())?;
            info!(types = handlers.dictionary().len(), "updated type dictionary");
        }

        let registry = ObjectRegistry::with_threshold(threshold);
        if let Some(highest) = storage.highest_oid() {
            registry.observe_oid(highest);
        }

        let lazies = self.track_lazies.then(|| Arc::new(LazyReferenceManager::new()));
        let clearing = match (&lazies, self.clearing) {
            (Some(lazies), Some(schedule)) => Some(lazies.start(schedule.interval, schedule.timeout)),
            _ => None,
        };
        let manager = PersistenceManager::new_cyclic(storage, handlers, registry, lazies);
        if let Some(task) = clearing {
            manager.set_clearing_task(task);
        }
        info!(
            handlers = manager.handlers().len(),
            next_oid = %manager.registry().peek_next_oid(),
            "opened persistence manager"
        );
        Ok(manager)
    }
}
