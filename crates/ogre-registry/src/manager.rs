use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::lazy::Lazy;
use crate::traits::LazyClearable;

/// Weakly tracks lazies and clears the ones left idle.
///
/// Tracking never keeps a lazy alive; entries whose owner is gone are pruned
/// on every sweep.
#[derive(Default)]
pub struct LazyReferenceManager {
    tracked: Mutex<Vec<Weak<dyn LazyClearable>>>,
}

impl LazyReferenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<T: std::any::Any + Send + Sync>(&self, lazy: &Arc<Lazy<T>>) {
        let weak: Weak<Lazy<T>> = Arc::downgrade(lazy);
        self.track_erased(weak);
    }

    pub fn track_erased(&self, lazy: Weak<dyn LazyClearable>) {
        self.tracked.lock().expect("lock poisoned").push(lazy);
    }

    /// Number of tracked lazies that are still alive.
    pub fn tracked_count(&self) -> usize {
        self.tracked
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Number of tracked lazies currently holding their referent.
    pub fn loaded_count(&self) -> usize {
        self.tracked
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|lazy| lazy.is_loaded())
            .count()
    }

    /// Clear every lazy not touched within `timeout`. Returns how many were cleared.
    pub fn clear_timed_out(&self, timeout: Duration) -> usize {
        let now = Instant::now();
        let live: Vec<Arc<dyn LazyClearable>> = {
            let mut tracked = self.tracked.lock().expect("lock poisoned");
            tracked.retain(|w| w.strong_count() > 0);
            tracked.iter().filter_map(Weak::upgrade).collect()
        };
        let cleared = live
            .iter()
            .filter(|lazy| lazy.clear_if_idle(now, timeout))
            .count();
        if cleared > 0 {
            debug!(cleared, tracked = live.len(), "cleared idle lazy references");
        }
        cleared
    }

    /// Sweep every `interval` on a background thread until the task is dropped.
    pub fn start(self: &Arc<Self>, interval: Duration, timeout: Duration) -> LazyClearingTask {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let manager = Arc::clone(self);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    manager.clear_timed_out(timeout);
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        info!(?interval, ?timeout, "lazy clearing task started");
        LazyClearingTask {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl std::fmt::Debug for LazyReferenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyReferenceManager")
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

/// Handle of the background sweep. Stops and joins the thread on drop.
pub struct LazyClearingTask {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LazyClearingTask {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("lazy clearing task stopped");
        }
    }
}

impl Drop for LazyClearingTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
