//! Visit state transitions and listener notification.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sojourn_protocol::Visit;
use tracing::{debug, warn};

use crate::storage::Storage;

/// Observer of visit changes.
///
/// Called on the scheduler worker once per distinct visit value. A panicking
/// listener is isolated and logged; delivery to the remaining listeners
/// continues.
pub trait VisitListener: Send + Sync {
    fn on_visit_changed(&self, visit: &Visit);
}

/// The tracker's visit state: the current visit value, the listener
/// registry, and the terminal shutdown flag.
///
/// The scheduler worker is the only writer of the visit value; arbitrary
/// threads read it through [`current`](Self::current).
pub(crate) struct VisitState {
    visit: Mutex<Visit>,
    listeners: Mutex<Vec<Arc<dyn VisitListener>>>,
    shutdown: AtomicBool,
}

impl VisitState {
    pub(crate) fn new(initial: Visit) -> Self {
        Self {
            visit: Mutex::new(initial),
            listeners: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub(crate) fn current(&self) -> Visit {
        self.visit.lock().clone()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Mark the tracker shut down. Returns whether it already was.
    pub(crate) fn mark_shut_down(&self) -> bool {
        self.shutdown.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn VisitListener>) {
        self.listeners.lock().push(listener);
    }

    pub(crate) fn remove_listener(&self, listener: &Arc<dyn VisitListener>) {
        self.listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Force the current visit's expiry into the past, in memory only.
    /// Nothing is persisted and no listener fires; the next drain treats the
    /// visit as expired and queues a renewal.
    pub(crate) fn expire_current(&self) {
        let mut visit = self.visit.lock();
        *visit = visit.expire();
    }

    /// Replace the current visit with the delegate's result, persist it, and
    /// notify listeners when the value changed structurally.
    pub(crate) fn advance(&self, next: Visit, storage: &dyn Storage) {
        let previous = {
            let mut visit = self.visit.lock();
            std::mem::replace(&mut *visit, next.clone())
        };
        debug!(token = %next.token(), expires_at = next.expires_at(), "saving updated visit");
        storage.save_visit(&next);
        if previous != next {
            self.notify(&next);
        }
    }

    fn notify(&self, visit: &Visit) {
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            let delivery = panic::catch_unwind(AssertUnwindSafe(|| {
                listener.on_visit_changed(visit);
            }));
            if delivery.is_err() {
                warn!("visit listener panicked; continuing delivery");
            }
        }
    }
}
