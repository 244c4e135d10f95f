//! The storage boundary: persistence of the visit record and visitor token.

use parking_lot::Mutex;
use sojourn_protocol::Visit;

/// Persistence boundary consumed by the tracker.
///
/// Calls are issued from the scheduler worker and are expected to be cheap
/// key/value reads and writes. The interface carries no failure channel;
/// implementations absorb and log their own errors.
pub trait Storage: Send + Sync + 'static {
    /// Read the persisted visit, or `default` when none is stored.
    fn read_visit(&self, default: Visit) -> Visit;

    /// Persist the visit, replacing any stored one.
    fn save_visit(&self, visit: &Visit);

    /// Read the persisted visitor token, if any.
    fn read_visitor_token(&self) -> Option<String>;

    /// Persist the visitor token, replacing any stored one.
    fn save_visitor_token(&self, token: &str);

    /// Remove all stored state, including the visitor token.
    fn clear(&self);
}

/// In-memory [`Storage`] for tests and hosts without durable persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    visit: Option<Visit>,
    visitor_token: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read_visit(&self, default: Visit) -> Visit {
        self.inner.lock().visit.clone().unwrap_or(default)
    }

    fn save_visit(&self, visit: &Visit) {
        self.inner.lock().visit = Some(visit.clone());
    }

    fn read_visitor_token(&self) -> Option<String> {
        self.inner.lock().visitor_token.clone()
    }

    fn save_visitor_token(&self, token: &str) {
        self.inner.lock().visitor_token = Some(token.to_string());
    }

    fn clear(&self) {
        let mut state = self.inner.lock();
        state.visit = None;
        state.visitor_token = None;
    }
}
