//! Visit-session tracking with a single-flight update scheduler.
//!
//! `sojourn` keeps one "visit" session alive against a remote endpoint:
//! it starts and renews visits, attaches tracked events and extra
//! attributes to the current visit, and persists the resulting session
//! token and expiry. Network calls and persistence are delegated to host
//! supplied [`VisitDelegate`] and [`Storage`] implementations; the crate
//! itself owns the scheduling core:
//!
//! * every mutating operation joins one ordered queue,
//! * at most one delegate call is in flight at any instant,
//! * an expired visit is renewed automatically, ahead of queued work,
//! * failed calls are retried with a fixed delay, without losing,
//!   duplicating, or reordering anything.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sojourn::{Event, MemoryStorage, Tracker, TrackerConfig};
//!
//! # async fn run(delegate: Arc<dyn sojourn::VisitDelegate>) -> sojourn::Result<()> {
//! let tracker = Tracker::init(
//!     Arc::new(MemoryStorage::new()),
//!     delegate,
//!     TrackerConfig::default(),
//! );
//!
//! tracker.track_event(Event::new("signup").with_property("plan", "pro"))?;
//! tracker.ensure_fresh_visit()?;
//! # Ok(())
//! # }
//! ```

pub mod delegate;
pub mod error;
pub mod fake;
pub mod lifecycle;
mod queue;
mod scheduler;
mod state;
pub mod storage;
mod tracker;

pub use delegate::{DelegateError, VisitDelegate};
pub use error::{Error, Result};
pub use lifecycle::LifecycleMonitor;
pub use scheduler::DEFAULT_RETRY_DELAY;
pub use state::VisitListener;
pub use storage::{MemoryStorage, Storage};
pub use tracker::{Tracker, TrackerConfig};

pub use sojourn_protocol as protocol;
pub use sojourn_protocol::{Event, Extras, Visit, VisitParams, now_ms, utm};
