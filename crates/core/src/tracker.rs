//! The public tracking facade.

use std::sync::Arc;
use std::time::Duration;

use sojourn_protocol::{Event, Extras, Visit};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::delegate::VisitDelegate;
use crate::error::{Error, Result};
use crate::scheduler::{Command, DEFAULT_RETRY_DELAY, Scheduler};
use crate::state::{VisitListener, VisitState};
use crate::storage::Storage;

/// Tracker construction options.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Whether host "became active" signals trigger freshness checks.
    pub auto_start: bool,
    /// Delay before a failed delegate request is retried.
    pub retry_delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Tracks the client's visit session against a remote endpoint.
///
/// Mutating calls are fire-and-forget: they enqueue work for the scheduler
/// worker and return immediately. Failed delegate calls are retried
/// internally until they succeed or the tracker is shut down; the only
/// error surfaced here is use after [`shutdown_and_clear`](Self::shutdown_and_clear).
///
/// Cloning is cheap; clones share the same session state and worker. The
/// worker stops when the last clone is dropped.
#[derive(Clone)]
pub struct Tracker {
    state: Arc<VisitState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    visitor_token: String,
    auto_start: bool,
}

impl Tracker {
    /// Restore state from `storage`, minting and persisting a visitor token
    /// through the delegate when none is stored, and spawn the scheduler
    /// worker.
    ///
    /// Must be called within a Tokio runtime. Nothing is scheduled until a
    /// mutating call or lifecycle signal arrives.
    pub fn init(
        storage: Arc<dyn Storage>,
        delegate: Arc<dyn VisitDelegate>,
        config: TrackerConfig,
    ) -> Tracker {
        let visit = storage.read_visit(Visit::empty());
        let visitor_token = match storage.read_visitor_token() {
            Some(token) if !token.is_empty() => token,
            _ => {
                let token = delegate.new_visitor_token();
                storage.save_visitor_token(&token);
                debug!(token = %token, "minted visitor token");
                token
            }
        };

        let state = Arc::new(VisitState::new(visit));
        let cmd_tx = Scheduler::spawn(
            delegate,
            storage,
            Arc::clone(&state),
            visitor_token.clone(),
            config.retry_delay,
        );

        Tracker {
            state,
            cmd_tx,
            visitor_token,
            auto_start: config.auto_start,
        }
    }

    /// Start a new visit, carrying `extras` to the delegate. The current
    /// visit is treated as expired from here on.
    pub fn new_visit(&self, extras: Option<Extras>) -> Result<()> {
        self.send(Command::NewVisit(extras))
    }

    /// Attach an event to the current visit. Does not renew the visit.
    pub fn track_event(&self, event: Event) -> Result<()> {
        self.send(Command::TrackEvent(event))
    }

    /// Merge extra attributes into the current visit.
    pub fn save_extras(&self, extras: Option<Extras>) -> Result<()> {
        self.send(Command::SaveExtras(extras))
    }

    /// Trigger a scheduling check; the visit is renewed only if expired.
    pub fn ensure_fresh_visit(&self) -> Result<()> {
        self.send(Command::Check)
    }

    /// The current visit value. Never fails, also after shutdown.
    pub fn current_visit(&self) -> Visit {
        self.state.current()
    }

    /// The stable per-installation visitor token.
    pub fn visitor_token(&self) -> &str {
        &self.visitor_token
    }

    pub fn add_visit_listener(&self, listener: Arc<dyn VisitListener>) {
        self.state.add_listener(listener);
    }

    pub fn remove_visit_listener(&self, listener: &Arc<dyn VisitListener>) {
        self.state.remove_listener(listener);
    }

    /// Host lifecycle signal: some scope became active. Triggers a
    /// freshness check when auto-start is enabled; no-op after shutdown.
    pub fn handle_became_active(&self) {
        if !self.auto_start || self.state.is_shut_down() {
            return;
        }
        let _ = self.cmd_tx.send(Command::Check);
    }

    /// Host lifecycle signal: the last scope stopped. Disarms the pending
    /// deadline and resets the in-flight flag; queued work is kept for the
    /// next activation.
    pub fn handle_all_stopped(&self) {
        if self.state.is_shut_down() {
            return;
        }
        let _ = self.cmd_tx.send(Command::Suspend);
    }

    /// Stop scheduling permanently and clear stored session state. The
    /// visitor token alone is written back so it survives. Resolves once
    /// the worker has applied the transition; every later mutating call
    /// (including a second shutdown) fails with [`Error::ShutDown`].
    pub async fn shutdown_and_clear(&self) -> Result<()> {
        if self.state.mark_shut_down() {
            return Err(Error::ShutDown);
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.state.is_shut_down() {
            return Err(Error::ShutDown);
        }
        let _ = self.cmd_tx.send(command);
        Ok(())
    }
}
