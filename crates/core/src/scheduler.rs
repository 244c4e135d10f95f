//! The update scheduler: one worker task draining the request queue.
//!
//! All mutating operations funnel into a single spawned worker that owns
//! the request queue, the armed deadline, and the in-flight flag. The
//! worker suspends only on its channels and the deadline:
//!
//! 1. A public call (or the deadline firing) asks for a check "now".
//! 2. On a check, an expired visit gets a renewal injected at the head of
//!    the queue, then the head request (if any) is dispatched to the
//!    delegate, with at most one call outstanding at a time.
//! 3. The completion is sent back to the worker: success persists the new
//!    visit, pops the head, and re-checks immediately; failure leaves the
//!    head in place and re-checks after a fixed delay.
//! 4. With the queue drained, the deadline is re-armed at the visit's
//!    expiry instant so an idle host still renews on time.
//!
//! Re-arming always supersedes the previous deadline, so "new work queued"
//! and "visit about to expire" share one trigger path instead of two
//! polling loops.

use std::sync::Arc;
use std::time::Duration;

use sojourn_protocol::{Event, Extras, Visit, VisitParams, now_ms};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::delegate::{DelegateError, VisitDelegate};
use crate::queue::{Request, RequestQueue};
use crate::state::VisitState;
use crate::storage::Storage;

/// Delay applied before a failed delegate request is retried.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Idle sleep horizon when no deadline is armed.
const PARKED: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) enum Command {
    NewVisit(Option<Extras>),
    TrackEvent(Event),
    SaveExtras(Option<Extras>),
    Check,
    Suspend,
    Shutdown(oneshot::Sender<()>),
}

struct FlightOutcome {
    epoch: u64,
    result: Result<Visit, DelegateError>,
}

pub(crate) struct Scheduler {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<FlightOutcome>,
    done_rx: mpsc::UnboundedReceiver<FlightOutcome>,
    delegate: Arc<dyn VisitDelegate>,
    storage: Arc<dyn Storage>,
    state: Arc<VisitState>,
    visitor_token: String,
    retry_delay: Duration,
    queue: RequestQueue,
    deadline: Option<Instant>,
    in_flight: bool,
    /// Bumped by suspend/shutdown so completions raced against a reset are
    /// discarded instead of advancing state.
    epoch: u64,
}

impl Scheduler {
    /// Spawn the worker task onto the ambient runtime and return its
    /// command channel.
    pub(crate) fn spawn(
        delegate: Arc<dyn VisitDelegate>,
        storage: Arc<dyn Storage>,
        state: Arc<VisitState>,
        visitor_token: String,
        retry_delay: Duration,
    ) -> mpsc::UnboundedSender<Command> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            cmd_rx,
            done_tx,
            done_rx,
            delegate,
            storage,
            state,
            visitor_token,
            retry_delay,
            queue: RequestQueue::default(),
            deadline: None,
            in_flight: false,
            epoch: 0,
        };
        tokio::spawn(scheduler.run());
        cmd_tx
    }

    async fn run(mut self) {
        loop {
            let wake_at = self
                .deadline
                .unwrap_or_else(|| Instant::now() + PARKED);
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    // Every tracker handle dropped.
                    None => break,
                },
                Some(outcome) = self.done_rx.recv() => self.handle_outcome(outcome),
                _ = tokio::time::sleep_until(wake_at) => {
                    if self.deadline.take().is_some() {
                        self.tick();
                    }
                }
            }
        }
        debug!("scheduler worker stopped");
    }

    /// Returns `true` when the worker should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::NewVisit(extras) => {
                self.state.expire_current();
                let params = VisitParams::new(self.visitor_token.clone(), None, extras);
                self.queue.push(Request::NewVisit(params));
                self.schedule_now();
            }
            Command::TrackEvent(event) => {
                self.queue.push(Request::TrackEvent(event));
                self.schedule_now();
            }
            Command::SaveExtras(extras) => {
                self.queue.push(Request::SaveExtras(extras));
                self.schedule_now();
            }
            Command::Check => self.schedule_now(),
            Command::Suspend => {
                debug!("suspending: disarming deadline and forgetting any flight");
                self.deadline = None;
                self.epoch += 1;
                self.in_flight = false;
            }
            Command::Shutdown(ack) => {
                self.deadline = None;
                self.epoch += 1;
                self.in_flight = false;
                self.queue.clear();
                self.storage.clear();
                self.storage.save_visitor_token(&self.visitor_token);
                debug!("shut down; visitor token preserved");
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    fn handle_outcome(&mut self, outcome: FlightOutcome) {
        if outcome.epoch != self.epoch {
            debug!("discarding stale delegate completion");
            return;
        }
        self.in_flight = false;
        match outcome.result {
            Ok(visit) => {
                self.state.advance(visit, self.storage.as_ref());
                self.queue.pop_head();
                // Pipeline the rest of the queue without delay.
                self.schedule_now();
            }
            Err(error) => {
                warn!(%error, retry_in_ms = self.retry_delay.as_millis() as u64, "delegate request failed");
                self.schedule_in(self.retry_delay);
            }
        }
    }

    /// The single trigger path: renew an expired visit, then drain.
    fn tick(&mut self) {
        debug!(queued = self.queue.len(), in_flight = self.in_flight, "scheduler check");
        if !self.state.current().is_valid() {
            let params = VisitParams::new(self.visitor_token.clone(), None, None);
            if self.queue.inject_renewal_if_absent(params) {
                debug!("visit expired; queued renewal ahead of pending work");
            }
        }
        self.try_drain();
    }

    fn try_drain(&mut self) {
        if self.in_flight {
            return;
        }
        let Some(request) = self.queue.peek_head().cloned() else {
            // Idle housekeeping: wake again when the visit goes stale.
            self.schedule_at_epoch_ms(self.state.current().expires_at());
            return;
        };

        self.in_flight = true;
        let epoch = self.epoch;
        let done_tx = self.done_tx.clone();
        let delegate = Arc::clone(&self.delegate);
        let visitor_token = self.visitor_token.clone();
        let visit = self.state.current();
        tokio::spawn(async move {
            let result = match request {
                Request::NewVisit(params) => delegate.start_visit(params).await,
                Request::TrackEvent(event) => {
                    delegate
                        .track_event(visit.token(), &visitor_token, event)
                        .await
                }
                Request::SaveExtras(extras) => {
                    let params = VisitParams::new(visitor_token, Some(visit), extras);
                    delegate.save_extras(params).await
                }
            };
            let _ = done_tx.send(FlightOutcome { epoch, result });
        });
    }

    fn schedule_now(&mut self) {
        self.deadline = Some(Instant::now());
    }

    fn schedule_in(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    fn schedule_at_epoch_ms(&mut self, at_ms: u64) {
        // Clamped to the idle horizon; a re-check of a still-valid visit
        // just re-arms.
        let delay = Duration::from_millis(at_ms.saturating_sub(now_ms())).min(PARKED);
        debug!(delay_ms = delay.as_millis() as u64, "armed deadline");
        self.deadline = Some(Instant::now() + delay);
    }
}
