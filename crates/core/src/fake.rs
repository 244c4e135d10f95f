//! Fake delegate for testing the scheduler without a network stack.
//!
//! Mirrors the builder/controller split used for transport fakes: the
//! builder produces the delegate handed to `Tracker::init` plus a
//! controller for scripting outcomes and inspecting recorded calls.
//!
//! # Example
//!
//! ```ignore
//! let (delegate, controller) = FakeDelegateBuilder::new().build();
//! let tracker = Tracker::init(storage, delegate, TrackerConfig::default());
//!
//! controller.push_success(visit.clone());
//! tracker.track_event(Event::new("signup"))?;
//!
//! assert!(controller.wait_for_calls(2, Duration::from_secs(1)).await);
//! let calls = controller.take_calls();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sojourn_protocol::{Event, Visit, VisitParams};

use crate::delegate::{DelegateError, VisitDelegate};

/// A delegate invocation recorded by [`FakeDelegate`].
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateCall {
    StartVisit(VisitParams),
    TrackEvent {
        visit_token: String,
        visitor_token: String,
        event: Event,
    },
    SaveExtras(VisitParams),
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Result<Visit, DelegateError>>,
    calls: Vec<DelegateCall>,
    total_calls: usize,
    active: usize,
    max_active: usize,
}

/// Builder for creating fake delegate instances.
pub struct FakeDelegateBuilder {
    visitor_token: String,
    latency: Duration,
}

impl FakeDelegateBuilder {
    pub fn new() -> Self {
        Self {
            visitor_token: "visitor-fake".to_string(),
            latency: Duration::ZERO,
        }
    }

    /// Token returned by `new_visitor_token`.
    #[must_use]
    pub fn visitor_token(mut self, token: impl Into<String>) -> Self {
        self.visitor_token = token.into();
        self
    }

    /// Artificial delay inserted into every mutating call, for exercising
    /// in-flight behavior.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Build the fake delegate and return both it and a controller.
    pub fn build(self) -> (Arc<FakeDelegate>, FakeDelegateController) {
        let script = Arc::new(Mutex::new(Script::default()));
        let delegate = Arc::new(FakeDelegate {
            visitor_token: self.visitor_token,
            latency: self.latency,
            script: Arc::clone(&script),
        });
        (delegate, FakeDelegateController { script })
    }
}

impl Default for FakeDelegateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller for scripting outcomes and inspecting recorded calls.
///
/// Outcomes are consumed in push order, one per mutating call. A call that
/// finds the script empty fails.
pub struct FakeDelegateController {
    script: Arc<Mutex<Script>>,
}

impl FakeDelegateController {
    pub fn push_success(&self, visit: Visit) {
        self.script.lock().outcomes.push_back(Ok(visit));
    }

    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .outcomes
            .push_back(Err(DelegateError::new(message)));
    }

    /// Take all recorded calls, clearing the buffer.
    pub fn take_calls(&self) -> Vec<DelegateCall> {
        std::mem::take(&mut self.script.lock().calls)
    }

    /// Number of mutating calls recorded so far, including taken ones.
    pub fn call_count(&self) -> usize {
        self.script.lock().total_calls
    }

    /// High-water mark of concurrently outstanding mutating calls.
    pub fn max_concurrent(&self) -> usize {
        self.script.lock().max_active
    }

    /// Poll until at least `count` mutating calls were recorded, or the
    /// timeout elapses. Returns whether the count was reached.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.call_count() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// In-memory [`VisitDelegate`] driven by a [`FakeDelegateController`].
pub struct FakeDelegate {
    visitor_token: String,
    latency: Duration,
    script: Arc<Mutex<Script>>,
}

impl FakeDelegate {
    async fn complete(&self, call: DelegateCall) -> Result<Visit, DelegateError> {
        {
            let mut script = self.script.lock();
            script.calls.push(call);
            script.total_calls += 1;
            script.active += 1;
            script.max_active = script.max_active.max(script.active);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut script = self.script.lock();
        script.active -= 1;
        script
            .outcomes
            .pop_front()
            .unwrap_or_else(|| Err(DelegateError::new("no scripted outcome")))
    }
}

#[async_trait]
impl VisitDelegate for FakeDelegate {
    fn new_visitor_token(&self) -> String {
        self.visitor_token.clone()
    }

    async fn start_visit(&self, params: VisitParams) -> Result<Visit, DelegateError> {
        self.complete(DelegateCall::StartVisit(params)).await
    }

    async fn track_event(
        &self,
        visit_token: &str,
        visitor_token: &str,
        event: Event,
    ) -> Result<Visit, DelegateError> {
        self.complete(DelegateCall::TrackEvent {
            visit_token: visit_token.to_string(),
            visitor_token: visitor_token.to_string(),
            event,
        })
        .await
    }

    async fn save_extras(&self, params: VisitParams) -> Result<Visit, DelegateError> {
        self.complete(DelegateCall::SaveExtras(params)).await
    }
}
