//! The delegate boundary: the remote collaborator performing visit calls.

use async_trait::async_trait;
use sojourn_protocol::{Event, Visit, VisitParams};
use thiserror::Error;

/// Failure of a delegate call.
///
/// Opaque to the scheduler: every failure is treated as transient and the
/// owning request is retried after the configured delay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DelegateError {
    message: String,
}

impl DelegateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Remote collaborator that performs the actual visit operations.
///
/// Implementations own transport, wire format, and timeout behavior. Each
/// mutating call resolves to the fresh [`Visit`] the remote endpoint
/// produced, which replaces the tracker's current visit wholesale.
///
/// The scheduler guarantees at most one of these calls is outstanding at a
/// time, so implementations need no request-level locking of their own.
#[async_trait]
pub trait VisitDelegate: Send + Sync + 'static {
    /// Mint a stable visitor token. Called once per installation, when
    /// storage holds none.
    fn new_visitor_token(&self) -> String;

    /// Start a new visit, or renew an expired one.
    async fn start_visit(&self, params: VisitParams) -> Result<Visit, DelegateError>;

    /// Attach a tracked event to the visit identified by `visit_token`.
    async fn track_event(
        &self,
        visit_token: &str,
        visitor_token: &str,
        event: Event,
    ) -> Result<Visit, DelegateError>;

    /// Merge extra attributes into the current visit.
    async fn save_extras(&self, params: VisitParams) -> Result<Visit, DelegateError>;
}
