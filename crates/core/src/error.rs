//! Error types surfaced by the public tracking API.

use thiserror::Error;

/// Errors returned to callers of [`Tracker`](crate::Tracker) methods.
///
/// Transient delegate failures are never surfaced here; mutating calls are
/// fire-and-forget and failed requests are retried internally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The tracker was shut down; mutating calls are permanently rejected.
    #[error("tracker has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, Error>;
