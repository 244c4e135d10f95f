//! Host lifecycle glue.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::tracker::Tracker;

/// Maps host scope starts/stops onto tracker scheduling signals.
///
/// Hosts call [`scope_started`](Self::scope_started) /
/// [`scope_stopped`](Self::scope_stopped) from their lifecycle hooks.
/// Every start triggers a freshness check; when the last scope stops the
/// scheduler is suspended until the next activation.
pub struct LifecycleMonitor {
    tracker: Tracker,
    started: AtomicUsize,
}

impl LifecycleMonitor {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            started: AtomicUsize::new(0),
        }
    }

    pub fn scope_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.tracker.handle_became_active();
    }

    pub fn scope_stopped(&self) {
        let decremented = self
            .started
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
        match decremented {
            Ok(1) => self.tracker.handle_all_stopped(),
            Ok(_) => {}
            Err(_) => warn!("scope_stopped without a matching scope_started"),
        }
    }

    pub fn active_scopes(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDelegateBuilder;
    use crate::storage::MemoryStorage;
    use crate::tracker::TrackerConfig;
    use std::sync::Arc;

    fn monitor() -> LifecycleMonitor {
        let (delegate, _controller) = FakeDelegateBuilder::new().build();
        let tracker = Tracker::init(
            Arc::new(MemoryStorage::new()),
            delegate,
            TrackerConfig::default(),
        );
        LifecycleMonitor::new(tracker)
    }

    #[tokio::test]
    async fn scopes_are_counted() {
        let monitor = monitor();
        monitor.scope_started();
        monitor.scope_started();
        assert_eq!(monitor.active_scopes(), 2);
        monitor.scope_stopped();
        assert_eq!(monitor.active_scopes(), 1);
        monitor.scope_stopped();
        assert_eq!(monitor.active_scopes(), 0);
    }

    #[tokio::test]
    async fn unmatched_stop_does_not_underflow() {
        let monitor = monitor();
        monitor.scope_stopped();
        assert_eq!(monitor.active_scopes(), 0);
        monitor.scope_started();
        assert_eq!(monitor.active_scopes(), 1);
    }
}
