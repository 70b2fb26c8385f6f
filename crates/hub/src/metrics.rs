use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fan-out metrics tracker
#[derive(Clone)]
pub struct FanoutMetrics {
    inner: Arc<FanoutMetricsInner>,
}

struct FanoutMetricsInner {
    /// Currently connected viewers
    active_viewers: AtomicU64,

    /// Total viewers connected (lifetime)
    total_viewers: AtomicU64,

    /// Events handed to viewer queues
    events_delivered: AtomicU64,

    /// Events dropped because a viewer queue was full
    events_dropped: AtomicU64,

    /// Broker deliveries acknowledged
    consumer_acked: AtomicU64,

    /// Broker deliveries negatively acknowledged
    consumer_nacked: AtomicU64,

    /// Undecodable payloads acked away
    poison_payloads: AtomicU64,
}

impl FanoutMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FanoutMetricsInner {
                active_viewers: AtomicU64::new(0),
                total_viewers: AtomicU64::new(0),
                events_delivered: AtomicU64::new(0),
                events_dropped: AtomicU64::new(0),
                consumer_acked: AtomicU64::new(0),
                consumer_nacked: AtomicU64::new(0),
                poison_payloads: AtomicU64::new(0),
            }),
        }
    }

    /// Called when a viewer connects
    pub fn viewer_started(&self) {
        self.inner.active_viewers.fetch_add(1, Ordering::Relaxed);
        self.inner.total_viewers.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            active = self.inner.active_viewers.load(Ordering::Relaxed),
            "Viewer connected"
        );
    }

    /// Called when a viewer stream ends
    pub fn viewer_ended(&self) {
        // Atomic check-and-decrement prevents underflow under
        // concurrent connect/disconnect.
        let _ = self.inner.active_viewers.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| if current > 0 { Some(current - 1) } else { None },
        );

        tracing::debug!(
            active = self.inner.active_viewers.load(Ordering::Relaxed),
            "Viewer disconnected"
        );
    }

    pub fn event_delivered(&self) {
        self.inner.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_dropped(&self) {
        self.inner.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_acked(&self) {
        self.inner.consumer_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_nacked(&self) {
        self.inner.consumer_nacked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poison_payload(&self) {
        self.inner.poison_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_viewers(&self) -> u64 {
        self.inner.active_viewers.load(Ordering::Relaxed)
    }

    pub fn total_viewers(&self) -> u64 {
        self.inner.total_viewers.load(Ordering::Relaxed)
    }

    pub fn delivered_count(&self) -> u64 {
        self.inner.events_delivered.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.events_dropped.load(Ordering::Relaxed)
    }

    pub fn acked_count(&self) -> u64 {
        self.inner.consumer_acked.load(Ordering::Relaxed)
    }

    pub fn nacked_count(&self) -> u64 {
        self.inner.consumer_nacked.load(Ordering::Relaxed)
    }

    pub fn poison_count(&self) -> u64 {
        self.inner.poison_payloads.load(Ordering::Relaxed)
    }
}

impl Default for FanoutMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_counts() {
        let metrics = FanoutMetrics::new();
        metrics.viewer_started();
        metrics.viewer_started();
        metrics.viewer_ended();
        assert_eq!(metrics.active_viewers(), 1);
        assert_eq!(metrics.total_viewers(), 2);
    }

    #[test]
    fn test_viewer_ended_never_underflows() {
        let metrics = FanoutMetrics::new();
        metrics.viewer_ended();
        assert_eq!(metrics.active_viewers(), 0);
    }
}
