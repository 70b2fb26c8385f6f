//! Fanout — the in-process broadcaster feeding viewer queues.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use bridge::eve::NormalizedEvent;

use crate::metrics::FanoutMetrics;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("Broadcaster is closed")]
    Closed,
}

/// Registry of connected viewers, each behind a bounded queue.
///
/// Hand-off uses `try_send`, so a slow viewer never blocks the
/// consumer or its peers: when a queue is full the NEW event is
/// dropped for that viewer only (drop-new policy), and the viewer
/// observes a gap. No lock is held across an await anywhere here.
pub struct Broadcaster {
    viewers: DashMap<u64, mpsc::Sender<Arc<NormalizedEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
    metrics: FanoutMetrics,
}

impl Broadcaster {
    pub fn new(capacity: usize, metrics: FanoutMetrics) -> Self {
        Self {
            viewers: DashMap::new(),
            next_id: AtomicU64::new(0),
            capacity,
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Register a new viewer queue.
    pub fn register(&self) -> Result<(u64, mpsc::Receiver<Arc<NormalizedEvent>>), FanoutError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FanoutError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.viewers.insert(id, tx);
        self.metrics.viewer_started();
        Ok((id, rx))
    }

    /// Remove a viewer. Idempotent; called from the stream guard.
    pub fn deregister(&self, id: u64) {
        if self.viewers.remove(&id).is_some() {
            self.metrics.viewer_ended();
        }
    }

    /// Hand one event to every registered viewer.
    ///
    /// Returns how many queues accepted it. Closed queues found along
    /// the way are pruned.
    pub fn publish(&self, event: Arc<NormalizedEvent>) -> Result<usize, FanoutError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FanoutError::Closed);
        }

        let mut delivered = 0;
        let mut stale: Vec<u64> = Vec::new();

        for entry in self.viewers.iter() {
            match entry.value().try_send(Arc::clone(&event)) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.event_delivered();
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.event_dropped();
                    debug!(viewer = entry.key(), "Viewer queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stale.push(*entry.key());
                }
            }
        }

        for id in stale {
            self.deregister(id);
        }

        Ok(delivered)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Close the broadcaster: reject new viewers and drop every
    /// sender so active viewer streams end. Used at shutdown.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let evicted = self.viewers.len();
        self.viewers.clear();
        for _ in 0..evicted {
            self.metrics.viewer_ended();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_event() -> Arc<NormalizedEvent> {
        Arc::new(NormalizedEvent {
            tenant_id: 1,
            timestamp: Utc::now(),
            event_type: "alert".to_string(),
            src_ip: "203.0.113.7".to_string(),
            src_port: 1,
            dest_ip: "10.0.0.5".to_string(),
            dest_port: 2,
            protocol: "TCP".to_string(),
            signature: String::new(),
            severity: 1,
            category: String::new(),
            action: String::new(),
            country: "Unknown".to_string(),
            city: "Unknown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            raw_payload: "{}".to_string(),
            created_at: Utc::now(),
        })
    }

    fn broadcaster(capacity: usize) -> Broadcaster {
        Broadcaster::new(capacity, FanoutMetrics::new())
    }

    #[tokio::test]
    async fn test_publish_reaches_all_viewers() {
        let fanout = broadcaster(8);
        let (_a, mut rx_a) = fanout.register().unwrap();
        let (_b, mut rx_b) = fanout.register().unwrap();

        let delivered = fanout.publish(sample_event()).unwrap();
        assert_eq!(delivered, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_queue_drops_new_event_for_that_viewer_only() {
        let fanout = broadcaster(1);
        let (_slow, mut slow_rx) = fanout.register().unwrap();
        let (_fast, mut fast_rx) = fanout.register().unwrap();

        // First event fills the slow viewer's queue of 1.
        assert_eq!(fanout.publish(sample_event()).unwrap(), 2);
        // Second event: slow viewer is full, fast viewer drained nothing
        // either, so it is also full. Drain fast first.
        fast_rx.recv().await.unwrap();
        assert_eq!(fanout.publish(sample_event()).unwrap(), 1);

        // Slow viewer sees only the first event, then a gap.
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.try_recv().is_err());
        // Fast viewer got both.
        assert!(fast_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_viewer_is_pruned() {
        let fanout = broadcaster(4);
        let (_keep, _keep_rx) = fanout.register().unwrap();
        let (_gone, gone_rx) = fanout.register().unwrap();
        drop(gone_rx);

        assert_eq!(fanout.viewer_count(), 2);
        fanout.publish(sample_event()).unwrap();
        assert_eq!(fanout.viewer_count(), 1);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let fanout = broadcaster(4);
        let (id, _rx) = fanout.register().unwrap();
        fanout.deregister(id);
        fanout.deregister(id);
        assert_eq!(fanout.viewer_count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_viewer_streams_and_rejects_registration() {
        let fanout = broadcaster(4);
        let (_id, mut rx) = fanout.register().unwrap();

        fanout.close();
        assert!(rx.recv().await.is_none(), "Receiver should end once senders drop");
        assert!(fanout.register().is_err());
        assert!(matches!(fanout.publish(sample_event()), Err(FanoutError::Closed)));
    }
}
