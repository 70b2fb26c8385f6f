//! Fake — in-process test double for the broker.
//!
//! Provides a deterministic [`MemoryBroker`] that implements
//! [`Broker`] with honest durable semantics: a retained message log
//! with retention caps, a payload dedup window, per-durable cursors
//! that survive unsubscribe, nack redelivery, and rejection of a
//! second active subscription under the same durable name.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use super::client::{Acker, Broker, BrokerError, Delivery, DurableSubscription};

#[derive(Debug, Clone)]
pub struct MemoryBrokerConfig {
    pub max_age: Duration,
    pub max_bytes: usize,
    pub dedup_window: Duration,
    /// Capacity of each durable's delivery queue.
    pub queue_capacity: usize,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            max_bytes: 1024 * 1024 * 1024,
            dedup_window: Duration::from_secs(60 * 60),
            queue_capacity: 256,
        }
    }
}

struct StoredMessage {
    seq: u64,
    subject: String,
    payload: Bytes,
    stored_at: Instant,
}

struct DurableRecord {
    pattern: String,
    /// Next sequence this durable has not yet been handed.
    /// Survives unsubscribe, like a server-side cursor.
    next_seq: u64,
    tx: Option<mpsc::Sender<Result<Delivery, BrokerError>>>,
}

#[derive(Default)]
struct BrokerState {
    next_seq: u64,
    total_bytes: usize,
    log: VecDeque<StoredMessage>,
    /// payload hash -> last seen, for the dedup window
    recent: HashMap<u64, Instant>,
    durables: HashMap<String, DurableRecord>,
}

struct Inner {
    config: MemoryBrokerConfig,
    state: Mutex<BrokerState>,
    acked: AtomicU64,
    nacked: AtomicU64,
}

/// In-memory broker double.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_config(MemoryBrokerConfig::default())
    }

    pub fn with_config(config: MemoryBrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(BrokerState::default()),
                acked: AtomicU64::new(0),
                nacked: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the retained log, in publish order.
    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.inner
            .state
            .lock()
            .log
            .iter()
            .map(|m| (m.subject.clone(), m.payload.clone()))
            .collect()
    }

    pub fn acked_count(&self) -> u64 {
        self.inner.acked.load(Ordering::SeqCst)
    }

    pub fn nacked_count(&self) -> u64 {
        self.inner.nacked.load(Ordering::SeqCst)
    }

    fn publish_inner(&self, subject: String, payload: Bytes) {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let window = self.inner.config.dedup_window;

        // Dedup window: a repeated payload inside the window is
        // coalesced, exactly one retained copy.
        let hash = payload_hash(&payload);
        state.recent.retain(|_, seen| now.duration_since(*seen) <= window);
        if state.recent.contains_key(&hash) {
            debug!(subject = %subject, "Duplicate payload inside dedup window, coalesced");
            return;
        }
        state.recent.insert(hash, now);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.total_bytes += payload.len();
        state.log.push_back(StoredMessage {
            seq,
            subject: subject.clone(),
            payload: payload.clone(),
            stored_at: now,
        });

        // Retention caps: evict oldest first.
        while state.total_bytes > self.inner.config.max_bytes
            || state
                .log
                .front()
                .is_some_and(|m| now.duration_since(m.stored_at) > self.inner.config.max_age)
        {
            match state.log.pop_front() {
                Some(evicted) => state.total_bytes -= evicted.payload.len(),
                None => break,
            }
        }

        // Hand the message to every caught-up active durable.
        // Inactive durables keep their cursor; they catch up via
        // replay when they resubscribe. The same holds for an active
        // durable that fell behind: the cursor only moves on a
        // successful hand-off, and a gapped durable receives nothing
        // live so its replay stays in order.
        for (name, record) in state.durables.iter_mut() {
            if let Some(tx) = &record.tx {
                if record.next_seq != seq {
                    continue;
                }
                if !subject_matches(&record.pattern, &subject) {
                    // Nothing to deliver at this sequence; stay caught up.
                    record.next_seq = seq + 1;
                    continue;
                }
                let delivery = make_delivery(
                    Arc::clone(&self.inner),
                    name.clone(),
                    subject.clone(),
                    payload.clone(),
                );
                if tx.try_send(Ok(delivery)).is_ok() {
                    record.next_seq = seq + 1;
                } else {
                    debug!(durable = %name, "Delivery queue full; durable replays on resubscribe");
                }
            }
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn payload_hash(payload: &Bytes) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

/// Token-wise subject matching: `*` matches one token, `>` the rest.
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pat = pattern.split('.');
    let mut sub = subject.split('.');
    loop {
        match (pat.next(), sub.next()) {
            (Some(">"), _) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

fn make_delivery(
    inner: Arc<Inner>,
    durable: String,
    subject: String,
    payload: Bytes,
) -> Delivery {
    let acker = MemoryAcker {
        inner,
        durable,
        subject: subject.clone(),
        payload: payload.clone(),
    };
    Delivery::new(subject, payload, Box::new(acker))
}

struct MemoryAcker {
    inner: Arc<Inner>,
    durable: String,
    subject: String,
    payload: Bytes,
}

impl Acker for MemoryAcker {
    fn ack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>> {
        Box::pin(async move {
            self.inner.acked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn nack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>> {
        Box::pin(async move {
            self.inner.nacked.fetch_add(1, Ordering::SeqCst);

            // Redeliver to the durable's queue if it is still active.
            let state = self.inner.state.lock();
            if let Some(record) = state.durables.get(&self.durable) {
                if let Some(tx) = &record.tx {
                    let delivery = make_delivery(
                        Arc::clone(&self.inner),
                        self.durable.clone(),
                        self.subject.clone(),
                        self.payload.clone(),
                    );
                    tx.try_send(Ok(delivery))
                        .map_err(|_| BrokerError::Ack("redelivery queue full".to_string()))?;
                }
            }
            Ok(())
        })
    }
}

/// Delivery stream for one durable; releases the durable name on drop.
struct MemorySubscription {
    rx: mpsc::Receiver<Result<Delivery, BrokerError>>,
    inner: Arc<Inner>,
    durable: String,
}

impl Stream for MemorySubscription {
    type Item = Result<Delivery, BrokerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if let Some(record) = state.durables.get_mut(&self.durable) {
            record.tx = None;
        }
    }
}

impl Broker for MemoryBroker {
    fn publish(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>> {
        Box::pin(async move {
            self.publish_inner(subject, payload);
            Ok(())
        })
    }

    fn publish_acked(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>> {
        // In-memory storage is immediate, so the acked path is the
        // same as fire-and-forget.
        self.publish(subject, payload)
    }

    fn subscribe_durable(
        &self,
        pattern: String,
        durable_name: String,
    ) -> Pin<
        Box<
            dyn std::future::Future<Output = Result<DurableSubscription, BrokerError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            let rx = {
                let mut state = self.inner.state.lock();

                if let Some(record) = state.durables.get(&durable_name) {
                    if record.tx.is_some() {
                        return Err(BrokerError::DuplicateDurable(durable_name));
                    }
                }

                let (tx, rx) = mpsc::channel(self.inner.config.queue_capacity);
                let record = state
                    .durables
                    .entry(durable_name.clone())
                    .or_insert_with(|| DurableRecord {
                        pattern: pattern.clone(),
                        next_seq: 0,
                        tx: None,
                    });
                record.pattern = pattern.clone();
                record.tx = Some(tx.clone());
                let mut cursor = record.next_seq;

                // Replay retained messages the cursor has not seen.
                // Non-matching sequences advance the cursor without a
                // delivery so the durable ends up caught up.
                let replayable: Vec<(u64, String, Bytes)> = state
                    .log
                    .iter()
                    .filter(|m| m.seq >= cursor)
                    .map(|m| (m.seq, m.subject.clone(), m.payload.clone()))
                    .collect();
                let mut lagging = false;
                for (seq, subject, payload) in replayable {
                    if !subject_matches(&pattern, &subject) {
                        cursor = seq + 1;
                        continue;
                    }
                    let delivery = make_delivery(
                        Arc::clone(&self.inner),
                        durable_name.clone(),
                        subject,
                        payload,
                    );
                    if tx.try_send(Ok(delivery)).is_err() {
                        lagging = true;
                        break;
                    }
                    cursor = seq + 1;
                }
                if !lagging {
                    // Evicted history cannot replay; jump to the head.
                    cursor = cursor.max(state.next_seq);
                }
                if let Some(record) = state.durables.get_mut(&durable_name) {
                    record.next_seq = cursor;
                }

                rx
            };

            Ok(DurableSubscription::new(MemorySubscription {
                rx,
                inner: Arc::clone(&self.inner),
                durable: durable_name,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn payload(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches("events.*", "events.alert"));
        assert!(subject_matches("events.>", "events.alert"));
        assert!(subject_matches("events.alert", "events.alert"));
        assert!(!subject_matches("events.*", "bans.ban"));
        assert!(!subject_matches("events.*", "events.alert.extra"));
        assert!(subject_matches("events.>", "events.alert.extra"));
    }

    #[tokio::test]
    async fn test_publish_retains_in_order() {
        let broker = MemoryBroker::new();
        broker.publish("events.alert".to_string(), payload("a")).await.unwrap();
        broker.publish("events.dns".to_string(), payload("b")).await.unwrap();

        let log = broker.published();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "events.alert");
        assert_eq!(log[1].0, "events.dns");
    }

    #[tokio::test]
    async fn test_dedup_window_coalesces_identical_payloads() {
        let broker = MemoryBroker::new();
        broker.publish("events.alert".to_string(), payload("same")).await.unwrap();
        broker.publish("events.alert".to_string(), payload("same")).await.unwrap();
        broker.publish("events.alert".to_string(), payload("other")).await.unwrap();

        assert_eq!(broker.published().len(), 2);
    }

    #[tokio::test]
    async fn test_byte_cap_evicts_oldest() {
        let broker = MemoryBroker::with_config(MemoryBrokerConfig {
            max_bytes: 10,
            ..Default::default()
        });
        broker.publish("events.a".to_string(), payload("12345678")).await.unwrap();
        broker.publish("events.b".to_string(), payload("87654321")).await.unwrap();

        let log = broker.published();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "events.b");
    }

    #[tokio::test]
    async fn test_subscribe_receives_publishes() {
        let broker = MemoryBroker::new();
        let mut sub = broker
            .subscribe_durable("events.*".to_string(), "test-consumer".to_string())
            .await
            .unwrap();

        broker.publish("events.alert".to_string(), payload("hello")).await.unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        assert_eq!(delivery.subject, "events.alert");
        assert_eq!(delivery.payload, payload("hello"));
        delivery.ack().await.unwrap();
        assert_eq!(broker.acked_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_active_durable_rejected() {
        let broker = MemoryBroker::new();
        let _sub = broker
            .subscribe_durable("events.*".to_string(), "dup".to_string())
            .await
            .unwrap();

        let second = broker
            .subscribe_durable("events.*".to_string(), "dup".to_string())
            .await;
        assert!(matches!(second, Err(BrokerError::DuplicateDurable(_))));
    }

    #[tokio::test]
    async fn test_durable_name_released_on_drop_and_cursor_survives() {
        let broker = MemoryBroker::new();
        broker.publish("events.alert".to_string(), payload("first")).await.unwrap();

        {
            let mut sub = broker
                .subscribe_durable("events.*".to_string(), "resume".to_string())
                .await
                .unwrap();
            let delivery = sub.next().await.unwrap().unwrap();
            assert_eq!(delivery.payload, payload("first"));
            delivery.ack().await.unwrap();
        }

        broker.publish("events.alert".to_string(), payload("second")).await.unwrap();

        // Resubscribe under the same durable: only the new message arrives.
        let mut sub = broker
            .subscribe_durable("events.*".to_string(), "resume".to_string())
            .await
            .unwrap();
        let delivery = sub.next().await.unwrap().unwrap();
        assert_eq!(delivery.payload, payload("second"));
    }

    #[tokio::test]
    async fn test_overflowed_message_replays_on_resubscribe() {
        let broker = MemoryBroker::with_config(MemoryBrokerConfig {
            queue_capacity: 1,
            ..Default::default()
        });

        {
            let _sub = broker
                .subscribe_durable("events.*".to_string(), "lagging".to_string())
                .await
                .unwrap();
            broker.publish("events.alert".to_string(), payload("one")).await.unwrap();
            // Queue of 1 is full now; "two" cannot be handed off and
            // the cursor must stay put.
            broker.publish("events.alert".to_string(), payload("two")).await.unwrap();
        }

        let mut sub = broker
            .subscribe_durable("events.*".to_string(), "lagging".to_string())
            .await
            .unwrap();
        let delivery = sub.next().await.unwrap().unwrap();
        assert_eq!(
            delivery.payload,
            payload("two"),
            "Overflowed message should replay instead of being lost"
        );
    }

    #[tokio::test]
    async fn test_nack_redelivers() {
        let broker = MemoryBroker::new();
        let mut sub = broker
            .subscribe_durable("events.*".to_string(), "redeliver".to_string())
            .await
            .unwrap();

        broker.publish("events.alert".to_string(), payload("retry-me")).await.unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        delivery.nack().await.unwrap();

        let redelivered = sub.next().await.unwrap().unwrap();
        assert_eq!(redelivered.payload, payload("retry-me"));
        assert_eq!(broker.nacked_count(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_matching_subjects() {
        let broker = MemoryBroker::new();
        let mut sub = broker
            .subscribe_durable("events.*".to_string(), "filtered".to_string())
            .await
            .unwrap();

        broker.publish("bans.ban".to_string(), payload("ban")).await.unwrap();
        broker.publish("events.dns".to_string(), payload("dns")).await.unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        assert_eq!(delivery.subject, "events.dns");
    }
}
