//! Client — abstract interface for durable pub/sub.
//!
//! Every pipeline component talks to the broker through this trait.
//! `nats.rs` provides the JetStream-backed implementation.
//! `fake.rs` provides an in-process test double.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use thiserror::Error;
use tokio_stream::Stream;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Durable consumer '{0}' is already active")]
    DuplicateDurable(String),

    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    #[error("Stream provisioning failed: {0}")]
    Provision(String),
}

/// Acknowledgement handle for one delivery.
///
/// Consumed on use: a delivery is either acked or nacked, once.
pub trait Acker: Send {
    fn ack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>>;

    /// Negative acknowledgement: ask the broker to redeliver.
    fn nack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>>;
}

/// One message delivered on a durable subscription.
pub struct Delivery {
    pub subject: String,
    pub payload: Bytes,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(subject: String, payload: Bytes, acker: Box<dyn Acker>) -> Self {
        Self { subject, payload, acker }
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    pub async fn nack(self) -> Result<(), BrokerError> {
        self.acker.nack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Owned stream of deliveries for one durable consumer.
///
/// Dropping the subscription releases the durable name; the cursor
/// survives on the broker so a later subscriber resumes where this
/// one stopped.
pub struct DurableSubscription {
    inner: Pin<Box<dyn Stream<Item = Result<Delivery, BrokerError>> + Send>>,
}

impl DurableSubscription {
    pub fn new(
        inner: impl Stream<Item = Result<Delivery, BrokerError>> + Send + 'static,
    ) -> Self {
        Self { inner: Box::pin(inner) }
    }
}

impl Stream for DurableSubscription {
    type Item = Result<Delivery, BrokerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Unified async interface over the message broker.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must
/// be `Send + Sync` so they can be shared behind an `Arc`.
pub trait Broker: Send + Sync {
    /// Fire-and-forget publish: the broker acknowledgement is not
    /// awaited. Used on the hot ingestion path.
    fn publish(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>>;

    /// Publish and wait for the broker's acknowledgement. Used for
    /// control-plane actions that must not be lost silently.
    fn publish_acked(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>>;

    /// Open the durable consumer `durable_name` over `pattern`.
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
    >;
}
