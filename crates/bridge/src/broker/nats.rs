//! Nats — JetStream-backed broker implementation.

use std::pin::Pin;
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream, AckKind};
use bytes::Bytes;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use super::client::{Acker, Broker, BrokerError, Delivery, DurableSubscription};

/// Provisioning parameters for one JetStream stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub name: String,
    pub subjects: Vec<String>,
    pub max_age: Duration,
    /// Byte cap for the stream; -1 means unlimited.
    pub max_bytes: i64,
    /// Window in which a repeated payload is coalesced server-side.
    pub dedup_window: Duration,
}

/// JetStream broker client.
///
/// Durable subscriptions are pull consumers on the event stream named
/// at connect time; the durable cursor lives on the server, so a
/// restarted process resumes from its last acknowledged message.
pub struct NatsBroker {
    js: jetstream::Context,
    event_stream: String,
}

impl NatsBroker {
    /// Connect to the NATS server. Fatal on failure: the pipeline has
    /// no degraded mode without its broker.
    pub async fn connect(url: &str, event_stream: &str) -> Result<Self, BrokerError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        info!(url = url, "Connected to NATS");
        Ok(Self {
            js: jetstream::new(client),
            event_stream: event_stream.to_string(),
        })
    }

    /// Create the stream if it does not exist yet. Idempotent, so
    /// every process provisions the streams it uses at boot.
    pub async fn ensure_stream(&self, settings: &StreamSettings) -> Result<(), BrokerError> {
        self.js
            .get_or_create_stream(stream::Config {
                name: settings.name.clone(),
                subjects: settings.subjects.clone(),
                max_age: settings.max_age,
                max_bytes: settings.max_bytes,
                duplicate_window: settings.dedup_window,
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| BrokerError::Provision(e.to_string()))?;
        debug!(stream = %settings.name, "Stream provisioned");
        Ok(())
    }
}

struct NatsAcker {
    message: jetstream::Message,
}

impl Acker for NatsAcker {
    fn ack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>> {
        Box::pin(async move {
            self.message
                .ack()
                .await
                .map_err(|e| BrokerError::Ack(e.to_string()))
        })
    }

    fn nack(
        self: Box<Self>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send>> {
        Box::pin(async move {
            self.message
                .ack_with(AckKind::Nak(None))
                .await
                .map_err(|e| BrokerError::Ack(e.to_string()))
        })
    }
}

impl Broker for NatsBroker {
    fn publish(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>> {
        Box::pin(async move {
            // The returned ack future is deliberately dropped: the
            // ingestion path is fire-and-forget.
            self.js
                .publish(subject, payload)
                .await
                .map_err(|e| BrokerError::Publish(e.to_string()))?;
            Ok(())
        })
    }

    fn publish_acked(
        &self,
        subject: String,
        payload: Bytes,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), BrokerError>> + Send + '_>> {
        Box::pin(async move {
            let ack = self
                .js
                .publish(subject, payload)
                .await
                .map_err(|e| BrokerError::Publish(e.to_string()))?;
            ack.await.map_err(|e| BrokerError::Publish(e.to_string()))?;
            Ok(())
        })
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
            let stream = self
                .js
                .get_stream(&self.event_stream)
                .await
                .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

            let consumer: consumer::PullConsumer = stream
                .get_or_create_consumer(
                    &durable_name,
                    consumer::pull::Config {
                        durable_name: Some(durable_name.clone()),
                        filter_subject: pattern,
                        ack_policy: consumer::AckPolicy::Explicit,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

            let messages = consumer
                .messages()
                .await
                .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

            info!(durable = %durable_name, "Durable consumer open");

            let deliveries = messages.map(|item| match item {
                Ok(message) => {
                    let subject = message.subject.to_string();
                    let payload = message.payload.clone();
                    Ok(Delivery::new(subject, payload, Box::new(NatsAcker { message })))
                }
                Err(e) => Err(BrokerError::Subscribe(e.to_string())),
            });

            Ok(DurableSubscription::new(deliveries))
        })
    }
}
