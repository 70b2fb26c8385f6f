//! Consumer — the single shared durable subscription per hub process.
//!
//! One pull consumer drains `events.*`; each delivery is decoded and
//! handed to the broadcaster. Ack on successful hand-off, nack when
//! the hand-off fails so the broker redelivers after restart. A
//! payload that fails to DECODE is deterministically unrecoverable:
//! it is acked and logged, never nacked, so the broker cannot loop
//! on a poison message.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use bridge::eve::{NormalizedEvent, EVENT_SUBJECT_PATTERN};

use crate::state::AppState;

/// Pause after a subscription stream error before polling again.
const SUBSCRIPTION_ERROR_BACKOFF: Duration = Duration::from_millis(500);

pub async fn run_consumer(state: AppState) {
    let mut shutdown = state.shutdown_tx.subscribe();
    let durable = state.config.broker.durable_name.clone();

    let mut sub = match state
        .broker
        .subscribe_durable(EVENT_SUBJECT_PATTERN.to_string(), durable.clone())
        .await
    {
        Ok(sub) => sub,
        Err(e) => {
            error!(durable = %durable, error = %e, "Failed to open durable consumer");
            state.shutdown();
            return;
        }
    };

    info!(durable = %durable, pattern = EVENT_SUBJECT_PATTERN, "Durable consumer running");

    loop {
        let delivery = tokio::select! {
            biased;

            changed = shutdown.changed() => {
                match changed {
                    Ok(()) if *shutdown.borrow_and_update() => break,
                    Ok(()) => continue,
                    Err(_) => break,
                }
            }

            item = sub.next() => match item {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    // Back off so a persistently failing stream does
                    // not spin the loop hot.
                    warn!(error = %e, "Durable subscription error");
                    tokio::time::sleep(SUBSCRIPTION_ERROR_BACKOFF).await;
                    continue;
                }
                None => {
                    warn!("Durable subscription closed by broker");
                    break;
                }
            },
        };

        let event: NormalizedEvent = match serde_json::from_slice(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                // Decode failures are deterministic; redelivery would
                // only replay the same failure. Ack it away.
                warn!(subject = %delivery.subject, error = %e, "Dropping undecodable payload");
                state.metrics.poison_payload();
                if let Err(e) = delivery.ack().await {
                    warn!(error = %e, "Failed to ack poison payload");
                }
                continue;
            }
        };

        match state.fanout.publish(Arc::new(event)) {
            Ok(_delivered) => {
                state.metrics.delivery_acked();
                if let Err(e) = delivery.ack().await {
                    warn!(error = %e, "Failed to ack delivery");
                }
            }
            Err(e) => {
                // Hand-off failed (broadcaster closed): leave the
                // message to the broker for redelivery.
                warn!(error = %e, "Hand-off failed, nacking delivery");
                state.metrics.delivery_nacked();
                if let Err(e) = delivery.nack().await {
                    warn!(error = %e, "Failed to nack delivery");
                }
                break;
            }
        }
    }

    info!(durable = %durable, "Durable consumer stopped");
}
