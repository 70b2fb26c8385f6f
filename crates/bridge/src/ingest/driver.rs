//! Driver — line loop: parse, classify, persist, publish.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::eve::{self, classify, Parser, TenantId};
use crate::store::EventStore;

/// Single sequential ingestion worker.
///
/// One event is fully processed before the next line is read. Every
/// per-line failure (corrupt bytes, parse, persist, publish) is logged
/// and skipped; the loop only ends on EOF or shutdown. Persistence and
/// publish are independent: a store failure does not stop the publish
/// attempt, and vice versa.
pub struct IngestDriver {
    parser: Parser,
    store: Arc<dyn EventStore>,
    broker: Arc<dyn Broker>,
    tenant: TenantId,
}

impl IngestDriver {
    pub fn new(
        parser: Parser,
        store: Arc<dyn EventStore>,
        broker: Arc<dyn Broker>,
        tenant: TenantId,
    ) -> Self {
        Self { parser, store, broker, tenant }
    }

    /// Consume the reader until EOF or shutdown.
    ///
    /// Lines are read as raw bytes: a line that is not valid UTF-8 is
    /// skipped like any other malformed line instead of erroring the
    /// reader. The shutdown watch is observed between lines, so
    /// cancellation is cooperative within one line boundary.
    pub async fn run<R>(
        &self,
        mut reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), std::io::Error>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf: Vec<u8> = Vec::new();
        let mut processed: u64 = 0;

        loop {
            let read = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow_and_update() => {
                            info!("Shutdown requested, stopping ingestion");
                            break;
                        }
                        Ok(()) => continue,
                        // Sender gone: treat as shutdown
                        Err(_) => break,
                    }
                }

                read = reader.read_until(b'\n', &mut buf) => read?,
            };

            if read == 0 {
                break; // EOF
            }

            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }

            if self.process_line(&buf).await {
                processed += 1;
            }
            buf.clear();
        }

        info!(processed = processed, "Ingestion drained");
        Ok(())
    }

    /// Handle one raw input line. Returns whether an event was
    /// ingested; every failure is logged and swallowed.
    async fn process_line(&self, raw: &[u8]) -> bool {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(_) => {
                warn!("Input line is not valid UTF-8, skipping");
                return false;
            }
        };

        if line.is_empty() {
            return false;
        }

        let envelope = match eve::decode(line.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Failed to parse event, skipping line");
                return false;
            }
        };

        let event = self.parser.normalize(&envelope, line, self.tenant);

        if classify::is_brute_force(&envelope) {
            debug!(
                src_ip = %event.src_ip,
                signature = %event.signature,
                "Brute-force pattern in alert signature"
            );
        }
        let iocs = classify::extract_iocs(&envelope);
        if !iocs.is_empty() {
            debug!(
                priority = classify::priority(&envelope),
                ioc_kinds = iocs.len(),
                "Extracted indicators"
            );
        }

        if let Err(e) = self.store.insert(&event).await {
            warn!(error = %e, "Failed to persist event");
        }

        let subject = eve::subject_for(&event.event_type);
        match serde_json::to_vec(&event) {
            Ok(buf) => {
                if let Err(e) = self.broker.publish(subject, buf.into()).await {
                    warn!(error = %e, "Failed to publish event");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize event for publish"),
        }

        debug!(
            event_type = %event.event_type,
            src_ip = %event.src_ip,
            dest_ip = %event.dest_ip,
            "Processed event"
        );
        true
    }
}
