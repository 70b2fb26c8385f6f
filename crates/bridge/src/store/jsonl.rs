//! Jsonl — append-only NDJSON spool store.

use std::pin::Pin;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::eve::NormalizedEvent;

use super::client::{EventStore, StoreError};

/// Append-only store: one JSON document per line.
///
/// The mutex serializes writers so concurrent inserts cannot
/// interleave partial lines.
pub struct JsonlStore {
    file: Mutex<File>,
}

impl JsonlStore {
    /// Open (or create) the spool file in append mode.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl EventStore for JsonlStore {
    fn insert<'a>(
        &'a self,
        event: &'a NormalizedEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut line = serde_json::to_vec(event)
                .map_err(|e| StoreError::Serialize(e.to_string()))?;
            line.push(b'\n');

            let mut file = self.file.lock().await;
            file.write_all(&line).await?;
            file.flush().await?;
            Ok(())
        })
    }
}
