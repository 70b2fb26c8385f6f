//! Client — abstract interface for event persistence.
//!
//! The pipeline writes events through this trait. `jsonl.rs` provides
//! the append-only spool implementation; `fake.rs` provides a test
//! double. Relational stores plug in behind the same seam.

use std::pin::Pin;

use thiserror::Error;

use crate::eve::NormalizedEvent;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Async event sink.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must
/// be `Send + Sync` so they can sit behind an `Arc` in the driver.
pub trait EventStore: Send + Sync {
    fn insert<'a>(
        &'a self,
        event: &'a NormalizedEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
