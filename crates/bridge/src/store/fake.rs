//! Fake — test double for event persistence.
//!
//! Provides a deterministic [`MemoryStore`] that implements
//! [`EventStore`] using in-memory state, plus a failure switch for
//! exercising the driver's error isolation.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::eve::NormalizedEvent;

use super::client::{EventStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<NormalizedEvent>>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything inserted so far.
    pub fn events(&self) -> Vec<NormalizedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make subsequent inserts fail until switched back.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

impl EventStore for MemoryStore {
    fn insert<'a>(
        &'a self,
        event: &'a NormalizedEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("simulated insert failure".to_string()));
            }
            self.events.lock().push(event.clone());
            Ok(())
        })
    }
}
