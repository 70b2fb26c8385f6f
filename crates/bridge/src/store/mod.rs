//! Store — event persistence behind an object-safe trait.

pub mod client;
pub mod fake;
pub mod jsonl;

pub use client::{EventStore, StoreError};
pub use fake::MemoryStore;
pub use jsonl::JsonlStore;
