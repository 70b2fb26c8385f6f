//! Ingest — the sequential eve.json ingestion loop.

pub mod driver;

pub use driver::IngestDriver;
