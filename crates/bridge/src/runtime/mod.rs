//! Runtime — process boot and the stdin ingestion run loop.

pub mod boot;
pub mod run;
