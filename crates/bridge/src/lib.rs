// Domain-driven module structure for the Evetail Bridge.

// Core infrastructure
pub mod broker;
pub mod geo;
pub mod store;

// Domain modules
pub mod conf;
pub mod eve;
pub mod ingest;
pub mod runtime;
