// Domain-driven module structure for the Evetail Hub.

// Core infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;

// Domain modules
pub mod bans;
pub mod consumer;
pub mod events;
pub mod fanout;
pub mod identity;
pub mod server;
