//! Geo — GeoIP enrichment with graceful degradation.

pub mod resolver;

pub use resolver::{is_private_ip, GeoLocation, GeoResolver, UNKNOWN};
