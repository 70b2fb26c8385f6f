//! Resolver — MaxMind-backed IP geolocation, infallible by contract.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::geoip2;
use tracing::{debug, warn};

/// Sentinel name used when a location cannot be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Resolved (or unresolved) location of an IP address.
///
/// `resolved` distinguishes the explicit sentinel from a successful
/// lookup whose database record happened to carry empty names.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub resolved: bool,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// The sentinel: country/city "Unknown", zero coordinates.
    /// Never partially populated.
    pub fn unknown() -> Self {
        Self {
            resolved: false,
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Ranges excluded from lookup: RFC1918, loopback, link-local,
/// v6 unique-local and v6 link-local. These carry no geography.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// GeoIP resolver over an optional MaxMind City database.
///
/// Every failure mode degrades to [`GeoLocation::unknown`]; `resolve`
/// never errors and never blocks the pipeline.
pub struct GeoResolver {
    reader: Option<maxminddb::Reader<Vec<u8>>>,
}

impl GeoResolver {
    /// Open the City database at `path`. An unreadable database is a
    /// warning, not an error: the resolver runs without a backend and
    /// answers with the sentinel.
    pub fn open(path: &str) -> Self {
        if path.is_empty() || !Path::new(path).exists() {
            warn!(path = path, "GeoIP database not found, geolocation disabled");
            return Self { reader: None };
        }
        match maxminddb::Reader::open_readfile(path) {
            Ok(reader) => {
                debug!(path = path, "GeoIP database loaded");
                Self { reader: Some(reader) }
            }
            Err(e) => {
                warn!(path = path, error = %e, "Failed to open GeoIP database, geolocation disabled");
                Self { reader: None }
            }
        }
    }

    /// A resolver with no backend. Used in tests and when enrichment
    /// is turned off.
    pub fn disabled() -> Self {
        Self { reader: None }
    }

    /// Resolve an IP literal to a location.
    ///
    /// Invalid literals and private-range addresses short-circuit to
    /// the sentinel without touching the backend.
    pub fn resolve(&self, ip: &str) -> GeoLocation {
        let addr: IpAddr = match ip.parse() {
            Ok(addr) => addr,
            Err(_) => return GeoLocation::unknown(),
        };

        if is_private_ip(addr) {
            return GeoLocation::unknown();
        }

        let Some(reader) = &self.reader else {
            return GeoLocation::unknown();
        };

        match reader.lookup::<geoip2::City>(addr) {
            Ok(record) => {
                let country = record
                    .country
                    .as_ref()
                    .and_then(|c| c.names.as_ref())
                    .and_then(|names| names.get("en"))
                    .filter(|name| !name.is_empty())
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string());
                let city = record
                    .city
                    .as_ref()
                    .and_then(|c| c.names.as_ref())
                    .and_then(|names| names.get("en"))
                    .filter(|name| !name.is_empty())
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string());
                let (latitude, longitude) = record
                    .location
                    .as_ref()
                    .map(|loc| (loc.latitude.unwrap_or(0.0), loc.longitude.unwrap_or(0.0)))
                    .unwrap_or((0.0, 0.0));

                GeoLocation { resolved: true, country, city, latitude, longitude }
            }
            Err(e) => {
                debug!(ip = ip, error = %e, "GeoIP lookup failed");
                GeoLocation::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_fully_populated() {
        let loc = GeoLocation::unknown();
        assert!(!loc.is_resolved());
        assert_eq!(loc.country, "Unknown");
        assert_eq!(loc.city, "Unknown");
        assert_eq!(loc.latitude, 0.0);
        assert_eq!(loc.longitude, 0.0);
    }

    #[test]
    fn test_private_v4_ranges() {
        for ip in ["10.0.0.1", "172.16.0.1", "172.31.255.254", "192.168.1.1", "127.0.0.1", "169.254.10.10"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{} should be private", ip);
        }
    }

    #[test]
    fn test_public_v4_not_private() {
        for ip in ["8.8.8.8", "203.0.113.7", "172.32.0.1", "11.0.0.1"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{} should be public", ip);
        }
    }

    #[test]
    fn test_private_v6_ranges() {
        for ip in ["::1", "fc00::1", "fd12:3456::1", "fe80::1"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{} should be private", ip);
        }
        assert!(!is_private_ip("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_resolve_invalid_literal_is_sentinel() {
        let resolver = GeoResolver::disabled();
        assert_eq!(resolver.resolve("not-an-ip"), GeoLocation::unknown());
        assert_eq!(resolver.resolve(""), GeoLocation::unknown());
    }

    #[test]
    fn test_resolve_private_ip_is_sentinel() {
        let resolver = GeoResolver::disabled();
        assert_eq!(resolver.resolve("192.168.0.12"), GeoLocation::unknown());
    }

    #[test]
    fn test_resolve_without_backend_is_sentinel() {
        let resolver = GeoResolver::disabled();
        assert_eq!(resolver.resolve("203.0.113.7"), GeoLocation::unknown());
    }

    #[test]
    fn test_open_missing_database_degrades() {
        let resolver = GeoResolver::open("/nonexistent/GeoLite2-City.mmdb");
        assert_eq!(resolver.resolve("203.0.113.7"), GeoLocation::unknown());
    }
}
