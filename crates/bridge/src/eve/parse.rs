//! Parse — envelope decode and event normalization.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::geo::GeoResolver;

use super::model::{EveEnvelope, NormalizedEvent, ParseError, TenantId};

/// Primary Suricata timestamp format: microseconds + numeric offset.
const TS_FORMAT_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.6f%z";

/// Secondary format: microseconds + literal "Z" (UTC).
const TS_FORMAT_UTC: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Decode a raw eve.json line into the wire envelope.
///
/// Unknown fields are ignored; malformed JSON is an error with no
/// partial result.
pub fn decode(raw: &[u8]) -> Result<EveEnvelope, ParseError> {
    if std::str::from_utf8(raw).is_err() {
        return Err(ParseError::NonUtf8);
    }
    serde_json::from_slice(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// Parse the Suricata timestamp, trying the numeric-offset format
/// first, then the "Z"-suffixed UTC format.
pub(crate) fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(ts, TS_FORMAT_OFFSET) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, TS_FORMAT_UTC)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Event parser: decode + enrich + normalize.
pub struct Parser {
    geo: GeoResolver,
}

impl Parser {
    pub fn new(geo: GeoResolver) -> Self {
        Self { geo }
    }

    /// Parse a raw eve.json line into a [`NormalizedEvent`].
    pub fn parse(&self, raw: &[u8], tenant: TenantId) -> Result<NormalizedEvent, ParseError> {
        let envelope = decode(raw)?;
        // decode already rejected non-UTF8 content
        let raw_str = std::str::from_utf8(raw).map_err(|_| ParseError::NonUtf8)?;
        Ok(self.normalize(&envelope, raw_str, tenant))
    }

    /// Normalize a decoded envelope. Infallible: timestamp falls back
    /// to ingestion wall-clock, geo enrichment degrades to the
    /// sentinel.
    pub fn normalize(
        &self,
        envelope: &EveEnvelope,
        raw: &str,
        tenant: TenantId,
    ) -> NormalizedEvent {
        let timestamp = match parse_timestamp(&envelope.timestamp) {
            Some(ts) => ts,
            None => {
                warn!(
                    timestamp = %envelope.timestamp,
                    "Unparseable event timestamp, falling back to ingestion time"
                );
                Utc::now()
            }
        };

        let (signature, severity, category, action) = match &envelope.alert {
            Some(alert) => (
                alert.signature.clone(),
                alert.severity,
                alert.category.clone(),
                alert.action.clone(),
            ),
            None => (String::new(), 0, String::new(), String::new()),
        };

        let geo = self.geo.resolve(&envelope.src_ip);

        NormalizedEvent {
            tenant_id: tenant.as_u32(),
            timestamp,
            event_type: envelope.event_type.clone(),
            src_ip: envelope.src_ip.clone(),
            src_port: envelope.src_port,
            dest_ip: envelope.dest_ip.clone(),
            dest_port: envelope.dest_port,
            protocol: envelope.proto.clone(),
            signature,
            severity,
            category,
            action,
            country: geo.country,
            city: geo.city,
            latitude: geo.latitude,
            longitude: geo.longitude,
            raw_payload: raw.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const ALERT_LINE: &str = r#"{
        "timestamp": "2024-03-01T10:15:30.123456+0000",
        "event_type": "alert",
        "src_ip": "203.0.113.7",
        "src_port": 51234,
        "dest_ip": "10.0.0.5",
        "dest_port": 22,
        "proto": "TCP",
        "alert": {
            "action": "allowed",
            "signature": "ET SCAN Potential SSH Scan",
            "category": "Attempted Information Leak",
            "severity": 2
        }
    }"#;

    fn parser() -> Parser {
        Parser::new(GeoResolver::disabled())
    }

    #[test]
    fn test_parse_timestamp_numeric_offset() {
        let ts = parse_timestamp("2024-03-01T10:15:30.123456+0200").unwrap();
        assert_eq!(ts.hour(), 8); // normalized to UTC
        assert_eq!(ts.day(), 1);
    }

    #[test]
    fn test_parse_timestamp_zulu() {
        let ts = parse_timestamp("2024-03-01T10:15:30.123456Z").unwrap();
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.year(), 2024);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday at noon").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_alert_copies_alert_fields() {
        let event = parser().parse(ALERT_LINE.as_bytes(), TenantId(7)).unwrap();

        assert_eq!(event.tenant_id, 7);
        assert_eq!(event.event_type, "alert");
        assert_eq!(event.src_ip, "203.0.113.7");
        assert_eq!(event.src_port, 51234);
        assert_eq!(event.dest_ip, "10.0.0.5");
        assert_eq!(event.dest_port, 22);
        assert_eq!(event.protocol, "TCP");
        assert_eq!(event.signature, "ET SCAN Potential SSH Scan");
        assert_eq!(event.severity, 2);
        assert_eq!(event.category, "Attempted Information Leak");
        assert_eq!(event.action, "allowed");
        assert_eq!(event.timestamp.hour(), 10);
    }

    #[test]
    fn test_parse_retains_raw_payload_verbatim() {
        let event = parser().parse(ALERT_LINE.as_bytes(), TenantId(1)).unwrap();
        assert_eq!(event.raw_payload, ALERT_LINE);
    }

    #[test]
    fn test_parse_non_alert_has_empty_classification() {
        let line = r#"{"timestamp":"2024-03-01T10:15:30.123456Z","event_type":"dns","src_ip":"192.0.2.1","dest_ip":"8.8.8.8","proto":"UDP","dns":{"type":"query","rrname":"example.com"}}"#;
        let event = parser().parse(line.as_bytes(), TenantId(1)).unwrap();

        assert_eq!(event.event_type, "dns");
        assert_eq!(event.signature, "");
        assert_eq!(event.severity, 0);
        assert_eq!(event.category, "");
        assert_eq!(event.action, "");
    }

    #[test]
    fn test_parse_bad_timestamp_falls_back_to_now() {
        let line = r#"{"timestamp":"not-a-time","event_type":"flow","src_ip":"192.0.2.1","dest_ip":"192.0.2.2","proto":"TCP"}"#;
        let before = Utc::now();
        let event = parser().parse(line.as_bytes(), TenantId(1)).unwrap();
        let after = Utc::now();

        assert!(event.timestamp >= before && event.timestamp <= after);
    }

    #[test]
    fn test_parse_malformed_json_is_error() {
        let result = parser().parse(b"{\"event_type\": \"alert\"", TenantId(1));
        assert!(matches!(result, Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_non_json_is_error() {
        assert!(parser().parse(b"plain text line", TenantId(1)).is_err());
    }

    #[test]
    fn test_parse_unknown_fields_ignored() {
        let line = r#"{"timestamp":"2024-03-01T10:15:30.123456Z","event_type":"alert","src_ip":"192.0.2.1","dest_ip":"192.0.2.2","proto":"TCP","alert":{"signature":"x","severity":1},"packet_info":{"linktype":1},"community_id":"1:abc"}"#;
        let event = parser().parse(line.as_bytes(), TenantId(1)).unwrap();
        assert_eq!(event.signature, "x");
    }

    #[test]
    fn test_parse_private_source_ip_stays_unresolved() {
        let line = r#"{"timestamp":"2024-03-01T10:15:30.123456Z","event_type":"flow","src_ip":"192.168.1.10","dest_ip":"192.0.2.2","proto":"TCP"}"#;
        let event = parser().parse(line.as_bytes(), TenantId(1)).unwrap();
        assert_eq!(event.country, "Unknown");
        assert_eq!(event.city, "Unknown");
        assert_eq!(event.latitude, 0.0);
        assert_eq!(event.longitude, 0.0);
    }
}
