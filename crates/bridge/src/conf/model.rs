//! Model — BridgeConfig and related structs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Tenant all ingested events belong to. The default applies at
    /// this boundary only; the core pipeline takes it by parameter.
    pub tenant_id: u32,
    /// NATS server URL.
    pub nats_url: String,
    /// JetStream stream holding normalized events.
    pub event_stream: String,
    /// Path of the append-only NDJSON spool.
    pub spool_path: String,
    /// MaxMind GeoLite2 City database. Empty disables geolocation.
    pub geoip_db_path: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tenant_id: 1,
            nats_url: "nats://127.0.0.1:4222".to_string(),
            event_stream: "EVETAIL_EVENTS".to_string(),
            spool_path: "events.jsonl".to_string(),
            geoip_db_path: "".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.tenant_id, 1);
        assert_eq!(cfg.nats_url, "nats://127.0.0.1:4222");
        assert_eq!(cfg.event_stream, "EVETAIL_EVENTS");
        assert!(cfg.geoip_db_path.is_empty(), "Geolocation is off by default");
    }

    #[test]
    fn test_bridge_config_deserialize_partial_toml() {
        // Only set tenant_id; rest should use defaults via #[serde(default)]
        let toml_str = r#"tenant_id = 42"#;
        let cfg: BridgeConfig = toml::from_str(toml_str).expect("Should accept partial TOML");
        assert_eq!(cfg.tenant_id, 42);
        assert_eq!(cfg.event_stream, "EVETAIL_EVENTS"); // default
    }

    #[test]
    fn test_bridge_config_toml_round_trip() {
        let cfg = BridgeConfig::default();
        let toml_str = toml::to_string(&cfg).expect("Should serialize to TOML");
        let back: BridgeConfig = toml::from_str(&toml_str).expect("Should deserialize from TOML");
        assert_eq!(back.nats_url, cfg.nats_url);
        assert_eq!(back.spool_path, cfg.spool_path);
    }
}
