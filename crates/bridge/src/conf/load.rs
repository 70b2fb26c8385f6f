//! Load — config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::BridgeConfig;

impl BridgeConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("BRIDGE_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/evetail/bridge.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        // Environment variables override file config for critical settings
        if let Ok(url) = std::env::var("NATS_URL") {
            config.nats_url = url;
        }
        if let Ok(tenant) = std::env::var("BRIDGE_TENANT_ID") {
            if let Ok(id) = tenant.parse() {
                config.tenant_id = id;
            }
        }
        if let Ok(stream) = std::env::var("BRIDGE_EVENT_STREAM") {
            config.event_stream = stream;
        }
        if let Ok(spool) = std::env::var("BRIDGE_SPOOL_PATH") {
            config.spool_path = spool;
        }
        if let Ok(db) = std::env::var("BRIDGE_GEOIP_DB") {
            config.geoip_db_path = db;
        }

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: BridgeConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let defaults = BridgeConfig::default();
        Self {
            tenant_id: std::env::var("BRIDGE_TENANT_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tenant_id),
            nats_url: std::env::var("NATS_URL").unwrap_or(defaults.nats_url),
            event_stream: std::env::var("BRIDGE_EVENT_STREAM").unwrap_or(defaults.event_stream),
            spool_path: std::env::var("BRIDGE_SPOOL_PATH").unwrap_or(defaults.spool_path),
            geoip_db_path: std::env::var("BRIDGE_GEOIP_DB").unwrap_or(defaults.geoip_db_path),
        }
    }

    /// Validate that configuration values are sane
    pub fn validate(&self) -> Result<(), String> {
        if self.tenant_id == 0 {
            return Err("tenant_id must be > 0".to_string());
        }
        if self.nats_url.is_empty() {
            return Err("nats_url must not be empty".to_string());
        }
        if self.event_stream.is_empty() {
            return Err("event_stream must not be empty".to_string());
        }
        if self.spool_path.is_empty() {
            return Err("spool_path must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_passes() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_tenant() {
        let cfg = BridgeConfig { tenant_id: 0, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("tenant_id"), "Error should mention tenant_id: {}", err);
    }

    #[test]
    fn test_env_overrides_file_event_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "event_stream = \"FROM_FILE\"").unwrap();

        std::env::set_var("BRIDGE_CONFIG_FILE", path.to_str().unwrap());
        std::env::set_var("BRIDGE_EVENT_STREAM", "FROM_ENV");
        let config = BridgeConfig::load().unwrap();
        std::env::remove_var("BRIDGE_CONFIG_FILE");
        std::env::remove_var("BRIDGE_EVENT_STREAM");

        assert_eq!(config.event_stream, "FROM_ENV", "Env must win over the file");
    }

    #[test]
    fn test_validate_rejects_empty_spool_path() {
        let cfg = BridgeConfig { spool_path: String::new(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
