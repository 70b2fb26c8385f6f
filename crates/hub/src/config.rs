use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub fanout: FanoutConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub url: String,
    /// JetStream stream holding normalized events.
    pub event_stream: String,
    /// JetStream stream holding ban actions.
    pub ban_stream: String,
    /// Name of the single shared durable consumer for this hub.
    pub durable_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FanoutConfig {
    /// Bounded queue size per connected viewer.
    pub viewer_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl HubConfig {
    /// Load configuration from hub.toml and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Start with compile-time defaults as the foundation
        // This ensures that if a key is missing in files/env, we use the default
        let defaults = config::Config::try_from(&HubConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // Layer config files (overrides defaults)
        // Try these locations in order:
        // 1. /etc/evetail/hub.toml (Docker/production)
        // 2. config/hub.toml (local development)
        // 3. crates/hub/config/hub.toml (workspace root)
        let config_paths = vec![
            "/etc/evetail/hub",
            "config/hub",
            "crates/hub/config/hub",
        ];

        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Layer environment variables (overrides everything)
        // Use double underscore for nested keys: HUB_SERVER__BIND_ADDRESS
        builder = builder.add_source(
            config::Environment::with_prefix("HUB")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .context("Invalid bind_address")?;

        if self.broker.url.is_empty() {
            anyhow::bail!("broker.url must not be empty");
        }
        if self.broker.durable_name.is_empty() {
            anyhow::bail!("broker.durable_name must not be empty");
        }
        if self.fanout.viewer_queue_capacity == 0 {
            anyhow::bail!("fanout.viewer_queue_capacity must be > 0");
        }

        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0:8080".to_string(),
                request_timeout_secs: 30,
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            broker: BrokerConfig {
                url: "nats://127.0.0.1:4222".to_string(),
                event_stream: "EVETAIL_EVENTS".to_string(),
                ban_stream: "EVETAIL_BANS".to_string(),
                durable_name: "evetail-hub".to_string(),
            },
            fanout: FanoutConfig {
                viewer_queue_capacity: 128,
            },
            logging: LoggingConfig {
                level: "info,hub=debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}
