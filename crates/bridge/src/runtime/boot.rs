//! Boot — logging init, config load, store/broker connection,
//! driver creation.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::broker::{self, NatsBroker};
use crate::conf::BridgeConfig;
use crate::eve::{Parser, TenantId};
use crate::geo::GeoResolver;
use crate::ingest::IngestDriver;
use crate::store::JsonlStore;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, open the spool and GeoIP database, connect to the
/// broker and provision its streams, build the driver.
///
/// Store and broker failures are fatal; a missing GeoIP database only
/// disables enrichment.
pub async fn boot() -> Result<(IngestDriver, BridgeConfig), Box<dyn std::error::Error>> {
    info!("Starting Evetail Bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file or env)
    let config = BridgeConfig::load()?;
    config.validate()?;
    info!(
        "Loaded configuration: tenant_id={}, nats_url={}, spool={}",
        config.tenant_id, config.nats_url, config.spool_path
    );

    // GeoIP degrades, never blocks boot
    let geo = GeoResolver::open(&config.geoip_db_path);

    let store = JsonlStore::open(&config.spool_path).await.map_err(|e| {
        error!("Failed to open event spool: {}", e);
        e
    })?;
    info!("Event spool open at {}", config.spool_path);

    let nats = NatsBroker::connect(&config.nats_url, &config.event_stream)
        .await
        .map_err(|e| {
            error!("Failed to connect to broker: {}", e);
            e
        })?;
    nats.ensure_stream(&broker::events_stream(&config.event_stream)).await?;

    let driver = IngestDriver::new(
        Parser::new(geo),
        Arc::new(store),
        Arc::new(nats),
        TenantId(config.tenant_id),
    );

    Ok((driver, config))
}
