use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use bridge::broker::{bans_stream, events_stream, NatsBroker};

use hub::config::HubConfig;
use hub::consumer;
use hub::server;
use hub::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Phase 1: Basic tracing so we can log during config loading
    let _basic_tracing = server::init_tracing_basic();

    info!("Starting Evetail Hub v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = HubConfig::load().context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    // Phase 2: Re-initialize tracing with config (format, level)
    // Drop the phase-1 thread-local guard so the global subscriber slot is free
    drop(_basic_tracing);
    server::init_tracing_from_config(&config);

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.server.bind_address);

    // Connect to the broker and provision both streams up front so
    // publish and subscribe never race stream creation.
    let broker = NatsBroker::connect(&config.broker.url, &config.broker.event_stream)
        .await
        .context("Failed to connect to broker")?;
    broker
        .ensure_stream(&events_stream(&config.broker.event_stream))
        .await
        .context("Failed to provision event stream")?;
    broker
        .ensure_stream(&bans_stream(&config.broker.ban_stream))
        .await
        .context("Failed to provision ban stream")?;

    info!(url = %config.broker.url, "Broker connected, streams provisioned");

    // Create application state
    let state = AppState::new(config.clone(), Arc::new(broker));

    // Start the single shared durable consumer for this process
    let consumer_handle = tokio::spawn(consumer::run_consumer(state.clone()));

    // Build the application router
    let app = server::build_router(state.clone());

    // Parse bind address
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .context("Invalid bind address")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("✓ Evetail Hub is ready!");
    info!("  - Event stream: http://{}/api/events/stream", addr);
    info!("  - Health check: http://{}/health", addr);
    info!("Listening on: http://{}", addr);

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server::shutdown_signal().await;
            // Close viewer streams so the graceful drain can finish,
            // and stop the durable consumer.
            shutdown_state.shutdown();
        })
        .await
        .context("Server error")?;

    // The consumer acks or nacks its in-flight delivery before exiting.
    let _ = consumer_handle.await;

    info!("Server shut down gracefully");
    Ok(())
}
