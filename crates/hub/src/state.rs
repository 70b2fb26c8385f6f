use std::sync::Arc;

use bridge::broker::Broker;

use crate::config::HubConfig;
use crate::fanout::Broadcaster;
use crate::metrics::FanoutMetrics;

/// Shared application state (thread-safe)
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HubConfig>,
    pub broker: Arc<dyn Broker>,
    pub fanout: Arc<Broadcaster>,
    pub metrics: FanoutMetrics,
    /// Watch channel for shutdown signaling.
    /// Unlike broadcast, watch never loses messages — receivers always
    /// see the latest value, even if they subscribe after the send.
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: HubConfig, broker: Arc<dyn Broker>) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);

        let metrics = FanoutMetrics::new();
        let fanout = Arc::new(Broadcaster::new(
            config.fanout.viewer_queue_capacity,
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            broker,
            fanout,
            metrics,
            shutdown_tx,
        }
    }

    /// Signal shutdown to all components and force-close viewer
    /// streams so the server can finish its graceful drain.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.fanout.close();
    }
}
