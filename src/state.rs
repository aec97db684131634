use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::models::event::StatusEvent;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub events_tx: broadcast::Sender<StatusEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            pool,
            config,
            events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Best-effort: nothing listens when no websocket client is connected.
    pub fn emit(&self, event: StatusEvent) {
        let _ = self.events_tx.send(event);
    }
}
