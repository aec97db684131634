use std::sync::Arc;
use std::time::Instant;

use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::error::AppError;
use crate::state::AppState;
use crate::store::{orders, settings};

/// Periodic sweep over stale pending orders. Runs for the lifetime of the
/// process; each tick is independent.
pub async fn run_sweeper(state: Arc<AppState>) {
    info!(
        interval_secs = state.config.sweep_interval_secs,
        "auto-cancel sweeper started"
    );

    let mut ticker = interval(Duration::from_secs(state.config.sweep_interval_secs));
    loop {
        ticker.tick().await;

        let start = Instant::now();
        match sweep_once(&state).await {
            Ok(cancelled) => {
                state
                    .metrics
                    .sweep_latency_seconds
                    .with_label_values(&["success"])
                    .observe(start.elapsed().as_secs_f64());

                if cancelled > 0 {
                    state.metrics.orders_auto_cancelled_total.inc_by(cancelled);
                    info!(cancelled, "stale pending orders cancelled");
                }
            }
            Err(err) => {
                state
                    .metrics
                    .sweep_latency_seconds
                    .with_label_values(&["error"])
                    .observe(start.elapsed().as_secs_f64());
                error!(error = %err, "auto-cancel sweep failed");
            }
        }
    }
}

/// One pass. No configured threshold means the sweep is disabled and the
/// pass is a silent no-op.
pub async fn sweep_once(state: &AppState) -> Result<u64, AppError> {
    let Some(raw) = settings::get_setting(&state.pool, settings::AUTO_CANCEL_MINUTES).await? else {
        return Ok(0);
    };

    let minutes: i64 = raw.trim().parse().map_err(|_| {
        AppError::Validation(format!(
            "setting {} is not a number of minutes: {raw:?}",
            settings::AUTO_CANCEL_MINUTES
        ))
    })?;

    orders::auto_cancel_stale(&state.pool, minutes).await
}
