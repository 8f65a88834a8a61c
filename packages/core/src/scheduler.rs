//! Rate polling scheduler.
//!
//! Drives one polling loop per instance: each tick asks the coordinator to
//! refresh. A refresh that is still running when the next tick comes due
//! delays that tick rather than stacking another fetch behind it.

use std::future::Future;
use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};

use crate::coordinator::RefreshCoordinator;

/// Run the polling loop for one coordinator until `shutdown` resolves.
///
/// The first tick fires immediately so the cache is warmed at startup.
/// Errors are already logged by the coordinator; the loop keeps going.
pub async fn run_rate_polling(
    coordinator: Arc<RefreshCoordinator>,
    shutdown: impl Future<Output = ()>,
) {
    let period = coordinator.refresh_interval();
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(
        "[{}] Rate polling started for {} (interval: {}s)",
        coordinator.instance_id(),
        coordinator.provider(),
        period.as_secs()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                poll_once(&coordinator).await;
            }

            _ = &mut shutdown => {
                tracing::info!("[{}] Shutdown signal received. Stopping polling.", coordinator.instance_id());
                break;
            }
        }
    }

    tracing::info!("[{}] Rate polling stopped cleanly", coordinator.instance_id());
}

/// Execute a single poll cycle. Extracted for testability.
async fn poll_once(coordinator: &Arc<RefreshCoordinator>) {
    if coordinator.refresh().await.is_err() {
        tracing::warn!(
            "[{}] Keeping previous rates until the next poll",
            coordinator.instance_id()
        );
    }
}
