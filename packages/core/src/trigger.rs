//! Force-refresh action.
//!
//! Pings the remote service so it regenerates its cached rate document,
//! then re-fetches through the coordinator. The ping is advisory: its
//! failure is logged and the re-fetch always runs.

use std::sync::Arc;

use crate::coordinator::{RefreshCoordinator, RefreshOutcome};
use crate::services::rates::log_notify_failure;

pub const FORCE_REFRESH: &str = "force_refresh";

#[derive(Clone)]
pub struct ManualRefresh {
    coordinator: Arc<RefreshCoordinator>,
}

impl ManualRefresh {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub async fn force_refresh(&self) -> RefreshOutcome {
        let coordinator = &self.coordinator;
        let provider = coordinator.provider();

        if let Some(metrics) = coordinator.metrics() {
            metrics
                .manual_refreshes_total
                .with_label_values(&[coordinator.instance_id(), provider])
                .inc();
        }

        if let Err(err) = coordinator.source().request_remote_refresh(provider).await {
            log_notify_failure(coordinator.base_url(), provider, &err);
        }

        coordinator.refresh().await
    }
}
