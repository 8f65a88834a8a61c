//! Refresh coordinator.
//!
//! Owns the current [`Snapshot`] and the outcome of the last fetch. State
//! is published through a `watch` channel so readers never wait on a
//! refresh: they see the previous snapshot until the new one is stored.
//!
//! Refreshes are single-flight. The first caller spawns the fetch as its
//! own task and parks a receiver in `in_flight`; any caller arriving
//! before it settles subscribes to that receiver instead of fetching
//! again. Because the fetch is a separate task, dropping a caller never
//! cancels it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::derived;
use crate::error::RemoteError;
use crate::metrics::AppMetrics;
use crate::source::RateSource;
use crate::types::Snapshot;

/// What every caller of [`RefreshCoordinator::refresh`] receives.
pub type RefreshOutcome = Result<Arc<Snapshot>, RemoteError>;

type InFlight = watch::Receiver<Option<RefreshOutcome>>;

/// Published coordinator state.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub last_update_success: bool,
}

pub struct RefreshCoordinator {
    source: Arc<dyn RateSource + Send + Sync>,
    instance_id: String,
    provider: String,
    refresh_interval: Duration,
    state: watch::Sender<CoordinatorState>,
    in_flight: Mutex<Option<InFlight>>,
    metrics: Option<Arc<AppMetrics>>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn RateSource + Send + Sync>,
        instance_id: impl Into<String>,
        provider: impl Into<String>,
        refresh_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            source,
            instance_id: instance_id.into(),
            provider: provider.into(),
            refresh_interval,
            state,
            in_flight: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base_url(&self) -> &str {
        self.source.base_url()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub(crate) fn source(&self) -> &Arc<dyn RateSource + Send + Sync> {
        &self.source
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<AppMetrics>> {
        self.metrics.as_ref()
    }

    /// The current snapshot, if any fetch has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success
    }

    /// Snapshot and success flag read together.
    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Notified whenever a refresh settles.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Fetch a fresh snapshot, or join the fetch already in progress.
    ///
    /// On failure the previous snapshot stays current and
    /// `last_update_success` turns false.
    pub async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        let mut receiver = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(receiver) => {
                    tracing::debug!("[{}] Joining in-flight refresh", self.instance_id);
                    receiver.clone()
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    *slot = Some(receiver.clone());
                    let coordinator = Arc::clone(self);
                    tokio::spawn(async move {
                        let outcome = coordinator.fetch_and_store().await;
                        coordinator.in_flight.lock().await.take();
                        let _ = sender.send(Some(outcome));
                    });
                    receiver
                }
            }
        };

        let settled = receiver
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone());

        match settled {
            Ok(Some(outcome)) => outcome,
            _ => {
                // The refresh task died before publishing; free the slot so
                // the next caller can start over.
                let mut slot = self.in_flight.lock().await;
                if slot.as_ref().is_some_and(|current| current.same_channel(&receiver)) {
                    slot.take();
                }
                Err(RemoteError::Abandoned)
            }
        }
    }

    /// Start a refresh without waiting for it. Awaiting the handle yields
    /// the same outcome as [`Self::refresh`].
    pub fn request_refresh(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.refresh().await })
    }

    async fn fetch_and_store(&self) -> RefreshOutcome {
        let labels = [self.instance_id.as_str(), self.provider.as_str()];
        if let Some(metrics) = &self.metrics {
            metrics.refreshes_total.with_label_values(&labels).inc();
        }

        match self.source.fetch_rates(&self.provider).await {
            Ok(payload) => {
                let snapshot = Arc::new(payload.into_snapshot(self.provider.clone()));
                self.state.send_modify(|state| {
                    state.snapshot = Some(Arc::clone(&snapshot));
                    state.last_update_success = true;
                });
                tracing::info!(
                    "[{}] Rates refreshed for {} (fetched_at: {})",
                    self.instance_id,
                    self.provider,
                    snapshot.fetched_at.as_deref().unwrap_or("unknown"),
                );
                self.record_gauges(&snapshot);
                Ok(snapshot)
            }
            Err(err) => {
                self.state.send_modify(|state| state.last_update_success = false);
                if let Some(metrics) = &self.metrics {
                    metrics.refresh_errors_total.with_label_values(&labels).inc();
                }
                tracing::error!(
                    "[{}] Error fetching rates for {} from {}: {}",
                    self.instance_id,
                    self.provider,
                    self.source.base_url(),
                    err
                );
                Err(err)
            }
        }
    }

    fn record_gauges(&self, snapshot: &Snapshot) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let labels = [self.instance_id.as_str(), self.provider.as_str()];
        if let Some(age) = derived::rates_age_hours(Some(snapshot), Utc::now()) {
            metrics.rates_age_hours.with_label_values(&labels).set(age);
        }
        if let Some(price) = derived::energy_price(Some(snapshot)) {
            metrics.energy_price.with_label_values(&labels).set(price);
        }
    }
}
