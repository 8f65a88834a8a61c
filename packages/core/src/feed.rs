//! Per-instance metric feed.
//!
//! Renders the descriptor table in [`crate::derived`] against one
//! coordinator's current state. Unique ids follow
//! `{instance_id}_{provider}_{suffix}`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::coordinator::RefreshCoordinator;
use crate::derived::{self, MetricDescriptor, MetricValue, AGE_HOURS, METRICS, TOTAL_RATE};
use crate::trigger::FORCE_REFRESH;

pub const MANUFACTURER: &str = "eratemanager";

pub fn unique_id(instance_id: &str, provider: &str, suffix: &str) -> String {
    format!("{}_{}_{}", instance_id, provider, suffix)
}

pub fn provider_label(provider: &str) -> String {
    provider.to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReading {
    pub unique_id: String,
    pub name: String,
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionInfo {
    pub unique_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricFeed {
    pub instance_id: String,
    pub provider: String,
    pub device: DeviceInfo,
    /// Mirrors the outcome of the last refresh attempt.
    pub available: bool,
    /// Production time of the underlying data, when known.
    pub data_as_of: Option<DateTime<Utc>>,
    pub metrics: Vec<MetricReading>,
    pub actions: Vec<ActionInfo>,
    /// Changes only when something other than the elapsed age changes.
    #[serde(skip)]
    pub version: String,
}

impl MetricFeed {
    pub fn metric(&self, suffix: &str) -> Option<&MetricReading> {
        let id = unique_id(&self.instance_id, &self.provider, suffix);
        self.metrics.iter().find(|m| m.unique_id == id)
    }
}

fn reading(
    descriptor: &MetricDescriptor,
    instance_id: &str,
    provider: &str,
    label: &str,
    value: MetricValue,
    attributes: Map<String, Value>,
) -> MetricReading {
    MetricReading {
        unique_id: unique_id(instance_id, provider, descriptor.suffix),
        name: format!("{} {}", label, descriptor.name),
        value,
        unit: descriptor.unit,
        device_class: descriptor.device_class,
        state_class: descriptor.state_class,
        attributes,
    }
}

/// Build the feed from a single consistent read of the coordinator.
pub fn build_feed(coordinator: &RefreshCoordinator, now: DateTime<Utc>) -> MetricFeed {
    let state = coordinator.state();
    let snapshot = state.snapshot.as_deref();
    let instance_id = coordinator.instance_id();
    let provider = coordinator.provider();
    let label = provider_label(provider);

    let metrics = METRICS
        .iter()
        .map(|descriptor| {
            let attributes = if descriptor.suffix == TOTAL_RATE {
                derived::total_rate_attributes(snapshot, state.last_update_success)
            } else {
                Map::new()
            };
            reading(
                descriptor,
                instance_id,
                provider,
                &label,
                descriptor.read(snapshot, now),
                attributes,
            )
        })
        .collect::<Vec<_>>();
    let version = feed_version(state.last_update_success, &metrics);

    MetricFeed {
        instance_id: instance_id.to_string(),
        provider: provider.to_string(),
        device: DeviceInfo {
            name: format!("{} Energy Rates", label),
            manufacturer: MANUFACTURER,
        },
        available: state.last_update_success,
        data_as_of: derived::last_refresh(snapshot),
        metrics,
        actions: vec![ActionInfo {
            unique_id: unique_id(instance_id, provider, FORCE_REFRESH),
            name: format!("{} Force rates refresh", label),
        }],
        version,
    }
}

/// The rate age moves with the clock on every read, so it is left out.
fn feed_version(available: bool, metrics: &[MetricReading]) -> String {
    let stable: Vec<_> = metrics
        .iter()
        .filter(|reading| !reading.unique_id.ends_with(AGE_HOURS))
        .collect();
    serde_json::to_string(&(available, stable)).unwrap_or_default()
}
