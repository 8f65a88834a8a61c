//! Derived metrics over the current rate snapshot.
//!
//! Every accessor is a pure function of `(snapshot, now)` and answers
//! `None` / [`MetricValue::Unknown`] when its input is absent or does not
//! parse. Nothing here returns an error to the caller.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::types::{Amount, RateRecord, Snapshot};

/// Rates older than this are reported as a freshness problem.
pub const FRESHNESS_HOURS: i64 = 48;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp. A trailing `Z` means UTC and values
/// without zone information are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = raw.trim();
    let normalized = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(ParseError::Timestamp {
        value: raw.to_string(),
    })
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

fn plan(snapshot: Option<&Snapshot>) -> Option<&RateRecord> {
    snapshot.and_then(Snapshot::residential_standard)
}

fn fetched_at(snapshot: Option<&Snapshot>) -> Option<DateTime<Utc>> {
    let raw = snapshot?.fetched_at.as_deref().filter(|s| !s.is_empty())?;
    match parse_timestamp(raw) {
        Ok(dt) => Some(dt),
        Err(err) => {
            tracing::debug!("{}", err);
            None
        }
    }
}

/// Age of the data at `now`. Clock skew (data stamped in the future) is
/// clamped to zero.
fn age(snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> Option<Duration> {
    let produced = fetched_at(snapshot)?;
    Some((now - produced).max(Duration::zero()))
}

/// `energy_rate + tva_fuel_rate` in USD/kWh; missing components count as 0.
pub fn total_energy_rate(snapshot: Option<&Snapshot>) -> Option<f64> {
    let record = plan(snapshot)?;
    let energy = record.energy_rate_usd_per_kwh.or_zero().ok()?;
    let fuel = record.tva_fuel_rate_usd_per_kwh.or_zero().ok()?;
    Some(energy + fuel)
}

/// Monthly customer charge in USD.
pub fn fixed_charge(snapshot: Option<&Snapshot>) -> Option<f64> {
    plan(snapshot)?.customer_charge_monthly_usd.as_f64().ok().flatten()
}

pub fn last_refresh(snapshot: Option<&Snapshot>) -> Option<DateTime<Utc>> {
    fetched_at(snapshot)
}

/// Fractional hours since the rate data was produced.
pub fn rates_age_hours(snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> Option<f64> {
    let age = age(snapshot, now)?;
    Some(age.num_milliseconds() as f64 / 3_600_000.0)
}

/// Total energy rate rounded to five places, for the energy dashboard.
pub fn energy_price(snapshot: Option<&Snapshot>) -> Option<f64> {
    total_energy_rate(snapshot).map(round5)
}

/// Monthly charge spread over a 30-day month.
pub fn daily_fixed_cost(snapshot: Option<&Snapshot>) -> Option<f64> {
    fixed_charge(snapshot).map(|monthly| round5(monthly / 30.0))
}

pub fn monthly_fixed_cost(snapshot: Option<&Snapshot>) -> Option<f64> {
    fixed_charge(snapshot)
}

/// `Some(true)` when the data is older than [`FRESHNESS_HOURS`].
pub fn freshness_problem(snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> Option<bool> {
    age(snapshot, now).map(|age| age > Duration::hours(FRESHNESS_HOURS))
}

/// A metric reading as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Timestamp(DateTime<Utc>),
    Flag(bool),
    Unknown,
}

impl MetricValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, MetricValue::Unknown)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MetricValue::Unknown, MetricValue::Number)
    }
}

impl From<Option<DateTime<Utc>>> for MetricValue {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(MetricValue::Unknown, MetricValue::Timestamp)
    }
}

impl From<Option<bool>> for MetricValue {
    fn from(value: Option<bool>) -> Self {
        value.map_or(MetricValue::Unknown, MetricValue::Flag)
    }
}

pub type MetricAccessor = fn(Option<&Snapshot>, DateTime<Utc>) -> MetricValue;

/// Static description of one published metric.
#[derive(Clone, Copy)]
pub struct MetricDescriptor {
    /// Last component of the metric's unique id.
    pub suffix: &'static str,
    /// Display name, prefixed with the provider label when published.
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub value: MetricAccessor,
}

impl MetricDescriptor {
    pub fn read(&self, snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> MetricValue {
        (self.value)(snapshot, now)
    }
}

fn total_rate_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    total_energy_rate(snapshot).into()
}

fn fixed_charge_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    fixed_charge(snapshot).into()
}

fn last_refresh_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    last_refresh(snapshot).into()
}

fn age_hours_value(snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> MetricValue {
    rates_age_hours(snapshot, now).into()
}

fn energy_price_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    energy_price(snapshot).into()
}

fn daily_fixed_cost_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    daily_fixed_cost(snapshot).into()
}

fn monthly_fixed_cost_value(snapshot: Option<&Snapshot>, _now: DateTime<Utc>) -> MetricValue {
    monthly_fixed_cost(snapshot).into()
}

fn freshness_value(snapshot: Option<&Snapshot>, now: DateTime<Utc>) -> MetricValue {
    freshness_problem(snapshot, now).into()
}

pub const TOTAL_RATE: &str = "total_rate";
pub const AGE_HOURS: &str = "age_hours";

/// Every metric published per instance, in publication order.
pub const METRICS: [MetricDescriptor; 8] = [
    MetricDescriptor {
        suffix: TOTAL_RATE,
        name: "Total energy rate",
        unit: Some("USD/kWh"),
        device_class: Some("monetary"),
        state_class: None,
        value: total_rate_value,
    },
    MetricDescriptor {
        suffix: "fixed_charge",
        name: "Fixed customer charge",
        unit: Some("USD"),
        device_class: Some("monetary"),
        state_class: None,
        value: fixed_charge_value,
    },
    MetricDescriptor {
        suffix: "last_refresh",
        name: "Rates last refresh",
        unit: None,
        device_class: Some("timestamp"),
        state_class: None,
        value: last_refresh_value,
    },
    MetricDescriptor {
        suffix: AGE_HOURS,
        name: "Rates age (hours)",
        unit: Some("h"),
        device_class: None,
        state_class: Some("measurement"),
        value: age_hours_value,
    },
    MetricDescriptor {
        suffix: "energy_price",
        name: "Energy price",
        unit: Some("USD/kWh"),
        device_class: Some("monetary"),
        state_class: Some("measurement"),
        value: energy_price_value,
    },
    MetricDescriptor {
        suffix: "daily_fixed_cost",
        name: "Daily fixed cost",
        unit: Some("USD"),
        device_class: Some("monetary"),
        state_class: None,
        value: daily_fixed_cost_value,
    },
    MetricDescriptor {
        suffix: "monthly_fixed_cost",
        name: "Monthly fixed cost",
        unit: Some("USD"),
        device_class: Some("monetary"),
        state_class: None,
        value: monthly_fixed_cost_value,
    },
    MetricDescriptor {
        suffix: "rates_up_to_date",
        name: "Rates up to date",
        unit: None,
        device_class: Some("problem"),
        state_class: None,
        value: freshness_value,
    },
];

/// Auxiliary attributes attached to the total-rate metric.
pub fn total_rate_attributes(snapshot: Option<&Snapshot>, last_update_success: bool) -> Map<String, Value> {
    let mut attrs = Map::new();
    let record = plan(snapshot).cloned().unwrap_or_default();
    let amount = |a: &Amount| serde_json::to_value(a).unwrap_or(Value::Null);

    attrs.insert("energy_rate_usd_per_kwh".into(), amount(&record.energy_rate_usd_per_kwh));
    attrs.insert("tva_fuel_rate_usd_per_kwh".into(), amount(&record.tva_fuel_rate_usd_per_kwh));
    attrs.insert(
        "customer_charge_monthly_usd".into(),
        amount(&record.customer_charge_monthly_usd),
    );

    let present = |value: Option<&String>| value.filter(|s| !s.is_empty()).cloned();
    let optional = [
        ("last_refresh", snapshot.and_then(|s| present(s.fetched_at.as_ref()))),
        ("source", snapshot.and_then(|s| present(s.source.as_ref()))),
        ("source_url", snapshot.and_then(|s| present(s.source_url.as_ref()))),
        ("pdf_url", snapshot.and_then(|s| present(s.pdf_url.as_ref()))),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            attrs.insert(key.into(), Value::String(value));
        }
    }

    attrs.insert("last_refresh_ok".into(), Value::Bool(last_update_success));
    attrs.insert(
        "utility".into(),
        snapshot
            .and_then(|s| s.utility.clone())
            .map_or(Value::Null, Value::String),
    );
    attrs.insert(
        "provider".into(),
        snapshot.map_or(Value::Null, |s| Value::String(s.provider.clone())),
    );
    attrs
}
