//! Core data types: the rate document served by the remote service, the
//! cached snapshot derived from it, and the provider catalog.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::ParseError;

/// Plan key the derived metrics are computed from.
pub const RESIDENTIAL_STANDARD: &str = "residential_standard";

/// Built-in provider table used whenever `/providers` is unusable.
pub const STATIC_PROVIDERS: [(&str, &str); 3] = [("CEMC", "cemc"), ("NES", "nes"), ("Demo", "demo")];

/// A numeric rate field as it appeared on the wire.
///
/// The remote schema is not validated beyond presence, so numbers, numeric
/// strings and `null` are all accepted. Anything else is kept as
/// [`Amount::Invalid`] and derives to "unknown" rather than failing the
/// whole document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Amount {
    #[default]
    Missing,
    Value(f64),
    Invalid(String),
}

impl Amount {
    /// Standalone reading: `Missing` is `None`.
    pub fn as_f64(&self) -> Result<Option<f64>, ParseError> {
        match self {
            Amount::Missing => Ok(None),
            Amount::Value(v) => Ok(Some(*v)),
            Amount::Invalid(raw) => Err(ParseError::Amount { value: raw.clone() }),
        }
    }

    /// Reading inside a sum: `Missing` counts as zero.
    pub fn or_zero(&self) -> Result<f64, ParseError> {
        Ok(self.as_f64()?.unwrap_or(0.0))
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Value(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Amount::Missing => serializer.serialize_none(),
            Amount::Value(v) => serializer.serialize_f64(*v),
            Amount::Invalid(raw) => serializer.serialize_str(raw),
        }
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string or null")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
        Ok(Amount::Missing)
    }

    fn visit_none<E: de::Error>(self) -> Result<Amount, E> {
        Ok(Amount::Missing)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Ok(Amount::Value(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::Value(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::Value(v as f64))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Amount, E> {
        Ok(Amount::Invalid(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Ok(match v.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Amount::Value(parsed),
            _ => Amount::Invalid(v.to_string()),
        })
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Amount, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(Amount::Invalid("[array]".to_string()))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Amount, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Ok(Amount::Invalid("[object]".to_string()))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_option(AmountVisitor)
    }
}

/// Pricing for one rate plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// When false the record is absent data, never zero-valued data.
    #[serde(default)]
    pub is_present: bool,
    #[serde(default)]
    pub energy_rate_usd_per_kwh: Amount,
    #[serde(default)]
    pub tva_fuel_rate_usd_per_kwh: Amount,
    #[serde(default)]
    pub customer_charge_monthly_usd: Amount,
}

/// Body of `GET {base}/rates/{provider}/residential`.
///
/// Only the presence of `rates` is required. A plan that is not a readable
/// record is dropped, and the text fields keep whatever scalar was sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatesPayload {
    #[serde(deserialize_with = "lenient_plans")]
    pub rates: HashMap<String, RateRecord>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fetched_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub utility: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pdf_url: Option<String>,
}

/// `null` or a non-object yields no plans; unreadable plans are skipped.
fn lenient_plans<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, RateRecord>, D::Error> {
    let Value::Object(plans) = Value::deserialize(deserializer)? else {
        return Ok(HashMap::new());
    };
    Ok(plans
        .into_iter()
        .filter_map(|(name, plan)| match RateRecord::deserialize(plan) {
            Ok(record) => Some((name, record)),
            Err(err) => {
                tracing::debug!("Ignoring unreadable rate plan '{}': {}", name, err);
                None
            }
        })
        .collect())
}

/// Scalars are kept as text; `null`, arrays and objects become `None`.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

impl RatesPayload {
    /// Stamp the payload with the coordinator's configured provider.
    pub fn into_snapshot(self, provider: impl Into<String>) -> Snapshot {
        Snapshot {
            fetched_at: self.fetched_at,
            utility: self.utility,
            source: self.source,
            source_url: self.source_url,
            pdf_url: self.pdf_url,
            rates: self.rates,
            provider: provider.into(),
        }
    }
}

/// The single cached result of the most recent successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Production time of the rate data as reported by the remote service.
    pub fetched_at: Option<String>,
    pub utility: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub pdf_url: Option<String>,
    pub rates: HashMap<String, RateRecord>,
    pub provider: String,
}

impl Snapshot {
    /// The residential standard plan, if the remote marked it present.
    pub fn residential_standard(&self) -> Option<&RateRecord> {
        self.rates
            .get(RESIDENTIAL_STANDARD)
            .filter(|record| record.is_present)
    }
}

/// Display label → provider key, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCatalog(Vec<(String, String)>);

impl ProviderCatalog {
    pub fn builtin() -> Self {
        Self(
            STATIC_PROVIDERS
                .iter()
                .map(|(label, key)| (label.to_string(), key.to_string()))
                .collect(),
        )
    }

    /// Insert or replace the key for `label`, keeping first-seen order.
    pub fn insert(&mut self, label: String, key: String) {
        match self.0.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = key,
            None => self.0.push((label, key)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, key)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(label, key)| (label.as_str(), key.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Body of `GET {base}/providers`.
#[derive(Debug, Deserialize)]
pub struct ProvidersResponse {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<ProvidersResponse> for ProviderCatalog {
    fn from(response: ProvidersResponse) -> Self {
        let mut catalog = ProviderCatalog(Vec::new());
        for entry in response.providers {
            let Some(key) = entry.key.filter(|k| !k.is_empty()) else {
                continue;
            };
            let label = entry.name.filter(|n| !n.is_empty()).unwrap_or_else(|| key.clone());
            catalog.insert(label, key);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_accepts_numbers_strings_and_null() {
        let record: RateRecord = serde_json::from_value(json!({
            "is_present": true,
            "energy_rate_usd_per_kwh": 0.1,
            "tva_fuel_rate_usd_per_kwh": "0.02",
            "customer_charge_monthly_usd": null,
        }))
        .unwrap();

        assert_eq!(record.energy_rate_usd_per_kwh, Amount::Value(0.1));
        assert_eq!(record.tva_fuel_rate_usd_per_kwh, Amount::Value(0.02));
        assert_eq!(record.customer_charge_monthly_usd, Amount::Missing);
    }

    #[test]
    fn amount_keeps_garbage_as_invalid() {
        let record: RateRecord = serde_json::from_value(json!({
            "is_present": true,
            "energy_rate_usd_per_kwh": "n/a",
        }))
        .unwrap();

        assert_eq!(record.energy_rate_usd_per_kwh, Amount::Invalid("n/a".into()));
        assert!(record.energy_rate_usd_per_kwh.as_f64().is_err());
        assert_eq!(record.customer_charge_monthly_usd, Amount::Missing);
    }

    #[test]
    fn missing_amount_is_zero_only_inside_sums() {
        assert_eq!(Amount::Missing.as_f64(), Ok(None));
        assert_eq!(Amount::Missing.or_zero(), Ok(0.0));
    }

    #[test]
    fn residential_standard_ignores_absent_plan() {
        let payload: RatesPayload = serde_json::from_value(json!({
            "rates": { "residential_standard": { "is_present": false, "energy_rate_usd_per_kwh": 0.1 } }
        }))
        .unwrap();

        let snapshot = payload.into_snapshot("cemc");
        assert!(snapshot.residential_standard().is_none());
        assert_eq!(snapshot.provider, "cemc");
    }

    #[test]
    fn payload_without_rates_key_is_rejected() {
        let parsed = serde_json::from_value::<RatesPayload>(json!({ "utility": "CEMC" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn unreadable_sibling_plans_are_dropped() {
        let payload: RatesPayload = serde_json::from_value(json!({
            "rates": {
                "residential_standard": { "is_present": true, "energy_rate_usd_per_kwh": 0.1 },
                "commercial": null,
                "industrial": [1, 2],
                "seasonal": { "is_present": "yes" }
            }
        }))
        .unwrap();

        assert_eq!(payload.rates.len(), 1);
        let snapshot = payload.into_snapshot("cemc");
        assert_eq!(
            snapshot.residential_standard().unwrap().energy_rate_usd_per_kwh,
            Amount::Value(0.1)
        );
    }

    #[test]
    fn null_rates_is_an_empty_plan_map() {
        let payload: RatesPayload = serde_json::from_value(json!({ "rates": null })).unwrap();
        assert!(payload.rates.is_empty());
    }

    #[test]
    fn text_fields_accept_any_scalar() {
        let payload: RatesPayload = serde_json::from_value(json!({
            "rates": {},
            "fetched_at": 1704067200,
            "utility": 42,
            "source": true,
            "source_url": { "href": "x" },
            "pdf_url": null
        }))
        .unwrap();

        assert_eq!(payload.fetched_at.as_deref(), Some("1704067200"));
        assert_eq!(payload.utility.as_deref(), Some("42"));
        assert_eq!(payload.source.as_deref(), Some("true"));
        assert_eq!(payload.source_url, None);
        assert_eq!(payload.pdf_url, None);
    }

    #[test]
    fn provider_catalog_skips_keyless_entries_and_defaults_label() {
        let response: ProvidersResponse = serde_json::from_value(json!({
            "providers": [
                { "key": "cemc", "name": "Cumberland EMC" },
                { "name": "No key" },
                { "key": "nes" },
            ]
        }))
        .unwrap();

        let catalog = ProviderCatalog::from(response);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Cumberland EMC"), Some("cemc"));
        assert_eq!(catalog.get("nes"), Some("nes"));
    }

    #[test]
    fn builtin_catalog_has_three_entries() {
        let catalog = ProviderCatalog::builtin();
        let entries: Vec<_> = catalog.iter().collect();
        assert_eq!(entries, vec![("CEMC", "cemc"), ("NES", "nes"), ("Demo", "demo")]);
    }
}
