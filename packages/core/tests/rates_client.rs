//! Remote rate client against a wiremocked rate service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use energy_rates::coordinator::RefreshCoordinator;
use energy_rates::derived;
use energy_rates::error::{NotifyError, ProviderDiscoveryError, RemoteError};
use energy_rates::services::RatesClient;
use energy_rates::trigger::ManualRefresh;
use energy_rates::types::{Amount, ProviderCatalog};

fn rates_document() -> serde_json::Value {
    json!({
        "rates": {
            "residential_standard": {
                "is_present": true,
                "energy_rate_usd_per_kwh": 0.10,
                "tva_fuel_rate_usd_per_kwh": 0.02,
                "customer_charge_monthly_usd": 15.0
            }
        },
        "fetched_at": "2024-01-01T00:00:00Z",
        "utility": "Cumberland EMC",
        "source": "cemc.org",
        "source_url": "https://cemc.org/rates",
        "pdf_url": "https://cemc.org/rates.pdf"
    })
}

async fn mount_rates(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rates/cemc/residential"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

// ---- fetch_rates ------------------------------------------------------------

#[tokio::test]
async fn fetch_rates_parses_document() {
    let server = MockServer::start().await;
    mount_rates(&server, 200, rates_document()).await;

    let payload = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap();

    let plan = &payload.rates["residential_standard"];
    assert!(plan.is_present);
    assert_eq!(plan.energy_rate_usd_per_kwh, Amount::Value(0.10));
    assert_eq!(payload.utility.as_deref(), Some("Cumberland EMC"));
    assert_eq!(payload.pdf_url.as_deref(), Some("https://cemc.org/rates.pdf"));
}

#[tokio::test]
async fn fetch_rates_non_200_is_status_error() {
    let server = MockServer::start().await;
    mount_rates(&server, 500, json!({ "error": "boom" })).await;

    let err = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap_err();
    assert_eq!(err, RemoteError::Status { status: 500 });
}

#[tokio::test]
async fn fetch_rates_other_2xx_is_still_a_failure() {
    let server = MockServer::start().await;
    mount_rates(&server, 204, json!({})).await;

    let err = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap_err();
    assert_eq!(err, RemoteError::Status { status: 204 });
}

#[tokio::test]
async fn fetch_rates_without_rates_key_fails() {
    let server = MockServer::start().await;
    mount_rates(&server, 200, json!({ "utility": "CEMC" })).await;

    let err = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap_err();
    assert_eq!(err, RemoteError::MissingRates);
}

#[tokio::test]
async fn fetch_rates_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rates/cemc/residential"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>", "text/html"))
        .mount(&server)
        .await;

    let err = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap_err();
    assert!(matches!(err, RemoteError::Parse { .. }));
}

#[tokio::test]
async fn fetch_rates_ignores_non_object_sibling_plan() {
    let server = MockServer::start().await;
    let mut body = rates_document();
    body["rates"]["commercial"] = serde_json::Value::Null;
    mount_rates(&server, 200, body).await;

    let payload = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap();

    assert!(!payload.rates.contains_key("commercial"));
    let snapshot = payload.into_snapshot("cemc");
    assert!((derived::total_energy_rate(Some(&snapshot)).unwrap() - 0.12).abs() < 1e-9);
}

#[tokio::test]
async fn fetch_rates_accepts_null_rates() {
    let server = MockServer::start().await;
    mount_rates(&server, 200, json!({ "rates": null, "utility": "CEMC" })).await;

    let snapshot = RatesClient::new(server.uri())
        .fetch_rates("cemc")
        .await
        .unwrap()
        .into_snapshot("cemc");

    assert!(snapshot.rates.is_empty());
    assert_eq!(derived::total_energy_rate(Some(&snapshot)), None);
}

#[tokio::test]
async fn fetch_rates_accepts_numeric_fetched_at() {
    let server = MockServer::start().await;
    let mut body = rates_document();
    body["fetched_at"] = json!(1704067200);
    mount_rates(&server, 200, body).await;

    let snapshot = RatesClient::new(server.uri())
        .fetch_rates("cemc")
        .await
        .unwrap()
        .into_snapshot("cemc");

    // Only the time-based metrics lose their value.
    assert_eq!(derived::last_refresh(Some(&snapshot)), None);
    assert_eq!(derived::freshness_problem(Some(&snapshot), chrono::Utc::now()), None);
    assert_eq!(derived::fixed_charge(Some(&snapshot)), Some(15.0));
}

#[tokio::test]
async fn fetch_rates_accepts_numeric_utility() {
    let server = MockServer::start().await;
    let mut body = rates_document();
    body["utility"] = json!(42);
    mount_rates(&server, 200, body).await;

    let payload = RatesClient::new(server.uri()).fetch_rates("cemc").await.unwrap();
    assert_eq!(payload.utility.as_deref(), Some("42"));
}

#[tokio::test]
async fn odd_document_still_counts_as_successful_refresh() {
    let server = MockServer::start().await;
    let mut body = rates_document();
    body["rates"]["commercial"] = serde_json::Value::Null;
    body["fetched_at"] = json!(1704067200);
    body["utility"] = json!(42);
    mount_rates(&server, 200, body).await;

    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(RatesClient::new(server.uri())),
        "entry1",
        "cemc",
        Duration::from_secs(3600),
    ));
    coordinator.refresh().await.unwrap();

    assert!(coordinator.last_update_success());
    assert!(coordinator.snapshot().is_some());
}

#[tokio::test]
async fn validate_provider_reports_title_and_utility() {
    let server = MockServer::start().await;
    mount_rates(&server, 200, rates_document()).await;

    let info = RatesClient::new(format!("{}/", server.uri()))
        .validate_provider("cemc")
        .await
        .unwrap();

    assert_eq!(info.title, "HA Energy Rates (cemc)");
    assert_eq!(info.utility.as_deref(), Some("Cumberland EMC"));
}

// ---- providers --------------------------------------------------------------

#[tokio::test]
async fn providers_are_discovered_from_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "providers": [
                { "key": "cemc", "name": "Cumberland EMC" },
                { "key": "mte", "name": "Middle Tennessee Electric" }
            ]
        })))
        .mount(&server)
        .await;

    let catalog = RatesClient::new(server.uri()).fetch_providers().await;

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.get("Middle Tennessee Electric"), Some("mte"));
}

#[tokio::test]
async fn providers_http_500_falls_back_to_builtin_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = RatesClient::new(server.uri());
    assert_eq!(
        client.try_fetch_providers().await,
        Err(ProviderDiscoveryError::Status { status: 500 })
    );
    assert_eq!(client.fetch_providers().await, ProviderCatalog::builtin());
}

#[tokio::test]
async fn empty_provider_list_falls_back_to_builtin_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "providers": [] })))
        .mount(&server)
        .await;

    let client = RatesClient::new(server.uri());
    assert_eq!(client.try_fetch_providers().await, Err(ProviderDiscoveryError::Empty));
    assert_eq!(client.fetch_providers().await, ProviderCatalog::builtin());
}

// ---- remote refresh ping ----------------------------------------------------

#[tokio::test]
async fn remote_refresh_ping_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/refresh/cemc"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = RatesClient::new(server.uri())
        .try_trigger_remote_refresh("cemc")
        .await
        .unwrap_err();
    assert_eq!(err, NotifyError::Status { status: 403 });
}

#[tokio::test]
async fn manual_refresh_survives_slow_ping_and_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/refresh/cemc"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    mount_rates(&server, 200, rates_document()).await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let client = RatesClient::with_http(server.uri(), http);
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(client),
        "entry1",
        "cemc",
        Duration::from_secs(3600),
    ));
    let trigger = ManualRefresh::new(coordinator.clone());

    trigger.force_refresh().await.unwrap();

    assert!(coordinator.last_update_success());
    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(snapshot.provider, "cemc");
    assert!((derived::total_energy_rate(Some(&snapshot)).unwrap() - 0.12).abs() < 1e-9);
}
