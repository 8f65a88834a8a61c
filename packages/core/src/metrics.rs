//! Prometheus metrics registry for the energy rates service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and hand it to
//! every coordinator and to the HTTP layer.
//!
//! Per-instance series are labelled by `instance` and `provider`.

use prometheus::{CounterVec, GaugeVec, Histogram, HistogramOpts, Opts, Registry};

pub struct AppMetrics {
    /// Remote rate fetches attempted (success + failure).
    pub refreshes_total: CounterVec,
    /// Remote rate fetches that failed.
    pub refresh_errors_total: CounterVec,
    /// Manual refreshes requested through the force-refresh action.
    pub manual_refreshes_total: CounterVec,
    /// Age of the cached rate data at the last successful refresh, in hours.
    pub rates_age_hours: GaugeVec,
    /// Latest combined energy price in USD/kWh.
    pub energy_price: GaugeVec,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    pub registry: Registry,
}

const INSTANCE_LABELS: &[&str] = &["instance", "provider"];

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let refreshes_total = CounterVec::new(
            Opts::new("energy_rates_refreshes_total", "Remote rate fetches attempted"),
            INSTANCE_LABELS,
        )?;

        let refresh_errors_total = CounterVec::new(
            Opts::new("energy_rates_refresh_errors_total", "Remote rate fetches that failed"),
            INSTANCE_LABELS,
        )?;

        let manual_refreshes_total = CounterVec::new(
            Opts::new(
                "energy_rates_manual_refreshes_total",
                "Force-refresh actions invoked",
            ),
            INSTANCE_LABELS,
        )?;

        let rates_age_hours = GaugeVec::new(
            Opts::new(
                "energy_rates_rates_age_hours",
                "Age of the cached rate data in hours",
            ),
            INSTANCE_LABELS,
        )?;

        let energy_price = GaugeVec::new(
            Opts::new("energy_rates_energy_price", "Combined energy price in USD/kWh"),
            INSTANCE_LABELS,
        )?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "energy_rates_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "energy_rates_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(refreshes_total.clone()))?;
        registry.register(Box::new(refresh_errors_total.clone()))?;
        registry.register(Box::new(manual_refreshes_total.clone()))?;
        registry.register(Box::new(rates_age_hours.clone()))?;
        registry.register(Box::new(energy_price.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            refreshes_total,
            refresh_errors_total,
            manual_refreshes_total,
            rates_age_hours,
            energy_price,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
