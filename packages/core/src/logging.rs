use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging for the service. Honours `RUST_LOG`, defaulting
/// to `info`.
///
/// Call exactly once, from `main`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized");
}
