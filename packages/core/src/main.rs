use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::{watch, RwLock};

use energy_rates::api::{self, AppState};
use energy_rates::cli::{Cli, Command};
use energy_rates::config::{Config, DEFAULT_API_URL};
use energy_rates::coordinator::RefreshCoordinator;
use energy_rates::error::AppError;
use energy_rates::logging::init_logging;
use energy_rates::metrics::AppMetrics;
use energy_rates::registry::{InstanceRegistry, RatesInstance};
use energy_rates::scheduler::run_rate_polling;
use energy_rates::services::RatesClient;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    // Discovery only needs the service URL, not a configured provider.
    if matches!(cli.command, Some(Command::Providers)) {
        let api_url = cli
            .api_url
            .clone()
            .or_else(|| std::env::var("RATES_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        print_providers(&api_url).await;
        return;
    }

    let config = cli
        .load_config()
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Providers => Ok(()),
        Command::Check => check_provider(&config).await,
    };

    if let Err(err) = result {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> Result<(), AppError> {
    tracing::info!("Service started with config: {:?}", config);

    let metrics = Arc::new(AppMetrics::new()?);
    let client = RatesClient::with_http(config.api_url.clone(), reqwest::Client::new());

    let coordinator = Arc::new(
        RefreshCoordinator::new(
            Arc::new(client.clone()),
            config.instance_id.clone(),
            config.provider.clone(),
            Duration::from_secs(config.poll_interval_seconds),
        )
        .with_metrics(metrics.clone()),
    );

    let mut registry = InstanceRegistry::new();
    registry.insert(RatesInstance::new(coordinator));
    let registry = Arc::new(RwLock::new(registry));

    let (stop_polling, polling_stopped) = watch::channel(false);
    let pollers: Vec<_> = registry
        .read()
        .await
        .iter()
        .map(|instance| {
            let mut stopped = polling_stopped.clone();
            tokio::spawn(run_rate_polling(
                Arc::clone(&instance.coordinator),
                async move {
                    let _ = stopped.wait_for(|stop| *stop).await;
                },
            ))
        })
        .collect();

    let app = api::router(AppState {
        registry: registry.clone(),
        metrics,
        catalog_client: client,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|err| AppError::Server(format!("bind {}: {}", config.bind_addr, err)))?;
    tracing::info!("Listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|err| AppError::Server(err.to_string()));

    let _ = stop_polling.send(true);
    for poller in pollers {
        let _ = poller.await;
    }
    let drained = registry.write().await.drain();
    tracing::info!("Released {} instance(s)", drained.len());

    served
}

async fn print_providers(api_url: &str) {
    let client = RatesClient::new(api_url);
    for (label, key) in client.fetch_providers().await.iter() {
        println!("{}\t{}", label, key);
    }
}

async fn check_provider(config: &Config) -> Result<(), AppError> {
    let client = RatesClient::new(config.api_url.clone());
    let info = client.validate_provider(&config.provider).await?;
    println!(
        "{}: OK (utility: {})",
        info.title,
        info.utility.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
