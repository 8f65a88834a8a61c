use clap::{Parser, Subcommand};

use crate::config::Config;

/// Energy rates service CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "energy-rates",
    version,
    about = "Polls a utility rate service and publishes derived cost metrics"
)]
pub struct Cli {
    /// Rate service base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Provider key (e.g. cemc, nes)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Identifier of this configured instance
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Rate polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Address the HTTP adapter listens on
    #[arg(long)]
    pub bind: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll rates and serve the metric feed (default)
    Serve,
    /// List providers known to the rate service
    Providers,
    /// Check that the configured provider's rate document is reachable
    Check,
}

impl Cli {
    /// Load configuration from the environment, letting `--provider`
    /// stand in for a missing `RATES_PROVIDER`, then apply flag overrides.
    pub fn load_config(&self) -> Result<Config, String> {
        let mut config = Config::from_lookup(|key| match key {
            "RATES_PROVIDER" if self.provider.is_some() => self.provider.clone(),
            _ => std::env::var(key).ok(),
        })?;
        self.apply(&mut config)?;
        Ok(config)
    }

    /// Flags take precedence over environment values. Flag values are
    /// validated like their environment counterparts.
    pub fn apply(&self, config: &mut Config) -> Result<(), String> {
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.trim_end_matches('/').to_string();
        }
        if let Some(provider) = &self.provider {
            config.provider = provider.clone();
        }
        if let Some(instance_id) = &self.instance_id {
            config.instance_id = instance_id.clone();
        }
        if let Some(poll_interval) = self.poll_interval {
            if poll_interval == 0 {
                return Err("--poll-interval must be greater than zero".into());
            }
            config.poll_interval_seconds = poll_interval;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        Ok(())
    }
}
