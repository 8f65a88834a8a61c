use std::env;
use std::net::SocketAddr;

pub const DEFAULT_API_URL: &str = "https://rates.bherville.com";
pub const DEFAULT_INSTANCE_ID: &str = "default";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 3600;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub provider: String,
    pub instance_id: String,
    pub poll_interval_seconds: u64,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let api_url = lookup("RATES_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let provider = lookup("RATES_PROVIDER")
            .filter(|v| !v.trim().is_empty())
            .ok_or("RATES_PROVIDER is required")?;

        let instance_id = lookup("INSTANCE_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string());

        let poll_interval_seconds = match lookup("POLL_INTERVAL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| "POLL_INTERVAL_SECONDS must be a valid number")?,
            None => DEFAULT_POLL_INTERVAL_SECONDS,
        };
        if poll_interval_seconds == 0 {
            return Err("POLL_INTERVAL_SECONDS must be greater than zero".into());
        }

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| format!("Invalid BIND_ADDR: {}", bind_addr))?;

        Ok(Self {
            api_url,
            provider,
            instance_id,
            poll_interval_seconds,
            bind_addr,
        })
    }
}
