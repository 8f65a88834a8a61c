#[cfg(test)]
pub(crate) mod mock_rates;
pub mod rates;

pub use rates::{ProviderInfo, RatesClient};
