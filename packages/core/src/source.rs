//! Rate source interface.
//!
//! The coordinator and the manual trigger only talk to the remote service
//! through this trait, so tests can swap in a scripted source.

use async_trait::async_trait;

use crate::error::{NotifyError, RemoteError};
use crate::types::RatesPayload;

#[async_trait]
pub trait RateSource {
    /// Fetch the residential rate document for `provider`.
    async fn fetch_rates(&self, provider: &str) -> Result<RatesPayload, RemoteError>;

    /// Ask the remote service to regenerate its cached document for
    /// `provider`. Callers treat failure as advisory only.
    async fn request_remote_refresh(&self, provider: &str) -> Result<(), NotifyError>;

    /// Base URL of the remote service, for logging.
    fn base_url(&self) -> &str;
}
