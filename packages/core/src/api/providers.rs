use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ProviderOption {
    pub name: String,
    pub key: String,
}

/// Providers offered to the setup flow. Falls back to the built-in table
/// when the rate service cannot list them.
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderOption>> {
    let catalog = state.catalog_client.fetch_providers().await;
    Json(
        catalog
            .iter()
            .map(|(name, key)| ProviderOption {
                name: name.to_string(),
                key: key.to_string(),
            })
            .collect(),
    )
}
