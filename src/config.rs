//! Remote store endpoint configuration.
//!
//! Configuration is read from the environment (a `.env` file is honored via
//! dotenvy). Two values are required: the store's base URL and the API key
//! the store expects on every request.

use anyhow::{Context, Result};

/// Environment variable holding the remote store base URL.
const ENV_STORE_URL: &str = "CARESYNC_STORE_URL";

/// Environment variable holding the remote store API key.
const ENV_STORE_KEY: &str = "CARESYNC_STORE_KEY";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the remote store, e.g. `https://project.example.co`.
    pub base_url: String,
    /// API key sent as both the `apikey` header and the bearer token.
    pub api_key: String,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let base_url = std::env::var(ENV_STORE_URL)
            .with_context(|| format!("{} is not set", ENV_STORE_URL))?;
        let api_key = std::env::var(ENV_STORE_KEY)
            .with_context(|| format!("{} is not set", ENV_STORE_KEY))?;

        Ok(Self::new(base_url, api_key))
    }

    /// REST endpoint for a table.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Websocket endpoint for the row-event channel.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, self.api_key)
    }
}
