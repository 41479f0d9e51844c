use reqwest::Url;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::client::http::DEFAULT_BASE_URL;

/// Top-level config loaded from `librato.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub consistency: ConsistencyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    /// Upper bound for a single HTTP request to the API.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            email: String::new(),
            token: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Bounds for the waits that follow every remote write.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyConfig {
    /// How long a newly created record may stay invisible.
    #[serde(default = "default_60")]
    pub create_timeout_secs: u64,
    /// How long a deleted record may stay visible.
    #[serde(default = "default_60")]
    pub delete_timeout_secs: u64,
    /// Poll spacing for the create and delete waits.
    #[serde(default = "default_500")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_300")]
    pub update_timeout_secs: u64,
    #[serde(default = "default_2")]
    pub update_min_interval_secs: u64,
    /// Consecutive successful reads before an update counts as settled.
    #[serde(default = "default_5")]
    pub update_stable_reads: u32,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: 60,
            delete_timeout_secs: 60,
            poll_interval_ms: 500,
            update_timeout_secs: 300,
            update_min_interval_secs: 2,
            update_stable_reads: 5,
        }
    }
}

impl ConsistencyConfig {
    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn update_min_interval(&self) -> Duration {
        Duration::from_secs(self.update_min_interval_secs)
    }
}

fn default_60() -> u64 {
    60
}

fn default_500() -> u64 {
    500
}

fn default_300() -> u64 {
    300
}

fn default_2() -> u64 {
    2
}

fn default_5() -> u32 {
    5
}

impl ProviderConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: ProviderConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `LIBRATO_URL`, `LIBRATO_EMAIL`, `LIBRATO_TOKEN` and
    /// `LIBRATO_LISTEN` on top of the file values.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("LIBRATO_URL") {
            self.api.url = v;
        }
        if let Some(v) = var("LIBRATO_EMAIL") {
            self.api.email = v;
        }
        if let Some(v) = var("LIBRATO_TOKEN") {
            self.api.token = v;
        }
        if let Some(v) = var("LIBRATO_LISTEN") {
            self.server.listen = v;
        }
        self
    }

    /// Credentials are required; the base URL and listen address must parse.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.email.trim().is_empty() {
            anyhow::bail!("api.email (or LIBRATO_EMAIL) is required");
        }
        if self.api.token.trim().is_empty() {
            anyhow::bail!("api.token (or LIBRATO_TOKEN) is required");
        }
        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be positive");
        }
        self.base_url()?;
        self.listen_addr()?;
        Ok(())
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api.url).map_err(|e| anyhow::anyhow!("invalid api.url {:?}: {e}", self.api.url))
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid server.listen {:?}: {e}", self.server.listen))
    }
}
