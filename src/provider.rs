//! The provider object: one client handle and the wait policies, built once
//! at startup and passed by reference into every reconciler call.

use std::sync::Arc;

use crate::client::{HttpClient, LibratoApi};
use crate::config::{ConsistencyConfig, ProviderConfig};
use crate::error::ProviderError;
use crate::models::ResourceKind;
use crate::resources::{alert, metric, service};
use crate::state::{ResourceData, Schema};
use crate::wait::WaitPolicy;

/// Wait policies for the three kinds of remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Until a new record is visible.
    pub create: WaitPolicy,
    /// Until reads of an updated record are stable.
    pub update: WaitPolicy,
    /// Until a deleted record reads as not found.
    pub delete: WaitPolicy,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::from(&ConsistencyConfig::default())
    }
}

impl From<&ConsistencyConfig> for WaitSettings {
    fn from(c: &ConsistencyConfig) -> Self {
        Self {
            create: WaitPolicy::new(c.create_timeout(), c.poll_interval()),
            update: WaitPolicy::new(c.update_timeout(), c.update_min_interval())
                .consecutive(c.update_stable_reads),
            delete: WaitPolicy::new(c.delete_timeout(), c.poll_interval()),
        }
    }
}

pub struct Provider {
    client: Arc<dyn LibratoApi>,
    waits: WaitSettings,
}

impl Provider {
    pub fn new(client: Arc<dyn LibratoApi>, waits: WaitSettings) -> Self {
        Self { client, waits }
    }

    pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = HttpClient::with_base_url(
            config.base_url()?,
            &config.api.email,
            &config.api.token,
            config.api.request_timeout(),
        )?;
        tracing::info!("using librato api at {}", client.base_url());
        Ok(Self::new(Arc::new(client), WaitSettings::from(&config.consistency)))
    }

    pub fn client(&self) -> &dyn LibratoApi {
        self.client.as_ref()
    }

    pub fn waits(&self) -> &WaitSettings {
        &self.waits
    }

    pub fn schema(kind: ResourceKind) -> &'static Schema {
        match kind {
            ResourceKind::Alert => &alert::SCHEMA,
            ResourceKind::Metric => &metric::SCHEMA,
            ResourceKind::Service => &service::SCHEMA,
        }
    }

    pub async fn create(&self, kind: ResourceKind, d: &mut ResourceData) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Alert => alert::create(self, d).await,
            ResourceKind::Metric => metric::create(self, d).await,
            ResourceKind::Service => service::create(self, d).await,
        }
    }

    pub async fn read(&self, kind: ResourceKind, d: &mut ResourceData) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Alert => alert::read(self, d).await,
            ResourceKind::Metric => metric::read(self, d).await,
            ResourceKind::Service => service::read(self, d).await,
        }
    }

    pub async fn update(&self, kind: ResourceKind, d: &mut ResourceData) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Alert => alert::update(self, d).await,
            ResourceKind::Metric => metric::update(self, d).await,
            ResourceKind::Service => service::update(self, d).await,
        }
    }

    pub async fn delete(&self, kind: ResourceKind, d: &mut ResourceData) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Alert => alert::delete(self, d).await,
            ResourceKind::Metric => metric::delete(self, d).await,
            ResourceKind::Service => service::delete(self, d).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_waits_match_remote_propagation_bounds() {
        let waits = WaitSettings::default();
        assert_eq!(waits.create.timeout, Duration::from_secs(60));
        assert_eq!(waits.create.required_consecutive, 1);
        assert_eq!(waits.update.timeout, Duration::from_secs(300));
        assert_eq!(waits.update.min_interval, Duration::from_secs(2));
        assert_eq!(waits.update.required_consecutive, 5);
        assert_eq!(waits.delete.timeout, Duration::from_secs(60));
    }

    #[test]
    fn from_config_requires_credentials() {
        assert!(Provider::from_config(&ProviderConfig::default()).is_err());

        let config = ProviderConfig::default().with_overrides(|key| match key {
            "LIBRATO_EMAIL" | "LIBRATO_TOKEN" => Some("x".to_string()),
            _ => None,
        });
        assert!(Provider::from_config(&config).is_ok());
    }
}
