pub mod http;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::alert::Alert;
use crate::models::metric::Metric;
use crate::models::service::Service;

pub use http::HttpClient;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            ApiError::Decode(_) => None,
        }
    }

    /// 404 is the only status that means "the record does not exist".
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND)
    }
}

/// The remote monitoring API, one typed call per resource kind and verb.
#[async_trait]
pub trait LibratoApi: Send + Sync {
    async fn get_alert(&self, id: u64) -> Result<Alert, ApiError>;
    async fn create_alert(&self, alert: &Alert) -> Result<Alert, ApiError>;
    async fn update_alert(&self, id: u64, alert: &Alert) -> Result<(), ApiError>;
    async fn delete_alert(&self, id: u64) -> Result<(), ApiError>;

    async fn get_metric(&self, name: &str) -> Result<Metric, ApiError>;
    /// Creates or replaces the metric named by `metric.name`.
    async fn update_metric(&self, metric: &Metric) -> Result<(), ApiError>;
    async fn delete_metric(&self, name: &str) -> Result<(), ApiError>;

    async fn get_service(&self, id: u64) -> Result<Service, ApiError>;
    async fn create_service(&self, service: &Service) -> Result<Service, ApiError>;
    async fn update_service(&self, id: u64, service: &Service) -> Result<(), ApiError>;
    async fn delete_service(&self, id: u64) -> Result<(), ApiError>;
}
