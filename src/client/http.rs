use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ApiError, LibratoApi};
use crate::models::alert::Alert;
use crate::models::metric::Metric;
use crate::models::service::Service;

pub const DEFAULT_BASE_URL: &str = "https://metrics-api.librato.com/v1/";

const USER_AGENT: &str = concat!("librato-provider/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed client for the Librato v1 API, authenticated with the
/// account email and an API token.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    email: String,
    token: String,
}

impl HttpClient {
    /// Every request is bounded by `timeout`, so a stalled connection
    /// surfaces as a transport error instead of hanging the caller.
    pub fn with_base_url(
        base_url: Url,
        email: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            email: email.into(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.email, Some(&self.token))
    }

    async fn execute(&self, req: RequestBuilder) -> Result<String, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::debug!("librato responded {status}: {body}");
            return Err(ApiError::status(status, body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.execute(self.request(Method::GET, path)).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn metric_path(name: &str) -> String {
    format!("metrics/{}", urlencoding::encode(name))
}

#[async_trait]
impl LibratoApi for HttpClient {
    async fn get_alert(&self, id: u64) -> Result<Alert, ApiError> {
        self.get_json(&format!("alerts/{id}")).await
    }

    async fn create_alert(&self, alert: &Alert) -> Result<Alert, ApiError> {
        let body = self
            .execute(self.request(Method::POST, "alerts").json(alert))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_alert(&self, id: u64, alert: &Alert) -> Result<(), ApiError> {
        self.execute(self.request(Method::PUT, &format!("alerts/{id}")).json(alert))
            .await?;
        Ok(())
    }

    async fn delete_alert(&self, id: u64) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, &format!("alerts/{id}")))
            .await?;
        Ok(())
    }

    async fn get_metric(&self, name: &str) -> Result<Metric, ApiError> {
        self.get_json(&metric_path(name)).await
    }

    async fn update_metric(&self, metric: &Metric) -> Result<(), ApiError> {
        let name = metric.name.as_deref().unwrap_or_default();
        self.execute(self.request(Method::PUT, &metric_path(name)).json(metric))
            .await?;
        Ok(())
    }

    async fn delete_metric(&self, name: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, &metric_path(name)))
            .await?;
        Ok(())
    }

    async fn get_service(&self, id: u64) -> Result<Service, ApiError> {
        self.get_json(&format!("services/{id}")).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service, ApiError> {
        let body = self
            .execute(self.request(Method::POST, "services").json(service))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_service(&self, id: u64, service: &Service) -> Result<(), ApiError> {
        self.execute(self.request(Method::PUT, &format!("services/{id}")).json(service))
            .await?;
        Ok(())
    }

    async fn delete_service(&self, id: u64) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, &format!("services/{id}")))
            .await?;
        Ok(())
    }
}
