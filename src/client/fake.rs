//! In-memory stand-in for the remote API, used by reconciler tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use super::{ApiError, LibratoApi};
use crate::models::alert::{Alert, AlertAttributes};
use crate::models::metric::Metric;
use crate::models::service::Service;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetAlert(u64),
    CreateAlert(Alert),
    UpdateAlert(u64, Alert),
    DeleteAlert(u64),
    GetMetric(String),
    UpdateMetric(Metric),
    DeleteMetric(String),
    GetService(u64),
    CreateService(Service),
    UpdateService(u64, Service),
    DeleteService(u64),
}

impl Call {
    pub fn is_get(&self) -> bool {
        matches!(self, Call::GetAlert(_) | Call::GetMetric(_) | Call::GetService(_))
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    alerts: BTreeMap<u64, Alert>,
    metrics: BTreeMap<String, Metric>,
    services: BTreeMap<u64, Service>,
    calls: Vec<Call>,
    /// The next N gets report 404 whether or not the record exists.
    missing_gets: u32,
    /// Per-get visibility, consumed in order before `missing_gets` applies;
    /// `false` is a 404.
    scripted_gets: VecDeque<bool>,
    get_failure: Option<StatusCode>,
    write_failure: Option<StatusCode>,
    /// Deletes succeed but the record stays visible.
    sticky_deletes: bool,
}

pub struct FakeLibrato {
    inner: Mutex<Inner>,
}

impl Default for FakeLibrato {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! replace_present {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $( if $src.$field.is_some() { $dst.$field = $src.$field.clone(); } )+
    };
}

fn not_found() -> ApiError {
    ApiError::status(StatusCode::NOT_FOUND, r#"{"errors":{"params":{"id":["not found"]}}}"#)
}

impl FakeLibrato {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn with_next_id(self, id: u64) -> Self {
        self.inner.lock().unwrap().next_id = id;
        self
    }

    pub fn insert_alert(&self, alert: Alert) {
        let id = alert.id.expect("seeded alert needs an id");
        self.inner.lock().unwrap().alerts.insert(id, alert);
    }

    pub fn insert_metric(&self, metric: Metric) {
        let name = metric.name.clone().expect("seeded metric needs a name");
        self.inner.lock().unwrap().metrics.insert(name, metric);
    }

    pub fn insert_service(&self, service: Service) {
        let id = service.id.expect("seeded service needs an id");
        self.inner.lock().unwrap().services.insert(id, service);
    }

    pub fn alert(&self, id: u64) -> Option<Alert> {
        self.inner.lock().unwrap().alerts.get(&id).cloned()
    }

    pub fn metric(&self, name: &str) -> Option<Metric> {
        self.inner.lock().unwrap().metrics.get(name).cloned()
    }

    pub fn service(&self, id: u64) -> Option<Service> {
        self.inner.lock().unwrap().services.get(&id).cloned()
    }

    pub fn miss_next_gets(&self, n: u32) {
        self.inner.lock().unwrap().missing_gets = n;
    }

    pub fn script_gets(&self, visible: &[bool]) {
        self.inner.lock().unwrap().scripted_gets = visible.iter().copied().collect();
    }

    pub fn fail_gets_with(&self, status: StatusCode) {
        self.inner.lock().unwrap().get_failure = Some(status);
    }

    pub fn fail_writes_with(&self, status: StatusCode) {
        self.inner.lock().unwrap().write_failure = Some(status);
    }

    pub fn keep_deleted_records(&self) {
        self.inner.lock().unwrap().sticky_deletes = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Runs the shared get bookkeeping; `Err` means the scripted failure applies.
    fn before_get(inner: &mut Inner, call: Call) -> Result<(), ApiError> {
        inner.calls.push(call);
        if let Some(status) = inner.get_failure {
            return Err(ApiError::status(status, "scripted failure"));
        }
        if let Some(visible) = inner.scripted_gets.pop_front() {
            return if visible { Ok(()) } else { Err(not_found()) };
        }
        if inner.missing_gets > 0 {
            inner.missing_gets -= 1;
            return Err(not_found());
        }
        Ok(())
    }

    fn before_write(inner: &mut Inner, call: Call) -> Result<(), ApiError> {
        inner.calls.push(call);
        match inner.write_failure {
            Some(status) => Err(ApiError::status(status, "scripted failure")),
            None => Ok(()),
        }
    }
}

/// The server clears the runbook URL when it is sent empty.
fn stored_attributes(attrs: &Option<AlertAttributes>) -> Option<AlertAttributes> {
    attrs.as_ref().map(|a| AlertAttributes {
        runbook_url: a.runbook_url.clone().filter(|url| !url.is_empty()),
    })
}

#[async_trait]
impl LibratoApi for FakeLibrato {
    async fn get_alert(&self, id: u64) -> Result<Alert, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_get(&mut inner, Call::GetAlert(id))?;
        inner.alerts.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_alert(&self, alert: &Alert) -> Result<Alert, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::CreateAlert(alert.clone()))?;
        let id = inner.next_id;
        inner.next_id += 1;
        let mut stored = alert.clone();
        stored.id = Some(id);
        stored.attributes = stored_attributes(&alert.attributes);
        inner.alerts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_alert(&self, id: u64, alert: &Alert) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::UpdateAlert(id, alert.clone()))?;
        let stored = inner.alerts.get_mut(&id).ok_or_else(not_found)?;
        replace_present!(
            stored,
            alert,
            name,
            description,
            active,
            md,
            rearm_seconds,
            services,
            conditions
        );
        if alert.attributes.is_some() {
            stored.attributes = stored_attributes(&alert.attributes);
        }
        Ok(())
    }

    async fn delete_alert(&self, id: u64) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::DeleteAlert(id))?;
        if !inner.alerts.contains_key(&id) {
            return Err(not_found());
        }
        if !inner.sticky_deletes {
            inner.alerts.remove(&id);
        }
        Ok(())
    }

    async fn get_metric(&self, name: &str) -> Result<Metric, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_get(&mut inner, Call::GetMetric(name.to_string()))?;
        inner.metrics.get(name).cloned().ok_or_else(not_found)
    }

    async fn update_metric(&self, metric: &Metric) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::UpdateMetric(metric.clone()))?;
        let name = metric
            .name
            .clone()
            .ok_or_else(|| ApiError::status(StatusCode::BAD_REQUEST, "name is required"))?;
        let stored = inner.metrics.entry(name).or_default();
        replace_present!(
            stored,
            metric,
            name,
            metric_type,
            display_name,
            description,
            period,
            composite
        );
        if let Some(attrs) = &metric.attributes {
            stored.attributes = (!attrs.is_empty()).then(|| attrs.clone());
        }
        Ok(())
    }

    async fn delete_metric(&self, name: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::DeleteMetric(name.to_string()))?;
        if !inner.metrics.contains_key(name) {
            return Err(not_found());
        }
        if !inner.sticky_deletes {
            inner.metrics.remove(name);
        }
        Ok(())
    }

    async fn get_service(&self, id: u64) -> Result<Service, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_get(&mut inner, Call::GetService(id))?;
        inner.services.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::CreateService(service.clone()))?;
        let id = inner.next_id;
        inner.next_id += 1;
        let mut stored = service.clone();
        stored.id = Some(id);
        inner.services.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_service(&self, id: u64, service: &Service) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::UpdateService(id, service.clone()))?;
        let stored = inner.services.get_mut(&id).ok_or_else(not_found)?;
        replace_present!(stored, service, service_type, title, settings);
        Ok(())
    }

    async fn delete_service(&self, id: u64) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        Self::before_write(&mut inner, Call::DeleteService(id))?;
        if !inner.services.contains_key(&id) {
            return Err(not_found());
        }
        if !inner.sticky_deletes {
            inner.services.remove(&id);
        }
        Ok(())
    }
}
