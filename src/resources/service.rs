use super::{gone, numeric_id, still_visible, update_error, visible};
use crate::error::{Operation, ProviderError, ShapeError};
use crate::models::ResourceKind;
use crate::models::service::Service;
use crate::provider::Provider;
use crate::state::{Field, Fields, Kind, ResourceData, Schema, Value};
use crate::wait;
use tokio::time::Instant;

const KIND: ResourceKind = ResourceKind::Service;

pub static SCHEMA: Schema = Schema {
    fields: &[
        Field::required("type", Kind::String),
        Field::required("title", Kind::String),
        Field::optional("settings", Kind::StringMap),
    ],
};

pub fn expand_service(d: &ResourceData) -> Service {
    Service {
        id: None,
        service_type: Some(d.get_string("type")),
        title: Some(d.get_string("title")),
        settings: d.get_ok("settings").and_then(Value::as_map).cloned(),
    }
}

/// Type and title are always resent; settings only when they changed, as a
/// full map.
pub fn expand_service_update(d: &ResourceData) -> Service {
    Service {
        id: None,
        service_type: Some(d.get_string("type")),
        title: Some(d.get_string("title")),
        settings: d.has_change("settings").then(|| d.get_map("settings")),
    }
}

pub fn flatten_service(service: &Service) -> Fields {
    let mut fields = Fields::new();
    if let Some(v) = &service.service_type {
        fields.insert("type".into(), Value::from(v.as_str()));
    }
    if let Some(v) = &service.title {
        fields.insert("title".into(), Value::from(v.as_str()));
    }
    if let Some(v) = service.settings.as_ref().filter(|s| !s.is_empty()) {
        fields.insert("settings".into(), Value::Map(v.clone()));
    }
    fields
}

pub async fn create(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let started = Instant::now();
    let client = provider.client();
    let service = expand_service(d);
    let title = d.get_string("title");

    tracing::info!("creating service {title}: {service:?}");
    let created = client
        .create_service(&service)
        .await
        .map_err(|e| ProviderError::remote(Operation::Create, KIND, &title, e))?;
    let id = created
        .id
        .ok_or_else(|| ProviderError::shape(KIND)(ShapeError::Missing("id".to_string())))?;
    d.set_id(id.to_string());

    wait::until(&provider.waits().create, || async move {
        tracing::debug!("checking whether service {id} is visible yet");
        visible(client.get_service(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Create, KIND, id.to_string(), "become visible"))?;

    read(provider, d).await?;
    still_visible(KIND, d, id.to_string(), started)
}

pub async fn read(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let id = numeric_id(KIND, d)?;
    match provider.client().get_service(id).await {
        Ok(service) => d
            .replace_state(flatten_service(&service))
            .map_err(ProviderError::shape(KIND)),
        Err(e) if e.is_not_found() => {
            tracing::warn!("service {id} not found, removing from state");
            d.clear();
            Ok(())
        }
        Err(e) => Err(ProviderError::remote(Operation::Read, KIND, id.to_string(), e)),
    }
}

pub async fn update(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let id = numeric_id(KIND, d)?;
    let service = expand_service_update(d);

    tracing::info!("updating service {id}: {service:?}");
    client
        .update_service(id, &service)
        .await
        .map_err(|e| update_error(KIND, id.to_string(), e))?;

    wait::until(&provider.waits().update, || async move {
        tracing::debug!("checking whether service {id} has settled");
        visible(client.get_service(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Update, KIND, id.to_string(), "settle"))?;

    read(provider, d).await
}

pub async fn delete(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let id = numeric_id(KIND, d)?;

    tracing::info!("deleting service {id}");
    match client.delete_service(id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            d.clear();
            return Ok(());
        }
        Err(e) => return Err(ProviderError::remote(Operation::Delete, KIND, id.to_string(), e)),
    }

    wait::until(&provider.waits().delete, || async move {
        gone(client.get_service(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Delete, KIND, id.to_string(), "disappear"))?;

    d.clear();
    Ok(())
}
