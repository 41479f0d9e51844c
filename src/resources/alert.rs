use std::collections::BTreeSet;

use super::{
    block_non_empty, block_str, gone, int, numeric_id, still_visible, unsigned, update_error, visible,
};
use crate::error::{Operation, ProviderError, ShapeError};
use crate::models::ResourceKind;
use crate::models::alert::{Alert, AlertAttributes, AlertCondition, AlertConditionTag, ServiceRef};
use crate::provider::Provider;
use crate::state::{Block, DefaultValue, Field, Fields, Kind, ResourceData, Schema, Value};
use crate::wait;
use tokio::time::Instant;

const KIND: ResourceKind = ResourceKind::Alert;

/// Rearm interval the server applies when none is given. Reading it back
/// is treated as "not customized".
pub const DEFAULT_REARM_SECONDS: u64 = 600;

static TAG: Schema = Schema {
    fields: &[
        Field::required("name", Kind::String),
        Field::optional("grouped", Kind::Bool).with_default(DefaultValue::Bool(false)),
        Field::optional("values", Kind::StringSet),
    ],
};

static CONDITION: Schema = Schema {
    fields: &[
        Field::required("type", Kind::String),
        Field::required("metric_name", Kind::String),
        Field::optional("source", Kind::String),
        Field::optional("tag", Kind::Blocks(&TAG)),
        Field::optional("detect_reset", Kind::Bool),
        Field::optional("duration", Kind::Int),
        Field::optional("threshold", Kind::Float),
        Field::optional("summary_function", Kind::String),
    ],
};

static ATTRIBUTES: Schema = Schema {
    fields: &[Field::optional("runbook_url", Kind::String)],
};

pub static SCHEMA: Schema = Schema {
    fields: &[
        Field::required("name", Kind::String),
        Field::optional("description", Kind::String),
        Field::optional("active", Kind::Bool).with_default(DefaultValue::Bool(true)),
        Field::optional("md", Kind::Bool).with_default(DefaultValue::Bool(true)),
        Field::optional("rearm_seconds", Kind::Int).with_default(DefaultValue::Int(600)),
        Field::optional("services", Kind::StringSet),
        Field::optional("condition", Kind::Blocks(&CONDITION)),
        Field::optional("attributes", Kind::Blocks(&ATTRIBUTES)).max_items(1),
    ],
};

// Expanders

/// The payload for a create call: the required fields plus whatever the
/// user explicitly configured.
pub fn expand_alert(d: &ResourceData) -> Result<Alert, ShapeError> {
    let mut alert = Alert {
        name: Some(d.get_string("name")),
        active: Some(d.get_bool("active")),
        md: Some(d.get_bool("md")),
        ..Default::default()
    };

    if let Some(v) = d.get_ok("description").and_then(Value::as_str) {
        alert.description = Some(v.to_string());
    }
    if let Some(v) = d.get_ok("rearm_seconds").and_then(Value::as_int) {
        alert.rearm_seconds = Some(unsigned("rearm_seconds", v)?);
    }
    // An explicitly empty list is treated like an absent one.
    if let Some(v) = d.get_ok("services").and_then(Value::as_set).filter(|v| !v.is_empty()) {
        alert.services = Some(expand_services(v)?);
    }
    if let Some(v) = d.get_ok("condition").and_then(Value::as_blocks).filter(|v| !v.is_empty()) {
        alert.conditions = Some(v.iter().map(expand_condition).collect::<Result<_, _>>()?);
    }
    if let Some(v) = d.get_ok("attributes").and_then(Value::as_blocks) {
        alert.attributes = Some(expand_attributes(v));
    }
    Ok(alert)
}

/// The payload for an update call. Name and the two flags are always sent;
/// everything else only when it changed.
pub fn expand_alert_update(d: &ResourceData) -> Result<Alert, ShapeError> {
    let mut alert = Alert {
        name: Some(d.get_string("name")),
        active: Some(d.get_bool("active")),
        md: Some(d.get_bool("md")),
        ..Default::default()
    };

    if d.has_change("description") {
        alert.description = Some(d.get_string("description"));
    }
    if d.has_change("rearm_seconds") {
        alert.rearm_seconds = Some(unsigned("rearm_seconds", d.get_int("rearm_seconds"))?);
    }
    if d.has_change("services") {
        alert.services = Some(expand_services(&d.get_set("services"))?);
    }
    if d.has_change("condition") {
        alert.conditions = Some(
            d.get_blocks("condition")
                .iter()
                .map(expand_condition)
                .collect::<Result<_, _>>()?,
        );
    }
    if d.has_change("attributes") {
        let blocks = d.get_blocks("attributes");
        alert.attributes = Some(match blocks.first() {
            // An explicit empty runbook URL is what makes the server drop it.
            None => AlertAttributes {
                runbook_url: Some(String::new()),
            },
            Some(block) => AlertAttributes {
                runbook_url: block_non_empty(block, "runbook_url"),
            },
        });
    }
    Ok(alert)
}

pub fn expand_services(services: &BTreeSet<String>) -> Result<Vec<ServiceRef>, ShapeError> {
    services
        .iter()
        .map(|s| {
            s.parse().map(ServiceRef::id).map_err(|_| ShapeError::Coerce {
                field: "services".to_string(),
                value: s.clone(),
                target: "service id",
            })
        })
        .collect()
}

pub fn expand_condition(block: &Block) -> Result<AlertCondition, ShapeError> {
    let duration = match block.get("duration").and_then(Value::as_int) {
        Some(v) => Some(unsigned("condition.duration", v)?),
        None => None,
    };
    Ok(AlertCondition {
        condition_type: block_str(block, "type"),
        metric_name: block_non_empty(block, "metric_name"),
        source: block_non_empty(block, "source"),
        detect_reset: block.get("detect_reset").and_then(Value::as_bool),
        threshold: block
            .get("threshold")
            .and_then(Value::as_float)
            .filter(|t| !t.is_nan()),
        summary_function: block_str(block, "summary_function"),
        duration,
        tags: block
            .get("tag")
            .and_then(Value::as_blocks)
            .unwrap_or_default()
            .iter()
            .map(expand_tag)
            .collect(),
    })
}

fn expand_tag(block: &Block) -> AlertConditionTag {
    AlertConditionTag {
        name: block_str(block, "name"),
        grouped: block.get("grouped").and_then(Value::as_bool),
        values: block
            .get("values")
            .and_then(Value::as_set)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default(),
    }
}

/// An explicitly empty attributes list becomes an empty object, which
/// clears whatever the server holds.
pub fn expand_attributes(blocks: &[Block]) -> AlertAttributes {
    match blocks.first() {
        Some(block) => AlertAttributes {
            runbook_url: block_str(block, "runbook_url"),
        },
        None => AlertAttributes::default(),
    }
}

// Flatteners

pub fn flatten_alert(alert: &Alert) -> Fields {
    let mut fields = Fields::new();
    if let Some(name) = &alert.name {
        fields.insert("name".into(), Value::from(name.as_str()));
    }
    if let Some(description) = &alert.description {
        fields.insert("description".into(), Value::from(description.as_str()));
    }
    if let Some(active) = alert.active {
        fields.insert("active".into(), Value::Bool(active));
    }
    if let Some(md) = alert.md {
        fields.insert("md".into(), Value::Bool(md));
    }
    if let Some(rearm) = alert.rearm_seconds.filter(|r| *r != DEFAULT_REARM_SECONDS) {
        fields.insert("rearm_seconds".into(), int(rearm));
    }
    if let Some(services) = &alert.services {
        fields.insert(
            "services".into(),
            Value::Set(services.iter().map(|s| s.id.to_string()).collect()),
        );
    }
    if let Some(conditions) = alert.conditions.as_ref().filter(|c| !c.is_empty()) {
        fields.insert(
            "condition".into(),
            Value::Blocks(conditions.iter().map(flatten_condition).collect()),
        );
    }
    if let Some(attributes) = alert.attributes.as_ref().and_then(flatten_attributes) {
        fields.insert("attributes".into(), Value::Blocks(vec![attributes]));
    }
    fields
}

pub fn flatten_condition(condition: &AlertCondition) -> Block {
    let mut block = Block::new();
    if let Some(v) = &condition.condition_type {
        block.insert("type".into(), Value::from(v.as_str()));
    }
    if let Some(v) = &condition.metric_name {
        block.insert("metric_name".into(), Value::from(v.as_str()));
    }
    if let Some(v) = &condition.source {
        block.insert("source".into(), Value::from(v.as_str()));
    }
    if let Some(v) = condition.detect_reset {
        block.insert("detect_reset".into(), Value::Bool(v));
    }
    if let Some(v) = condition.threshold {
        block.insert("threshold".into(), Value::Float(v));
    }
    if let Some(v) = &condition.summary_function {
        block.insert("summary_function".into(), Value::from(v.as_str()));
    }
    if let Some(v) = condition.duration {
        block.insert("duration".into(), int(v));
    }
    if !condition.tags.is_empty() {
        block.insert(
            "tag".into(),
            Value::Blocks(condition.tags.iter().map(flatten_tag).collect()),
        );
    }
    block
}

fn flatten_tag(tag: &AlertConditionTag) -> Block {
    let mut block = Block::new();
    if let Some(v) = &tag.name {
        block.insert("name".into(), Value::from(v.as_str()));
    }
    if let Some(v) = tag.grouped {
        block.insert("grouped".into(), Value::Bool(v));
    }
    if !tag.values.is_empty() {
        block.insert("values".into(), Value::set(tag.values.iter().cloned()));
    }
    block
}

/// `None` when the server holds no attribute values at all.
fn flatten_attributes(attributes: &AlertAttributes) -> Option<Block> {
    let runbook_url = attributes.runbook_url.as_ref()?;
    Some(Block::from([(
        "runbook_url".to_string(),
        Value::from(runbook_url.as_str()),
    )]))
}

// Reconciler

pub async fn create(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let started = Instant::now();
    let client = provider.client();
    let alert = expand_alert(d).map_err(ProviderError::shape(KIND))?;
    let name = alert.name.clone().unwrap_or_default();

    tracing::info!("creating alert {name}: {alert:?}");
    let created = client
        .create_alert(&alert)
        .await
        .map_err(|e| ProviderError::remote(Operation::Create, KIND, &name, e))?;
    let id = created
        .id
        .ok_or_else(|| ProviderError::shape(KIND)(ShapeError::Missing("id".to_string())))?;
    // The alert exists remotely from here on, even if it never shows up in time.
    d.set_id(id.to_string());

    wait::until(&provider.waits().create, || async move {
        tracing::debug!("checking whether alert {id} is visible yet");
        visible(client.get_alert(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Create, KIND, id.to_string(), "become visible"))?;

    read(provider, d).await?;
    still_visible(KIND, d, id.to_string(), started)
}

pub async fn read(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let id = numeric_id(KIND, d)?;
    match provider.client().get_alert(id).await {
        Ok(alert) => {
            tracing::debug!("read alert {id}: {alert:?}");
            d.replace_state(flatten_alert(&alert))
                .map_err(ProviderError::shape(KIND))
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("alert {id} not found, removing from state");
            d.clear();
            Ok(())
        }
        Err(e) => Err(ProviderError::remote(Operation::Read, KIND, id.to_string(), e)),
    }
}

pub async fn update(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let id = numeric_id(KIND, d)?;
    let alert = expand_alert_update(d).map_err(ProviderError::shape(KIND))?;

    tracing::info!("updating alert {id}: {alert:?}");
    client
        .update_alert(id, &alert)
        .await
        .map_err(|e| update_error(KIND, id.to_string(), e))?;

    wait::until(&provider.waits().update, || async move {
        tracing::debug!("checking whether alert {id} has settled");
        visible(client.get_alert(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Update, KIND, id.to_string(), "settle"))?;

    read(provider, d).await
}

pub async fn delete(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let id = numeric_id(KIND, d)?;

    tracing::info!("deleting alert {id}");
    match client.delete_alert(id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::debug!("alert {id} was already gone");
            d.clear();
            return Ok(());
        }
        Err(e) => return Err(ProviderError::remote(Operation::Delete, KIND, id.to_string(), e)),
    }

    wait::until(&provider.waits().delete, || async move {
        tracing::debug!("checking whether alert {id} is gone");
        gone(client.get_alert(id).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Delete, KIND, id.to_string(), "disappear"))?;

    d.clear();
    Ok(())
}
