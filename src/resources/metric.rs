use super::{block_non_empty, gone, int, still_visible, unsigned, update_error, visible};
use crate::error::{Operation, ProviderError, ShapeError};
use crate::models::ResourceKind;
use crate::models::metric::{Metric, MetricAttributes};
use crate::provider::Provider;
use crate::state::{Block, Field, Fields, Kind, ResourceData, Schema, Value};
use crate::wait;
use tokio::time::Instant;

const KIND: ResourceKind = ResourceKind::Metric;

static ATTRIBUTES: Schema = Schema {
    fields: &[
        Field::optional("color", Kind::String),
        Field::optional("display_max", Kind::String),
        Field::optional("display_min", Kind::String),
        Field::optional("display_units_long", Kind::String),
        Field::optional("display_units_short", Kind::String),
        Field::optional("display_stacked", Kind::Bool),
        Field::optional("gap_detection", Kind::Bool),
        Field::optional("aggregate", Kind::Bool),
    ],
};

pub static SCHEMA: Schema = Schema {
    fields: &[
        Field::required("name", Kind::String),
        Field::required("type", Kind::String),
        Field::optional("display_name", Kind::String),
        Field::optional("description", Kind::String),
        Field::optional("period", Kind::Int),
        Field::optional("composite", Kind::String),
        Field::optional("attributes", Kind::Blocks(&ATTRIBUTES)).max_items(1),
    ],
};

const ATTRIBUTE_STRINGS: [&str; 5] = [
    "color",
    "display_max",
    "display_min",
    "display_units_long",
    "display_units_short",
];

pub fn expand_metric(d: &ResourceData) -> Result<Metric, ShapeError> {
    let mut metric = Metric {
        name: Some(d.get_string("name")),
        metric_type: Some(d.get_string("type")),
        ..Default::default()
    };

    if let Some(v) = d.get_ok("display_name").and_then(Value::as_str) {
        metric.display_name = Some(v.to_string());
    }
    if let Some(v) = d.get_ok("description").and_then(Value::as_str) {
        metric.description = Some(v.to_string());
    }
    if let Some(v) = d.get_ok("period").and_then(Value::as_int) {
        metric.period = Some(unsigned("period", v)?);
    }
    if let Some(v) = d.get_ok("composite").and_then(Value::as_str) {
        metric.composite = Some(v.to_string());
    }
    // Anything but a single block is ignored on create.
    if let Some([block]) = d.get_ok("attributes").and_then(Value::as_blocks) {
        metric.attributes = Some(expand_attributes(block));
    }
    Ok(metric)
}

/// The update payload: the name always, the rest only when changed.
/// Changed attributes are always sent as a whole object, empty if the
/// block was removed, so the server drops what is no longer configured.
pub fn expand_metric_update(d: &ResourceData, name: &str) -> Result<Metric, ShapeError> {
    let mut metric = Metric {
        name: Some(name.to_string()),
        ..Default::default()
    };

    if d.has_change("type") {
        metric.metric_type = Some(d.get_string("type"));
    }
    if d.has_change("description") {
        metric.description = Some(d.get_string("description"));
    }
    if d.has_change("display_name") {
        metric.display_name = Some(d.get_string("display_name"));
    }
    if d.has_change("period") {
        metric.period = Some(unsigned("period", d.get_int("period"))?);
    }
    if d.has_change("composite") {
        metric.composite = Some(d.get_string("composite"));
    }
    if d.has_change("attributes") {
        metric.attributes = Some(match d.get_blocks("attributes").as_slice() {
            [block] => expand_attributes(block),
            _ => MetricAttributes::default(),
        });
    }
    Ok(metric)
}

/// Empty strings are left unset; booleans are copied whenever present.
pub fn expand_attributes(block: &Block) -> MetricAttributes {
    let flag = |key: &str| block.get(key).and_then(Value::as_bool);
    MetricAttributes {
        color: block_non_empty(block, "color"),
        display_max: block_non_empty(block, "display_max"),
        display_min: block_non_empty(block, "display_min"),
        display_units_long: block_non_empty(block, "display_units_long"),
        display_units_short: block_non_empty(block, "display_units_short"),
        display_stacked: flag("display_stacked"),
        gap_detection: flag("gap_detection"),
        aggregate: flag("aggregate"),
    }
}

pub fn flatten_metric(metric: &Metric) -> Fields {
    let mut fields = Fields::new();
    let strings = [
        ("name", &metric.name),
        ("type", &metric.metric_type),
        ("display_name", &metric.display_name),
        ("description", &metric.description),
        ("composite", &metric.composite),
    ];
    for (key, value) in strings {
        if let Some(v) = value {
            fields.insert(key.to_string(), Value::from(v.as_str()));
        }
    }
    if let Some(period) = metric.period {
        fields.insert("period".into(), int(period));
    }
    if let Some(block) = metric.attributes.as_ref().and_then(flatten_attributes) {
        fields.insert("attributes".into(), Value::Blocks(vec![block]));
    }
    fields
}

/// `None` when no attribute carries a value.
fn flatten_attributes(attributes: &MetricAttributes) -> Option<Block> {
    let strings = [
        &attributes.color,
        &attributes.display_max,
        &attributes.display_min,
        &attributes.display_units_long,
        &attributes.display_units_short,
    ];
    let flags = [
        ("display_stacked", attributes.display_stacked),
        ("gap_detection", attributes.gap_detection),
        ("aggregate", attributes.aggregate),
    ];

    let mut block = Block::new();
    for (key, value) in ATTRIBUTE_STRINGS.iter().zip(strings) {
        if let Some(v) = value {
            block.insert(key.to_string(), Value::from(v.as_str()));
        }
    }
    for (key, value) in flags {
        if let Some(v) = value {
            block.insert(key.to_string(), Value::Bool(v));
        }
    }
    (!block.is_empty()).then_some(block)
}

fn identity(d: &ResourceData) -> Result<String, ProviderError> {
    d.id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::validation(KIND, "missing identifier"))
}

pub async fn create(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let started = Instant::now();
    let client = provider.client();
    let metric = expand_metric(d).map_err(ProviderError::shape(KIND))?;
    let name = metric.name.clone().unwrap_or_default();
    if name.is_empty() {
        return Err(ProviderError::validation(KIND, "name must not be empty"));
    }

    tracing::info!("creating metric {name}: {metric:?}");
    client
        .update_metric(&metric)
        .await
        .map_err(|e| ProviderError::remote(Operation::Create, KIND, &name, e))?;
    d.set_id(name.clone());

    let poll_name = name.as_str();
    wait::until(&provider.waits().create, || async move {
        tracing::debug!("checking whether metric {poll_name} is visible yet");
        visible(client.get_metric(poll_name).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Create, KIND, &name, "become visible"))?;

    read(provider, d).await?;
    still_visible(KIND, d, name, started)
}

pub async fn read(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let name = identity(d)?;
    match provider.client().get_metric(&name).await {
        Ok(metric) => {
            tracing::debug!("read metric {name}: {metric:?}");
            d.replace_state(flatten_metric(&metric))
                .map_err(ProviderError::shape(KIND))
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("metric {name} not found, removing from state");
            d.clear();
            Ok(())
        }
        Err(e) => Err(ProviderError::remote(Operation::Read, KIND, name, e)),
    }
}

pub async fn update(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let name = identity(d)?;
    let configured = d.get_string("name");
    if configured != name {
        return Err(ProviderError::validation(
            KIND,
            format!("cannot rename {name:?} to {configured:?} in place; the metric must be replaced"),
        ));
    }
    let metric = expand_metric_update(d, &name).map_err(ProviderError::shape(KIND))?;

    tracing::info!("updating metric {name}: {metric:?}");
    client
        .update_metric(&metric)
        .await
        .map_err(|e| update_error(KIND, name.clone(), e))?;

    let poll_name = name.as_str();
    wait::until(&provider.waits().update, || async move {
        tracing::debug!("checking whether metric {poll_name} has settled");
        visible(client.get_metric(poll_name).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Update, KIND, &name, "settle"))?;

    read(provider, d).await
}

pub async fn delete(provider: &Provider, d: &mut ResourceData) -> Result<(), ProviderError> {
    let client = provider.client();
    let name = identity(d)?;

    tracing::info!("deleting metric {name}");
    match client.delete_metric(&name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::debug!("metric {name} was already gone");
            d.clear();
            return Ok(());
        }
        Err(e) => return Err(ProviderError::remote(Operation::Delete, KIND, name, e)),
    }

    let poll_name = name.as_str();
    wait::until(&provider.waits().delete, || async move {
        tracing::debug!("checking whether metric {poll_name} is gone");
        gone(client.get_metric(poll_name).await)
    })
    .await
    .map_err(|e| ProviderError::from_wait(e, Operation::Delete, KIND, &name, "disappear"))?;

    d.clear();
    Ok(())
}
