//! Per-kind reconcilers and the expand/flatten converters they use.

pub mod alert;
pub mod metric;
pub mod service;

use crate::client::ApiError;
use crate::error::{Operation, ProviderError, ShapeError};
use crate::models::ResourceKind;
use crate::state::{Block, ResourceData, Value};
use crate::wait::{Observation, PollError};
use tokio::time::Instant;

/// Parses the numeric identifier the server assigned at creation.
pub(crate) fn numeric_id(kind: ResourceKind, d: &ResourceData) -> Result<u64, ProviderError> {
    let id = d
        .id()
        .ok_or_else(|| ProviderError::validation(kind, "missing identifier"))?;
    id.parse()
        .map_err(|_| ProviderError::validation(kind, format!("unparseable identifier {id:?}")))
}

/// Poll outcome for "the record is visible": 404 is retried, anything else aborts.
pub(crate) fn visible<T>(result: Result<T, ApiError>) -> Result<Observation<()>, PollError<ApiError>> {
    match result {
        Ok(_) => Ok(Observation::Done(())),
        Err(e) if e.is_not_found() => Err(PollError::Transient(e)),
        Err(e) => Err(PollError::Permanent(e)),
    }
}

/// Poll outcome for "the record is gone": a successful read is still pending.
pub(crate) fn gone<T>(result: Result<T, ApiError>) -> Result<Observation<()>, PollError<ApiError>> {
    match result {
        Ok(_) => Ok(Observation::Pending),
        Err(e) if e.is_not_found() => Ok(Observation::Done(())),
        Err(e) => Err(PollError::Permanent(e)),
    }
}

/// An update against a record that no longer exists is `NotFound`, not a remote failure.
pub(crate) fn update_error(kind: ResourceKind, id: String, e: ApiError) -> ProviderError {
    if e.is_not_found() {
        ProviderError::NotFound { kind, id }
    } else {
        ProviderError::remote(Operation::Update, kind, id, e)
    }
}

/// Runs after a create's closing read. A lagging 404 there would tombstone
/// the record just made; the id is restored and the create reported as not
/// yet propagated instead.
pub(crate) fn still_visible(
    kind: ResourceKind,
    d: &mut ResourceData,
    id: String,
    started: Instant,
) -> Result<(), ProviderError> {
    if d.id().is_some() {
        return Ok(());
    }
    tracing::warn!("{kind} {id} vanished right after it became visible");
    d.set_id(id.clone());
    Err(ProviderError::PropagationTimeout {
        kind,
        id,
        goal: "stay visible",
        elapsed: started.elapsed(),
    })
}

pub(crate) fn unsigned(field: &str, value: i64) -> Result<u64, ShapeError> {
    u64::try_from(value).map_err(|_| ShapeError::Coerce {
        field: field.to_string(),
        value: value.to_string(),
        target: "unsigned integer",
    })
}

pub(crate) fn int(value: u64) -> Value {
    Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

pub(crate) fn block_str(block: &Block, key: &str) -> Option<String> {
    block.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Like [`block_str`], but an empty string counts as unset.
pub(crate) fn block_non_empty(block: &Block, key: &str) -> Option<String> {
    block_str(block, key).filter(|s| !s.is_empty())
}
