//! Schema-guided conversion between JSON documents and bag fields.

use serde_json::{Map, Value as Json};

use super::{Block, Fields, Kind, Schema, Value};
use crate::error::ShapeError;

/// Converts a JSON object into bag fields. `null` members count as absent.
pub fn fields_from_json(schema: &Schema, object: &Map<String, Json>) -> Result<Fields, ShapeError> {
    from_object(schema, "", object)
}

fn from_object(schema: &Schema, prefix: &str, object: &Map<String, Json>) -> Result<Block, ShapeError> {
    let mut fields = Fields::new();
    for (name, json) in object {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        if json.is_null() {
            continue;
        }
        let field = schema
            .field(name)
            .ok_or_else(|| ShapeError::UnknownField(path.clone()))?;
        fields.insert(name.clone(), from_json(field.kind, &path, json)?);
    }
    Ok(fields)
}

fn mismatch(kind: Kind, path: &str, json: &Json) -> ShapeError {
    ShapeError::Mismatch {
        field: path.to_string(),
        expected: kind.name(),
        found: match json {
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
        },
    }
}

/// Set members may be written as numbers (service ids usually are).
fn scalar_string(json: &Json) -> Option<String> {
    match json {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn from_json(kind: Kind, path: &str, json: &Json) -> Result<Value, ShapeError> {
    let value = match (kind, json) {
        (Kind::Bool, Json::Bool(b)) => Value::Bool(*b),
        (Kind::Int, Json::Number(n)) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => {
                return Err(ShapeError::Coerce {
                    field: path.to_string(),
                    value: n.to_string(),
                    target: "int",
                });
            }
        },
        (Kind::Float, Json::Number(n)) => match n.as_f64() {
            Some(f) => Value::Float(f),
            None => return Err(mismatch(kind, path, json)),
        },
        (Kind::String, Json::String(s)) => Value::String(s.clone()),
        (Kind::StringSet, Json::Array(items)) => Value::Set(
            items
                .iter()
                .map(|item| scalar_string(item).ok_or_else(|| mismatch(kind, path, item)))
                .collect::<Result<_, _>>()?,
        ),
        (Kind::StringMap, Json::Object(entries)) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| match v {
                    Json::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(mismatch(kind, &format!("{path}.{k}"), other)),
                })
                .collect::<Result<_, _>>()?,
        ),
        // A single object is accepted where a one-element block list is expected.
        (Kind::Blocks(schema), Json::Object(object)) => Value::Blocks(vec![from_object(schema, path, object)?]),
        (Kind::Blocks(schema), Json::Array(items)) => Value::Blocks(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Json::Object(object) => from_object(schema, &format!("{path}.{i}"), object),
                    other => Err(mismatch(kind, &format!("{path}.{i}"), other)),
                })
                .collect::<Result<_, _>>()?,
        ),
        _ => return Err(mismatch(kind, path, json)),
    };
    Ok(value)
}

pub fn fields_to_json(fields: &Fields) -> Json {
    Json::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect(),
    )
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Set(items) => Json::Array(items.iter().cloned().map(Json::String).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                .collect(),
        ),
        Value::Blocks(blocks) => Json::Array(blocks.iter().map(fields_to_json).collect()),
    }
}
