//! The desired-state bag: one resource instance as configured by the user,
//! plus the state last observed from the remote API.

pub mod json;
pub mod schema;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ShapeError;
pub use schema::{DefaultValue, Field, Kind, Schema};

pub type Block = BTreeMap<String, Value>;
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Order and duplicates never matter.
    Set(BTreeSet<String>),
    Map(BTreeMap<String, String>),
    /// Nested sub-objects, in order.
    Blocks(Vec<Block>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Set(_) => "set of strings",
            Value::Map(_) => "map of strings",
            Value::Blocks(_) => "list of blocks",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[Block]> {
        match self {
            Value::Blocks(b) => Some(b),
            _ => None,
        }
    }

    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Builds a nested block from `(key, value)` pairs.
pub fn block<const N: usize>(pairs: [(&str, Value); N]) -> Block {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// One resource instance: its identity, the configuration the user asked
/// for, and the state last observed remotely.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: &'static Schema,
    id: Option<String>,
    config: Fields,
    state: Fields,
}

impl ResourceData {
    /// A bag for a new instance; the configuration must satisfy the schema.
    pub fn new(schema: &'static Schema, config: Fields) -> Result<Self, ShapeError> {
        schema.check(&config, true)?;
        Ok(Self {
            schema,
            id: None,
            config,
            state: Fields::new(),
        })
    }

    /// A bag that only knows its identity, as used for Read and Delete.
    pub fn existing(schema: &'static Schema, id: impl Into<String>) -> Self {
        Self {
            schema,
            id: Some(id.into()),
            config: Fields::new(),
            state: Fields::new(),
        }
    }

    /// Attaches the identity and last observed state of an existing instance.
    pub fn with_state(mut self, id: impl Into<String>, state: Fields) -> Result<Self, ShapeError> {
        self.schema.check(&state, false)?;
        self.id = Some(id.into());
        self.state = state;
        Ok(self)
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Logical tombstone: the instance no longer exists remotely.
    pub fn clear(&mut self) {
        self.id = None;
        self.state.clear();
    }

    pub fn config(&self) -> &Fields {
        &self.config
    }

    pub fn state(&self) -> &Fields {
        &self.state
    }

    /// Presence check: the field was explicitly set in configuration.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// The configured value, else the schema default, else the zero value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.config.get(key) {
            Some(v) => Some(v.clone()),
            None => self.schema.field(key).map(Field::fallback),
        }
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).and_then(|v| v.as_int()).unwrap_or_default()
    }

    pub fn get_float(&self, key: &str) -> f64 {
        self.get(key).and_then(|v| v.as_float()).unwrap_or_default()
    }

    pub fn get_set(&self, key: &str) -> BTreeSet<String> {
        match self.get(key) {
            Some(Value::Set(s)) => s,
            _ => BTreeSet::new(),
        }
    }

    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.get(key) {
            Some(Value::Map(m)) => m,
            _ => BTreeMap::new(),
        }
    }

    pub fn get_blocks(&self, key: &str) -> Vec<Block> {
        match self.get(key) {
            Some(Value::Blocks(b)) => b,
            _ => Vec::new(),
        }
    }

    /// Whether the configured value differs from the last observed one.
    pub fn has_change(&self, key: &str) -> bool {
        self.schema.normalize(key, self.config.get(key)) != self.schema.normalize(key, self.state.get(key))
    }

    /// Records an observed value.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ShapeError> {
        self.schema.check_field(key, &value)?;
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    /// Replaces the whole observed state, e.g. after a read.
    pub fn replace_state(&mut self, state: Fields) -> Result<(), ShapeError> {
        self.schema.check(&state, false)?;
        self.state = state;
        Ok(())
    }
}
