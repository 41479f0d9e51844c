use std::collections::{BTreeMap, BTreeSet};

use super::{Block, Fields, Value};
use crate::error::ShapeError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    String,
    /// Unordered set of strings.
    StringSet,
    /// String to string map.
    StringMap,
    /// Ordered list of nested blocks.
    Blocks(&'static Schema),
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::StringSet => "set of strings",
            Kind::StringMap => "map of strings",
            Kind::Blocks(_) => "list of blocks",
        }
    }

    fn zero(&self) -> Value {
        match self {
            Kind::Bool => Value::Bool(false),
            Kind::Int => Value::Int(0),
            Kind::Float => Value::Float(0.0),
            Kind::String => Value::String(String::new()),
            Kind::StringSet => Value::Set(BTreeSet::new()),
            Kind::StringMap => Value::Map(BTreeMap::new()),
            Kind::Blocks(_) => Value::Blocks(Vec::new()),
        }
    }
}

/// Schema defaults are limited to scalars so they can live in statics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
}

impl From<DefaultValue> for Value {
    fn from(d: DefaultValue) -> Self {
        match d {
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => Value::Int(i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub max_items: Option<usize>,
}

impl Field {
    pub const fn required(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            max_items: None,
        }
    }

    pub const fn optional(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            max_items: None,
        }
    }

    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Value used when the field is absent: the default, else the kind's zero.
    pub fn fallback(&self) -> Value {
        match self.default {
            Some(d) => d.into(),
            None => self.kind.zero(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks every value against its field. With `require` set, required
    /// fields must be present too.
    pub fn check(&self, fields: &Fields, require: bool) -> Result<(), ShapeError> {
        self.check_at("", fields, require)
    }

    fn check_at(&self, prefix: &str, fields: &Fields, require: bool) -> Result<(), ShapeError> {
        for (name, value) in fields {
            let path = join(prefix, name);
            let field = self
                .field(name)
                .ok_or_else(|| ShapeError::UnknownField(path.clone()))?;
            check_value(field, &path, value, require)?;
        }
        if require {
            if let Some(missing) = self
                .fields
                .iter()
                .find(|f| f.required && !fields.contains_key(f.name))
            {
                return Err(ShapeError::Missing(join(prefix, missing.name)));
            }
        }
        Ok(())
    }

    pub fn check_field(&self, name: &str, value: &Value) -> Result<(), ShapeError> {
        let field = self
            .field(name)
            .ok_or_else(|| ShapeError::UnknownField(name.to_string()))?;
        check_value(field, name, value, false)
    }

    /// The value a field compares as: absent fields take their fallback and
    /// nested blocks have every sub-field filled in.
    pub fn normalize(&self, name: &str, value: Option<&Value>) -> Option<Value> {
        let field = self.field(name)?;
        Some(normalize_value(field, value))
    }

    fn normalize_block(&self, block: &Block) -> Block {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), normalize_value(f, block.get(f.name))))
            .collect()
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_value(field: &Field, path: &str, value: &Value, require: bool) -> Result<(), ShapeError> {
    let matches = matches!(
        (field.kind, value),
        (Kind::Bool, Value::Bool(_))
            | (Kind::Int, Value::Int(_))
            | (Kind::Float, Value::Float(_))
            | (Kind::String, Value::String(_))
            | (Kind::StringSet, Value::Set(_))
            | (Kind::StringMap, Value::Map(_))
            | (Kind::Blocks(_), Value::Blocks(_))
    );
    if !matches {
        return Err(ShapeError::Mismatch {
            field: path.to_string(),
            expected: field.kind.name(),
            found: value.type_name(),
        });
    }
    if let (Kind::Blocks(schema), Value::Blocks(blocks)) = (field.kind, value) {
        if let Some(max) = field.max_items {
            if blocks.len() > max {
                return Err(ShapeError::TooMany {
                    field: path.to_string(),
                    max,
                    found: blocks.len(),
                });
            }
        }
        for (i, block) in blocks.iter().enumerate() {
            schema.check_at(&format!("{path}.{i}"), block, require)?;
        }
    }
    Ok(())
}

fn normalize_value(field: &Field, value: Option<&Value>) -> Value {
    match (field.kind, value) {
        (_, None) => field.fallback(),
        (Kind::Float, Some(Value::Float(f))) if f.is_nan() => field.fallback(),
        (Kind::Blocks(schema), Some(Value::Blocks(blocks))) => {
            Value::Blocks(blocks.iter().map(|b| schema.normalize_block(b)).collect())
        }
        (_, Some(v)) => v.clone(),
    }
}
