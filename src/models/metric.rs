use serde::{Deserialize, Deserializer, Serialize};

/// A metric definition. The name is both the identity and the URL key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<MetricAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_max: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_units_long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_units_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_stacked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<bool>,
}

impl MetricAttributes {
    pub fn is_empty(&self) -> bool {
        *self == MetricAttributes::default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

/// Display bounds come back as numbers even though they are written as strings.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }),
    )
}
