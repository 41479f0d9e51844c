use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub config: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub config: Map<String, Value>,
    /// State as last observed by the host.
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// A tombstone comes back as `id: null` with an empty state.
#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub id: Option<String>,
    pub state: Value,
}

/// Error body for a create whose remote write went through. The identity
/// is returned with it so the host can record the resource.
#[derive(Debug, Serialize)]
pub struct PartialCreateResponse {
    pub error: String,
    #[serde(flatten)]
    pub resource: ResourceResponse,
}
