use axum::Json;
use serde_json::{json, Value};

/// Liveness only; never calls the remote API.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
