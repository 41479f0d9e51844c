use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::ProviderError;
use crate::models::ResourceKind;
use crate::models::rpc::{CreateRequest, PartialCreateResponse, ResourceResponse, UpdateRequest};
use crate::provider::Provider;
use crate::state::ResourceData;
use crate::state::json::{fields_from_json, fields_to_json};

type Rejection = (StatusCode, String);

fn parse_kind(raw: &str) -> Result<ResourceKind, Rejection> {
    raw.parse().map_err(|e: String| (StatusCode::BAD_REQUEST, e))
}

pub fn status_for(err: &ProviderError) -> StatusCode {
    match err {
        ProviderError::Validation { .. } | ProviderError::Shape { .. } => StatusCode::BAD_REQUEST,
        ProviderError::NotFound { .. } => StatusCode::NOT_FOUND,
        ProviderError::PropagationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ProviderError::CreateFailed { .. }
        | ProviderError::ReadFailed { .. }
        | ProviderError::UpdateFailed { .. }
        | ProviderError::DeleteFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn reject(err: ProviderError) -> Rejection {
    let status = status_for(&err);
    tracing::warn!("{status}: {err}");
    (status, err.to_string())
}

fn bad_request(err: impl std::fmt::Display) -> Rejection {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn resource(d: &ResourceData) -> ResourceResponse {
    ResourceResponse {
        id: d.id().map(str::to_string),
        state: fields_to_json(d.state()),
    }
}

fn respond(d: &ResourceData) -> Json<ResourceResponse> {
    Json(resource(d))
}

pub async fn create_resource(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, Response> {
    let kind = parse_kind(&kind).map_err(IntoResponse::into_response)?;
    let schema = Provider::schema(kind);
    let config = fields_from_json(schema, &req.config)
        .map_err(|e| bad_request(e).into_response())?;
    let mut d = ResourceData::new(schema, config).map_err(|e| bad_request(e).into_response())?;

    if let Err(err) = state.provider.create(kind, &mut d).await {
        let (status, message) = reject(err);
        // Once an id is assigned the remote record exists, so it goes back
        // to the host even though the create did not finish.
        return Err(match d.id() {
            Some(_) => (
                status,
                Json(PartialCreateResponse {
                    error: message,
                    resource: resource(&d),
                }),
            )
                .into_response(),
            None => (status, message).into_response(),
        });
    }
    Ok((StatusCode::CREATED, respond(&d)))
}

pub async fn read_resource(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let kind = parse_kind(&kind)?;
    let mut d = ResourceData::existing(Provider::schema(kind), id);

    state.provider.read(kind, &mut d).await.map_err(reject)?;
    Ok(respond(&d))
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(req): Json<UpdateRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let kind = parse_kind(&kind)?;
    let schema = Provider::schema(kind);
    let config = fields_from_json(schema, &req.config).map_err(bad_request)?;
    let observed = fields_from_json(schema, &req.state).map_err(bad_request)?;
    let mut d = ResourceData::new(schema, config)
        .and_then(|d| d.with_state(id, observed))
        .map_err(bad_request)?;

    state.provider.update(kind, &mut d).await.map_err(reject)?;
    Ok(respond(&d))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let kind = parse_kind(&kind)?;
    let mut d = ResourceData::existing(Provider::schema(kind), id);

    state.provider.delete(kind, &mut d).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::client::fake::FakeLibrato;
    use crate::models::alert::Alert;
    use crate::provider::WaitSettings;
    use axum::response::Response;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn app_state() -> (Arc<FakeLibrato>, AppState) {
        let fake = Arc::new(FakeLibrato::new().with_next_id(42));
        let provider = Provider::new(fake.clone(), WaitSettings::default());
        (
            fake,
            AppState {
                provider: Arc::new(provider),
            },
        )
    }

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn maps_errors_to_statuses() {
        let cases = [
            (ProviderError::validation(ResourceKind::Alert, "bad id"), StatusCode::BAD_REQUEST),
            (
                ProviderError::NotFound {
                    kind: ResourceKind::Alert,
                    id: "1".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ProviderError::PropagationTimeout {
                    kind: ResourceKind::Metric,
                    id: "cpu".to_string(),
                    goal: "settle",
                    elapsed: Duration::from_secs(300),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ProviderError::DeleteFailed {
                    kind: ResourceKind::Service,
                    id: "3".to_string(),
                    source: ApiError::status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_read_over_the_boundary() {
        let (_fake, state) = app_state();
        let req = CreateRequest {
            config: object(json!({"name": "cpu-high", "services": [7]})),
        };
        let Ok(created) = create_resource(State(state.clone()), Path("alerts".to_string()), Json(req)).await
        else {
            panic!("create failed");
        };
        let response = created.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = read_resource(State(state), Path(("alert".to_string(), "42".to_string())))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_kind_and_bad_config_are_bad_requests() {
        let (_fake, state) = app_state();
        let err = read_resource(State(state.clone()), Path(("dashboard".to_string(), "1".to_string())))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        for kind in ["space", "space_chart"] {
            let err = delete_resource(State(state.clone()), Path((kind.to_string(), "1".to_string())))
                .await
                .err()
                .unwrap();
            assert_eq!(err.0, StatusCode::BAD_REQUEST, "{kind}");
        }

        let req = CreateRequest {
            config: object(json!({"name": "cpu-high", "rearm_seconds": "soon"})),
        };
        let err = create_resource(State(state), Path("alert".to_string()), Json(req))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_still_returns_the_new_id() {
        let (fake, state) = app_state();
        fake.miss_next_gets(u32::MAX);
        let req = CreateRequest {
            config: object(json!({"name": "cpu-high"})),
        };
        let err = create_resource(State(state), Path("alert".to_string()), Json(req))
            .await
            .err()
            .unwrap();

        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(err).await;
        assert_eq!(body["id"], "42");
        assert!(body["error"].as_str().unwrap().contains("alert 42"));
        assert!(fake.alert(42).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_without_id_is_a_plain_error() {
        let (fake, state) = app_state();
        fake.fail_writes_with(StatusCode::UNPROCESSABLE_ENTITY);
        let req = CreateRequest {
            config: object(json!({"name": "cpu-high"})),
        };
        let err = create_resource(State(state), Path("alert".to_string()), Json(req))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_vanished_alert_is_404() {
        let (_fake, state) = app_state();
        let req = UpdateRequest {
            config: object(json!({"name": "cpu-high"})),
            state: object(json!({"name": "cpu-high"})),
        };
        let err = update_resource(State(state), Path(("alert".to_string(), "9".to_string())), Json(req))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_returns_no_content() {
        let (fake, state) = app_state();
        fake.insert_alert(Alert {
            id: Some(3),
            name: Some("old".to_string()),
            ..Default::default()
        });
        let response = delete_resource(State(state), Path(("alert".to_string(), "3".to_string())))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(fake.alert(3), None);
    }
}
