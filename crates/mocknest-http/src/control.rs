//! Runtime control plane
//!
//! Reserved `/__*` endpoints that mutate recording, scenario and catalog
//! state while traffic is in flight. They sit in front of the catch-all
//! matcher and are unauthenticated by design: the server is a development
//! tool, not a gateway.

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

/// `/__recording/*` routes
pub(crate) fn recording_router() -> Router<AppState> {
    Router::new()
        .route("/start", post(recording_start))
        .route("/stop", post(recording_stop))
        .route("/clear", post(recording_clear))
        .route("/status", get(recording_status))
        .route("/list", get(recording_list))
        .route("/export", get(recording_export))
}

/// `/__scenario/*` routes
pub(crate) fn scenario_router() -> Router<AppState> {
    Router::new()
        .route("/list", get(scenario_list))
        .route("/active", get(scenario_active))
        .route("/set", post(scenario_set))
}

/// `/__traces` routes
pub(crate) fn traces_router() -> Router<AppState> {
    Router::new()
        .route("/", get(traces_list))
        .route("/clear", post(traces_clear))
}

/// `/__ws/*` routes
pub(crate) fn ws_router() -> Router<AppState> {
    Router::new().route("/broadcast", post(ws_broadcast))
}

async fn recording_start(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.recorder.start();
    info!("recording started");
    Json(json!({"recording": true}))
}

async fn recording_stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.recorder.stop();
    info!("recording stopped");
    Json(json!({"recording": false}))
}

async fn recording_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.recorder.clear();
    Json(json!({"cleared": true, "count": 0}))
}

async fn recording_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "recording": state.recorder.is_recording(),
        "count": state.recorder.count(),
    }))
}

async fn recording_list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let exchanges = state.recorder.list();
    Json(json!({
        "count": exchanges.len(),
        "recordings": exchanges,
    }))
}

/// Export captures as a catalog. `?group=uri` collapses same
/// `(method, path)` captures into one cycle-sequence mock — lossy on
/// request bodies, by design. `?format=yaml` downloads as a YAML
/// attachment; JSON is the default.
async fn recording_export(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let group_by_uri = params.get("group").map(|g| g == "uri").unwrap_or(false);
    let catalog = state.recorder.export(group_by_uri);

    let yaml = params
        .get("format")
        .map(|f| f == "yaml" || f == "yml")
        .unwrap_or(false);

    if yaml {
        match catalog.to_yaml() {
            Ok(body) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/x-yaml"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"mocks.yaml\"",
                    ),
                ],
                body,
            )
                .into_response(),
            Err(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    } else {
        match catalog.to_json() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

async fn scenario_list(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "scenarios": state.store.scenarios(),
        "active": state.scenario.active(),
    }))
}

async fn scenario_active(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"active": state.scenario.active()}))
}

/// `POST /__scenario/set?scenario=NAME`; the reserved name `all` clears
/// the filter.
async fn scenario_set(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(name) = params.get("scenario") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing 'scenario' query parameter"})),
        )
            .into_response();
    };
    if name == "all" {
        state.scenario.clear();
        info!("scenario filter cleared");
    } else {
        state.scenario.set(name.clone());
        info!("scenario set to '{}'", name);
    }
    Json(json!({"active": state.scenario.active()})).into_response()
}

async fn traces_list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let traces = state.tracer.list();
    Json(json!({
        "count": traces.len(),
        "traces": traces,
    }))
}

async fn traces_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.tracer.clear();
    Json(json!({"cleared": true}))
}

/// `POST /__ws/broadcast?channel=NAME` with the message as the raw body
async fn ws_broadcast(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let channel = params
        .get("channel")
        .cloned()
        .unwrap_or_else(|| "default".to_string());
    let delivered = state.hub.publish(&channel, body);
    Json(json!({"channel": channel, "delivered": delivered})).into_response()
}

/// `POST /__reload` re-runs the loader hook registered by the binary. On
/// failure the previous catalog stays in place.
pub(crate) async fn reload(State(state): State<AppState>) -> Response {
    let Some(reload) = state.reload.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "no reloadable catalog path configured"})),
        )
            .into_response();
    };
    match reload() {
        Ok(count) => {
            info!("catalog reloaded with {} mocks", count);
            Json(json!({"reloaded": true, "mocks": count})).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"reloaded": false, "error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /__health`
pub(crate) async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mocknest",
        "mocks": state.store.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
