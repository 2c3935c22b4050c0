//! Response synthesis for matched HTTP records
//!
//! Order is fixed: chaos gate, latency, headers, status, body, then the
//! side effects (trace, recording, callback). The chaos and 404/proxy
//! branches return whole responses, so a body is never produced before
//! its status.

use crate::callback;
use crate::handler::trace;
use crate::state::AppState;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use mocknest_core::latency::{apply_delay, effective_delay};
use mocknest_core::templating;
use mocknest_core::{MatchOutcome, RecordedExchange, RequestContext};
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;
use tracing::warn;

pub(crate) async fn synthesize(
    state: &AppState,
    outcome: MatchOutcome,
    ctx: &RequestContext,
    start: Instant,
) -> Response {
    let item = outcome.response;
    let mock_name = outcome.record.name.clone();

    if let Some(chaos) = &item.chaos {
        if chaos.should_fail() {
            let status = chaos.pick_error_code();
            let body = json!({
                "error": "injected failure",
                "mock": mock_name,
                "status": status,
            })
            .to_string();
            let headers = [("content-type".to_string(), "application/json".to_string())];
            trace(state, ctx, status, Some(format!("{} (chaos)", mock_name)), start);
            record(state, ctx, status, headers.iter().cloned(), &body);
            return (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                [("content-type", "application/json")],
                body,
            )
                .into_response();
        }
        if let Some(extra) = chaos.sample_latency() {
            apply_delay(extra).await;
        }
    }

    apply_delay(effective_delay(item.latency.as_ref(), item.delay)).await;

    let render_ctx = ctx.render_context();

    let mut headers: Vec<(String, String)> = Vec::with_capacity(item.headers.len());
    for (key, value) in &item.headers {
        let value = if item.header_templates {
            match templating::render(value, &render_ctx) {
                Ok(rendered) => rendered,
                Err(e) => {
                    warn!(mock = %mock_name, "header template failed: {}; using raw value", e);
                    value.clone()
                }
            }
        } else {
            value.clone()
        };
        headers.push((key.clone(), value));
    }

    let body = if item.template {
        match templating::render(&item.body, &render_ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(mock = %mock_name, "body template failed: {}; using raw body", e);
                item.body.clone()
            }
        }
    } else {
        item.body.clone()
    };

    trace(state, ctx, item.status_code, Some(mock_name.clone()), start);
    record(state, ctx, item.status_code, headers.iter().cloned(), &body);

    if let Some(spec) = item.callback.clone() {
        callback::dispatch(spec, render_ctx);
    }

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(item.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (key, value) in &headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder.body(Body::from(body)).unwrap_or_else(|e| {
        warn!(mock = %mock_name, "failed to assemble response: {}", e);
        crate::handler::error_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid mock response")
    })
}

fn record(
    state: &AppState,
    ctx: &RequestContext,
    status: u16,
    response_headers: impl Iterator<Item = (String, String)>,
    body: &str,
) {
    if !state.recorder.is_recording() {
        return;
    }
    state.recorder.record(RecordedExchange {
        timestamp: Utc::now(),
        method: ctx.method.clone(),
        uri: ctx.uri.clone(),
        path: ctx.path.clone(),
        request_headers: ctx.headers.iter().cloned().collect::<HashMap<_, _>>(),
        request_body: ctx.body.clone(),
        status,
        response_headers: response_headers.collect(),
        response_body: body.to_string(),
    });
}
