//! Intake pipeline for non-control-plane requests
//!
//! Buffers the body once, runs the matcher, and dispatches by the matched
//! record's protocol. Unmatched requests fall through to the proxy when
//! one is configured, else 404. Every outcome is traced.

use crate::sse;
use crate::state::AppState;
use crate::synthesizer;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use mocknest_core::{Protocol, RequestContext, RequestTrace};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, warn};

/// Catch-all handler behind the control-plane routes
pub(crate) async fn handle_any(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let start = Instant::now();
    let (mut parts, body) = req.into_parts();

    let method = parts.method.as_str().to_uppercase();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().unwrap_or_default().to_string();
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| path.clone());
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).to_string(),
            )
        })
        .collect();

    // The body is read exactly once; everything downstream (matcher,
    // proxy, recorder, templates) uses this buffer.
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to read request body: {}", e);
            let ctx = RequestContext {
                method,
                uri,
                path,
                query,
                headers,
                body: String::new(),
                remote_addr: addr.to_string(),
            };
            trace(&state, &ctx, 500, None, start);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read body");
        }
    };

    let ctx = RequestContext {
        method,
        uri,
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body_bytes).to_string(),
        remote_addr: addr.to_string(),
    };

    let outcome = state.matcher.find(&ctx).await;

    let Some(outcome) = outcome else {
        return no_match(&state, ctx, start).await;
    };

    match outcome.record.protocol {
        Protocol::Http => synthesizer::synthesize(&state, outcome, &ctx, start).await,
        Protocol::Sse => sse::respond(&state, outcome, &ctx, start).await,
        Protocol::Websocket => {
            let spec = match outcome.record.websocket.clone() {
                Some(spec) => spec,
                None => {
                    // Load-time validation makes this unreachable in practice.
                    trace(&state, &ctx, 500, Some(outcome.record.name.clone()), start);
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "websocket mock has no websocket section",
                    );
                }
            };

            let permit = state
                .gauge
                .try_acquire(&outcome.record.name, spec.max_connections);
            if permit.is_none() {
                debug!(mock = %outcome.record.name, "refusing upgrade: connection cap reached");
                trace(&state, &ctx, 503, Some(outcome.record.name.clone()), start);
                return error_response(StatusCode::SERVICE_UNAVAILABLE, "connection limit reached");
            }

            let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                Ok(upgrade) => upgrade,
                Err(rejection) => {
                    let response = rejection.into_response();
                    trace(
                        &state,
                        &ctx,
                        response.status().as_u16(),
                        Some(outcome.record.name.clone()),
                        start,
                    );
                    return response;
                }
            };

            trace(&state, &ctx, 101, Some(outcome.record.name.clone()), start);
            let scripts = state.scripts.clone();
            let hub = state.hub.clone();
            let req_ctx = ctx.clone();
            upgrade.on_upgrade(move |socket| {
                mocknest_ws::handle_socket(socket, spec, req_ctx, scripts, hub, permit)
            })
        }
    }
}

async fn no_match(state: &AppState, ctx: RequestContext, start: Instant) -> Response {
    if let Some(proxy) = state.proxy.clone() {
        match proxy.forward(&ctx).await {
            Ok(upstream) => {
                trace(state, &ctx, upstream.status, None, start);
                let mut builder = Response::builder()
                    .status(StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY));
                for (key, value) in &upstream.headers {
                    // The body is fully buffered; framing headers no longer apply.
                    if matches!(
                        key.to_lowercase().as_str(),
                        "transfer-encoding" | "connection" | "content-length"
                    ) {
                        continue;
                    }
                    builder = builder.header(key.as_str(), value.as_str());
                }
                return builder
                    .body(Body::from(upstream.body))
                    .unwrap_or_else(|_| {
                        error_response(StatusCode::BAD_GATEWAY, "invalid upstream response")
                    });
            }
            Err(e) => {
                warn!("proxy forward failed: {}", e);
                trace(state, &ctx, 502, None, start);
                return error_response(StatusCode::BAD_GATEWAY, "upstream unreachable");
            }
        }
    }

    trace(state, &ctx, 404, None, start);
    error_response(StatusCode::NOT_FOUND, "no mock matched")
}

/// Append one entry to the trace ring
pub(crate) fn trace(
    state: &AppState,
    ctx: &RequestContext,
    status: u16,
    matched: Option<String>,
    start: Instant,
) {
    state.tracer.push(RequestTrace {
        timestamp: Utc::now(),
        method: ctx.method.clone(),
        uri: ctx.uri.clone(),
        status,
        matched,
        duration_ms: start.elapsed().as_millis() as u64,
    });
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [("content-type", "application/json")],
        json!({"error": message}).to_string(),
    )
        .into_response()
}
