//! Server-Sent Events streams for matched SSE records
//!
//! Event-list streams follow the record's `once`/`cycle` mode with
//! per-event delays, a global interval and an optional total cap.
//! Scripted streams replay the actions the script recorded in the host.
//! Wire form per event is `event:` / `id:` / `retry:` / `data:` lines in
//! that order with empty lines omitted; keep-alives are `:`-comments.

use crate::handler::trace;
use crate::state::AppState;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, BoxStream, StreamExt};
use mocknest_core::templating;
use mocknest_core::{MatchOutcome, RequestContext, SseMode, SseSpec, StreamAction};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

pub(crate) async fn respond(
    state: &AppState,
    outcome: MatchOutcome,
    ctx: &RequestContext,
    start: Instant,
) -> Response {
    let spec = match outcome.record.sse.clone() {
        Some(spec) => spec,
        None => {
            trace(state, ctx, 500, Some(outcome.record.name.clone()), start);
            return crate::handler::error_response(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "sse mock has no sse section",
            );
        }
    };

    trace(state, ctx, 200, Some(outcome.record.name.clone()), start);

    let stream = match spec.mode {
        SseMode::Javascript => scripted_stream(state, &spec, ctx).await,
        SseMode::Once | SseMode::Cycle => list_stream(&spec, ctx),
    };

    let sse = Sse::new(stream);
    if spec.keep_alive_ms > 0 {
        sse.keep_alive(
            KeepAlive::new()
                .interval(Duration::from_millis(spec.keep_alive_ms))
                .text("keep-alive"),
        )
        .into_response()
    } else {
        sse.into_response()
    }
}

struct RenderedEvent {
    event: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
    data: String,
    delay_ms: u64,
}

struct ListState {
    events: Arc<Vec<RenderedEvent>>,
    cycle: bool,
    interval_ms: u64,
    close_after: usize,
    retry: Option<u64>,
    index: usize,
    emitted: usize,
    preamble_sent: bool,
}

fn list_stream(spec: &SseSpec, ctx: &RequestContext) -> EventStream {
    let render_ctx = ctx.render_context();
    let events: Vec<RenderedEvent> = spec
        .events
        .iter()
        .map(|event| RenderedEvent {
            event: event.event.clone().filter(|e| !e.is_empty()),
            id: event.id.clone().filter(|i| !i.is_empty()),
            retry: event.retry,
            data: templating::render(&event.data, &render_ctx).unwrap_or_else(|e| {
                warn!("sse data template failed: {}; using raw data", e);
                event.data.clone()
            }),
            delay_ms: event.delay_ms,
        })
        .collect();

    let state = ListState {
        events: Arc::new(events),
        cycle: spec.mode == SseMode::Cycle,
        interval_ms: spec.interval_ms,
        close_after: spec.close_after,
        retry: spec.retry,
        index: 0,
        emitted: 0,
        preamble_sent: false,
    };

    stream::unfold(state, |mut st| async move {
        if !st.preamble_sent {
            st.preamble_sent = true;
            if let Some(retry) = st.retry {
                let event = Event::default().retry(Duration::from_millis(retry));
                return Some((Ok(event), st));
            }
        }
        if st.events.is_empty() {
            return None;
        }
        if st.close_after > 0 && st.emitted >= st.close_after {
            return None;
        }
        if st.index >= st.events.len() {
            if !st.cycle {
                return None;
            }
            st.index = 0;
        }
        if st.emitted > 0 && st.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(st.interval_ms)).await;
        }

        let spec = &st.events[st.index];
        if spec.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(spec.delay_ms)).await;
        }

        // Builder call order is wire order: event, id, retry, data.
        let mut event = Event::default();
        if let Some(name) = &spec.event {
            event = event.event(name);
        }
        if let Some(id) = &spec.id {
            event = event.id(id);
        }
        if let Some(retry) = spec.retry {
            event = event.retry(Duration::from_millis(retry));
        }
        event = event.data(&spec.data);

        st.index += 1;
        st.emitted += 1;
        Some((Ok(event), st))
    })
    .boxed()
}

async fn scripted_stream(state: &AppState, spec: &SseSpec, ctx: &RequestContext) -> EventStream {
    let script = spec.javascript.clone().unwrap_or_default();
    let actions = match state.scripts.run_sse(&script, ctx.script_value()).await {
        Ok(actions) => actions,
        Err(e) => {
            warn!("sse script failed: {}", e);
            vec![
                StreamAction::SendEvent {
                    event: "error".to_string(),
                    data: e.to_string(),
                },
                StreamAction::Close,
            ]
        }
    };

    let close_after = spec.close_after;
    let queue: VecDeque<StreamAction> = actions.into();
    stream::unfold((queue, 0usize), move |(mut queue, emitted)| async move {
        loop {
            if close_after > 0 && emitted >= close_after {
                return None;
            }
            match queue.pop_front() {
                None | Some(StreamAction::Close) => return None,
                Some(StreamAction::Sleep(ms)) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                Some(StreamAction::Send(data)) => {
                    let event = Event::default().data(data);
                    return Some((Ok(event), (queue, emitted + 1)));
                }
                Some(StreamAction::SendEvent { event, data }) => {
                    let event = Event::default().event(event).data(data);
                    return Some((Ok(event), (queue, emitted + 1)));
                }
            }
        }
    })
    .boxed()
}
