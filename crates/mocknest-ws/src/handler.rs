//! Per-connection WebSocket loops
//!
//! One task per upgraded connection. Each mode checks for client
//! disconnect at every iteration; per-connection timers die with the task.

use crate::hub::{BroadcastHub, ConnectionPermit};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use mocknest_core::templating::{self, RenderContext};
use mocknest_core::{RequestContext, ScriptHost, StreamAction, WebSocketSpec, WsMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Close code sent when a connection script fails
const SCRIPT_ERROR_CLOSE: u16 = 1011;

/// Drive one upgraded connection according to the matched record's spec.
/// The permit (when present) releases the mock's connection slot on exit.
pub async fn handle_socket(
    mut socket: WebSocket,
    spec: WebSocketSpec,
    req: RequestContext,
    scripts: Arc<ScriptHost>,
    hub: Arc<BroadcastHub>,
    _permit: Option<ConnectionPermit>,
) {
    let render_ctx = req.render_context();
    match spec.mode {
        WsMode::Echo => echo_loop(&mut socket).await,
        WsMode::Sequence => sequence_loop(&mut socket, &spec, &render_ctx).await,
        WsMode::Broadcast => broadcast_loop(&mut socket, &spec, &hub).await,
        WsMode::Javascript => script_loop(&mut socket, &spec, &req, &scripts).await,
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn echo_loop(socket: &mut WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn sequence_loop(socket: &mut WebSocket, spec: &WebSocketSpec, ctx: &RenderContext) {
    if let Some(greeting) = spec.on_connect.as_deref() {
        if send_rendered(socket, greeting, ctx).await.is_err() {
            return;
        }
    }
    if spec.messages.is_empty() {
        // Nothing scheduled; hold the connection open until the peer goes.
        drain_until_close(socket).await;
        return;
    }

    let mut sent = 0usize;
    'stream: loop {
        for message in &spec.messages {
            if message.delay_ms > 0
                && wait_or_disconnect(socket, Duration::from_millis(message.delay_ms)).await
            {
                break 'stream;
            }
            if send_rendered(socket, &message.text, ctx).await.is_err() {
                break 'stream;
            }
            sent += 1;
            if spec.close_after > 0 && sent >= spec.close_after {
                break 'stream;
            }
            if spec.interval_ms > 0
                && wait_or_disconnect(socket, Duration::from_millis(spec.interval_ms)).await
            {
                break 'stream;
            }
        }
        if spec.close_after == 0 && spec.interval_ms == 0 && all_delays_zero(spec) {
            // An unbounded zero-delay schedule would spin; close instead.
            debug!("sequence loop has no pacing and no bound; closing");
            break 'stream;
        }
    }
}

fn all_delays_zero(spec: &WebSocketSpec) -> bool {
    spec.messages.iter().all(|m| m.delay_ms == 0)
}

async fn broadcast_loop(socket: &mut WebSocket, spec: &WebSocketSpec, hub: &Arc<BroadcastHub>) {
    let channel = spec.channel.clone().unwrap_or_else(|| "default".to_string());
    let mut feed = hub.subscribe(&channel);
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        hub.publish(&channel, text.to_string());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            outgoing = feed.recv() => {
                match outgoing {
                    Ok(message) => {
                        if socket.send(Message::Text(message.into())).await.is_err() {
                            break;
                        }
                    }
                    // Lagged subscribers just skip ahead.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, channel = %channel, "broadcast subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn script_loop(
    socket: &mut WebSocket,
    spec: &WebSocketSpec,
    req: &RequestContext,
    scripts: &Arc<ScriptHost>,
) {
    let script = match spec.javascript.as_deref() {
        Some(script) => script,
        None => {
            warn!("websocket mode is javascript but no script is configured");
            return;
        }
    };

    let session = scripts.next_session_id();
    let connect_actions = match scripts.ws_connect(session, script, req.script_value()).await {
        Ok(actions) => actions,
        Err(e) => {
            warn!("websocket script failed at connect: {}", e);
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: SCRIPT_ERROR_CLOSE,
                    reason: "script error".into(),
                })))
                .await;
            return;
        }
    };

    if replay(socket, connect_actions).await {
        scripts.ws_close(session);
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                match scripts.ws_message(session, text.as_str()).await {
                    Ok(actions) => {
                        if replay(socket, actions).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("websocket script failed on message: {}", e);
                        let _ = socket
                            .send(Message::Close(Some(CloseFrame {
                                code: SCRIPT_ERROR_CLOSE,
                                reason: "script error".into(),
                            })))
                            .await;
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    scripts.ws_close(session);
}

/// Replay recorded script actions onto the socket. Returns true when the
/// stream should end (close action or send failure).
async fn replay(socket: &mut WebSocket, actions: Vec<StreamAction>) -> bool {
    for action in actions {
        match action {
            StreamAction::Send(text) | StreamAction::SendEvent { data: text, .. } => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return true;
                }
            }
            StreamAction::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            StreamAction::Close => return true,
        }
    }
    false
}

async fn send_rendered(
    socket: &mut WebSocket,
    template: &str,
    ctx: &RenderContext,
) -> Result<(), axum::Error> {
    let text = match templating::render(template, ctx) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("websocket message template failed: {}; sending raw text", e);
            template.to_string()
        }
    };
    socket.send(Message::Text(text.into())).await
}

/// Sleep, but wake early when the peer disconnects. Returns true on
/// disconnect.
async fn wait_or_disconnect(socket: &mut WebSocket, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        incoming = socket.recv() => {
            !matches!(incoming, Some(Ok(message)) if !matches!(message, Message::Close(_)))
        }
    }
}

async fn drain_until_close(socket: &mut WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}
