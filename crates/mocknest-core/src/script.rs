//! Embedded JavaScript host for match and streaming scripts
//!
//! One QuickJS runtime lives on a dedicated thread for the whole process.
//! Every evaluation goes through the job channel, which is the single
//! serialization point: no two scripts ever interleave, and the
//! `global` object created at thread start is visible to every script for
//! the lifetime of the process — across requests, mocks and catalog swaps.
//!
//! Streaming scripts (SSE/WebSocket modes) do not perform I/O themselves.
//! Their `sse.*` / `ws.*` / `sleep` calls record actions which the owning
//! connection task replays, so network writes and sleeps happen outside
//! the serialization point. `ws.on` handlers stay inside the runtime
//! (per-session persistent functions) and run once per incoming frame.

use crate::catalog::ResponseItem;
use crate::{Error, Result};
use rquickjs::{Context, Ctx, Function, Object, Persistent, Runtime};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

/// Upper bound for a single evaluation round-trip
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a matcher script
#[derive(Debug, Clone, Default)]
pub struct MatchVerdict {
    /// Whether the record matches the request
    pub matches: bool,
    /// Dynamic response overriding the static spec
    pub response: Option<ResponseItem>,
}

/// One recorded action of a streaming script, replayed by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAction {
    /// Send a data-only payload (WS text frame / SSE `data:` event)
    Send(String),
    /// Send a typed SSE event
    SendEvent {
        /// `event:` field
        event: String,
        /// `data:` payload
        data: String,
    },
    /// Pause before the next action, milliseconds
    Sleep(u64),
    /// End the stream
    Close,
}

enum Job {
    Eval {
        script: String,
        request: Value,
        reply: oneshot::Sender<Result<MatchVerdict>>,
    },
    SseRun {
        script: String,
        request: Value,
        reply: oneshot::Sender<Result<Vec<StreamAction>>>,
    },
    WsConnect {
        session: u64,
        script: String,
        request: Value,
        reply: oneshot::Sender<Result<Vec<StreamAction>>>,
    },
    WsMessage {
        session: u64,
        text: String,
        reply: oneshot::Sender<Result<Vec<StreamAction>>>,
    },
    WsClose {
        session: u64,
    },
}

/// Handle to the script runtime thread
pub struct ScriptHost {
    tx: mpsc::UnboundedSender<Job>,
    session_ids: AtomicU64,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    /// Spawn the runtime thread and return a handle to it
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("mocknest-script".to_string())
            .spawn(move || worker(rx))
            .expect("failed to spawn script host thread");
        Self {
            tx,
            session_ids: AtomicU64::new(1),
        }
    }

    /// Allocate an identifier for a scripted WebSocket connection
    pub fn next_session_id(&self) -> u64 {
        self.session_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Run a matcher script. The script's final expression is its verdict:
    /// `({matches: bool, response?: {status_code, headers, body, delay}})`.
    pub async fn eval_match(&self, script: &str, request: Value) -> Result<MatchVerdict> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Eval {
            script: script.to_string(),
            request,
            reply,
        })?;
        await_reply(rx).await
    }

    /// Run an SSE script and collect its recorded actions
    pub async fn run_sse(&self, script: &str, request: Value) -> Result<Vec<StreamAction>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::SseRun {
            script: script.to_string(),
            request,
            reply,
        })?;
        await_reply(rx).await
    }

    /// Run a WebSocket script at connect time; registers its `ws.on`
    /// handlers under `session` and returns the connect-phase actions
    pub async fn ws_connect(
        &self,
        session: u64,
        script: &str,
        request: Value,
    ) -> Result<Vec<StreamAction>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::WsConnect {
            session,
            script: script.to_string(),
            request,
            reply,
        })?;
        await_reply(rx).await
    }

    /// Deliver an incoming frame to the session's `message` handlers
    pub async fn ws_message(&self, session: u64, text: &str) -> Result<Vec<StreamAction>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::WsMessage {
            session,
            text: text.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    /// Drop the session's handlers (connection closed)
    pub fn ws_close(&self, session: u64) {
        let _ = self.tx.send(Job::WsClose { session });
    }

    fn submit(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| Error::script("script host thread is gone"))
    }
}

async fn await_reply<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
    match tokio::time::timeout(SCRIPT_TIMEOUT, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(Error::script("script host dropped the evaluation")),
        Err(_) => Err(Error::script(format!(
            "script evaluation timed out after {:?}",
            SCRIPT_TIMEOUT
        ))),
    }
}

struct WsSession {
    ws_obj: Persistent<Object<'static>>,
    sleep_fn: Persistent<Function<'static>>,
    handlers: Rc<RefCell<Vec<(String, Persistent<Function<'static>>)>>>,
    actions: Rc<RefCell<Vec<StreamAction>>>,
}

fn worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create JavaScript runtime: {}", e);
            drain_with_error(&mut rx);
            return;
        }
    };
    let context = match Context::full(&runtime) {
        Ok(context) => context,
        Err(e) => {
            error!("failed to create JavaScript context: {}", e);
            drain_with_error(&mut rx);
            return;
        }
    };

    // The persistent cross-script state. Created exactly once; catalog
    // swaps never touch it.
    context.with(|ctx| {
        if let Err(e) = ctx.eval::<(), _>("globalThis.global = {};") {
            error!("failed to initialize script global: {}", e);
        }
    });

    let mut sessions: HashMap<u64, WsSession> = HashMap::new();

    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Eval {
                script,
                request,
                reply,
            } => {
                let result = context.with(|ctx| eval_match_script(&ctx, &script, &request));
                let _ = reply.send(result);
            }
            Job::SseRun {
                script,
                request,
                reply,
            } => {
                let result = context.with(|ctx| run_sse_script(&ctx, &script, &request));
                let _ = reply.send(result);
            }
            Job::WsConnect {
                session,
                script,
                request,
                reply,
            } => {
                let result =
                    context.with(|ctx| connect_ws_script(&ctx, &script, &request, &mut sessions, session));
                let _ = reply.send(result);
            }
            Job::WsMessage {
                session,
                text,
                reply,
            } => {
                let result = context.with(|ctx| deliver_ws_message(&ctx, &mut sessions, session, &text));
                let _ = reply.send(result);
            }
            Job::WsClose { session } => {
                sessions.remove(&session);
            }
        }
    }
}

fn drain_with_error(rx: &mut mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Eval { reply, .. } => {
                let _ = reply.send(Err(Error::script("script runtime unavailable")));
            }
            Job::SseRun { reply, .. } | Job::WsConnect { reply, .. } | Job::WsMessage { reply, .. } => {
                let _ = reply.send(Err(Error::script("script runtime unavailable")));
            }
            Job::WsClose { .. } => {}
        }
    }
}

fn eval_match_script(ctx: &Ctx<'_>, script: &str, request: &Value) -> Result<MatchVerdict> {
    bind_request(ctx, request)?;
    let evaluated: rquickjs::Value = ctx
        .eval(script)
        .map_err(|e| exception_error(ctx, e))?;
    let json = js_to_json(&evaluated).unwrap_or(Value::Null);
    Ok(parse_verdict(&json))
}

fn run_sse_script(ctx: &Ctx<'_>, script: &str, request: &Value) -> Result<Vec<StreamAction>> {
    bind_request(ctx, request)?;
    let actions: Rc<RefCell<Vec<StreamAction>>> = Rc::new(RefCell::new(Vec::new()));

    let sse = Object::new(ctx.clone())?;
    let buf = actions.clone();
    sse.set(
        "send",
        Function::new(ctx.clone(), move |data: String| {
            buf.borrow_mut().push(StreamAction::Send(data));
        })?,
    )?;
    let buf = actions.clone();
    sse.set(
        "sendEvent",
        Function::new(ctx.clone(), move |event: String, data: String| {
            buf.borrow_mut().push(StreamAction::SendEvent { event, data });
        })?,
    )?;
    let buf = actions.clone();
    sse.set(
        "close",
        Function::new(ctx.clone(), move || {
            buf.borrow_mut().push(StreamAction::Close);
        })?,
    )?;
    ctx.globals().set("sse", sse)?;
    bind_sleep(ctx, &actions)?;

    ctx.eval::<(), _>(script).map_err(|e| exception_error(ctx, e))?;
    Ok(actions.take())
}

fn connect_ws_script<'js>(
    ctx: &Ctx<'js>,
    script: &str,
    request: &Value,
    sessions: &mut HashMap<u64, WsSession>,
    session: u64,
) -> Result<Vec<StreamAction>> {
    bind_request(ctx, request)?;
    let actions: Rc<RefCell<Vec<StreamAction>>> = Rc::new(RefCell::new(Vec::new()));
    let handlers: Rc<RefCell<Vec<(String, Persistent<Function<'static>>)>>> =
        Rc::new(RefCell::new(Vec::new()));

    let ws = Object::new(ctx.clone())?;
    let buf = actions.clone();
    ws.set(
        "send",
        Function::new(ctx.clone(), move |text: String| {
            buf.borrow_mut().push(StreamAction::Send(text));
        })?,
    )?;
    let buf = actions.clone();
    ws.set(
        "close",
        Function::new(ctx.clone(), move || {
            buf.borrow_mut().push(StreamAction::Close);
        })?,
    )?;
    let registry = handlers.clone();
    ws.set(
        "on",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, event: String, cb: Function<'js>| {
            registry.borrow_mut().push((event, Persistent::save(&ctx, cb)));
        })?,
    )?;
    ctx.globals().set("ws", ws.clone())?;
    let sleep_fn = bind_sleep(ctx, &actions)?;

    ctx.eval::<(), _>(script).map_err(|e| exception_error(ctx, e))?;

    sessions.insert(
        session,
        WsSession {
            ws_obj: Persistent::save(ctx, ws),
            sleep_fn: Persistent::save(ctx, sleep_fn),
            handlers,
            actions: actions.clone(),
        },
    );
    Ok(actions.take())
}

fn deliver_ws_message(
    ctx: &Ctx<'_>,
    sessions: &mut HashMap<u64, WsSession>,
    session: u64,
    text: &str,
) -> Result<Vec<StreamAction>> {
    let entry = sessions
        .get(&session)
        .ok_or_else(|| Error::script(format!("unknown websocket script session {}", session)))?;

    // Handlers resolve `ws` and `sleep` from globals at call time; rebind
    // them to this session's objects so concurrent connections stay apart.
    let ws: Object = entry.ws_obj.clone().restore(ctx)?;
    let sleep: Function = entry.sleep_fn.clone().restore(ctx)?;
    ctx.globals().set("ws", ws)?;
    ctx.globals().set("sleep", sleep)?;

    entry.actions.borrow_mut().clear();
    let handlers = entry.handlers.borrow().clone();
    for (event, handler) in handlers {
        if event != "message" {
            continue;
        }
        let func: Function = handler.restore(ctx)?;
        func.call::<_, ()>((text.to_string(),))
            .map_err(|e| exception_error(ctx, e))?;
    }
    Ok(entry.actions.take())
}

fn bind_request(ctx: &Ctx<'_>, request: &Value) -> Result<()> {
    let bound = json_to_js(ctx, request)?;
    ctx.globals().set("request", bound)?;
    Ok(())
}

fn bind_sleep<'js>(
    ctx: &Ctx<'js>,
    actions: &Rc<RefCell<Vec<StreamAction>>>,
) -> Result<Function<'js>> {
    let buf = actions.clone();
    let sleep = Function::new(ctx.clone(), move |ms: f64| {
        buf.borrow_mut().push(StreamAction::Sleep(ms.max(0.0) as u64));
    })?;
    ctx.globals().set("sleep", sleep.clone())?;
    Ok(sleep)
}

fn parse_verdict(json: &Value) -> MatchVerdict {
    let obj = match json.as_object() {
        Some(obj) => obj,
        None => {
            warn!("matcher script did not evaluate to an object; treating as no-match");
            return MatchVerdict::default();
        }
    };
    let matches = obj.get("matches").and_then(Value::as_bool).unwrap_or(false);
    let response = obj.get("response").and_then(|v| dynamic_response(v));
    MatchVerdict { matches, response }
}

fn dynamic_response(value: &Value) -> Option<ResponseItem> {
    let obj = value.as_object()?;
    let mut item = ResponseItem {
        status_code: obj
            .get("status_code")
            .and_then(Value::as_u64)
            .map(|c| c as u16)
            .unwrap_or(200),
        delay: obj.get("delay").and_then(Value::as_u64).unwrap_or(0),
        ..Default::default()
    };
    if let Some(headers) = obj.get("headers").and_then(Value::as_object) {
        for (key, value) in headers {
            item.headers
                .insert(key.clone(), crate::json_path::value_to_string(value));
        }
    }
    if let Some(body) = obj.get("body") {
        item.body = crate::json_path::value_to_string(body);
    }
    Some(item)
}

fn exception_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> Error {
    if matches!(err, rquickjs::Error::Exception) {
        let caught = ctx.catch();
        if let Some(exception) = caught.as_exception() {
            return Error::script(
                exception
                    .message()
                    .unwrap_or_else(|| "unknown exception".to_string()),
            );
        }
        if let Some(text) = js_to_json(&caught).map(|v| crate::json_path::value_to_string(&v)) {
            return Error::script(text);
        }
        return Error::script("unknown exception");
    }
    Error::script(err.to_string())
}

fn js_to_json(value: &rquickjs::Value<'_>) -> Option<Value> {
    use rquickjs::Type;
    match value.type_of() {
        Type::Undefined | Type::Null | Type::Uninitialized => Some(Value::Null),
        Type::Bool => value.as_bool().map(Value::Bool),
        Type::Int => value.as_int().map(|i| Value::Number(i.into())),
        Type::Float => value
            .as_number()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Type::String => value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .map(Value::String),
        Type::Array => {
            let array = value.as_array()?;
            let mut items = Vec::with_capacity(array.len());
            for item in array.iter::<rquickjs::Value>() {
                items.push(js_to_json(&item.ok()?)?);
            }
            Some(Value::Array(items))
        }
        Type::Object | Type::Exception => {
            let object = value.as_object()?;
            let mut map = serde_json::Map::new();
            for prop in object.props::<String, rquickjs::Value>() {
                let (key, value) = prop.ok()?;
                map.insert(key, js_to_json(&value)?);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn json_to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> Result<rquickjs::Value<'js>> {
    use rquickjs::{Array, Value as JsValue};
    let converted = match value {
        Value::Null => JsValue::new_null(ctx.clone()),
        Value::Bool(b) => JsValue::new_bool(ctx.clone(), *b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if (i32::MIN as i64..=i32::MAX as i64).contains(&i) {
                    JsValue::new_int(ctx.clone(), i as i32)
                } else {
                    JsValue::new_float(ctx.clone(), i as f64)
                }
            } else {
                JsValue::new_float(ctx.clone(), n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => rquickjs::String::from_str(ctx.clone(), s)?.into_value(),
        Value::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.iter().enumerate() {
                array.set(index, json_to_js(ctx, item)?)?;
            }
            array.into_value()
        }
        Value::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            object.into_value()
        }
    };
    Ok(converted)
}
