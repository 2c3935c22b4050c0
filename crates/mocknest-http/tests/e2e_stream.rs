//! End-to-end tests for SSE streams and WebSocket connections

mod common;

use common::{spawn_server, url};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

async fn read_sse_body(addr: std::net::SocketAddr, path: &str) -> String {
    let response = reqwest::get(url(addr, path)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    String::from_utf8(body).unwrap()
}

fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn sse_cycle_emits_until_the_cap() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: ticker
    protocol: sse
    request: {uri: /events}
    sse:
      mode: cycle
      interval_ms: 50
      close_after: 5
      events:
        - {data: a}
        - {data: b}
"#,
    )
    .await;

    let body = read_sse_body(addr, "/events").await;
    assert_eq!(data_lines(&body), vec!["a", "b", "a", "b", "a"]);
    assert!(body.ends_with("\n\n"));
}

#[tokio::test]
async fn sse_once_stops_at_list_end() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: short
    protocol: sse
    request: {uri: /events}
    sse:
      mode: once
      events:
        - {data: only}
        - {data: two}
"#,
    )
    .await;

    let body = read_sse_body(addr, "/events").await;
    assert_eq!(data_lines(&body), vec!["only", "two"]);
}

#[tokio::test]
async fn sse_field_order_is_event_id_retry_data() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: full-frame
    protocol: sse
    request: {uri: /events}
    sse:
      mode: once
      retry: 1500
      events:
        - {event: update, id: '7', retry: 3000, data: payload}
"#,
    )
    .await;

    let body = read_sse_body(addr, "/events").await;
    // Initial retry advice precedes the first event.
    assert!(body.starts_with("retry: 1500\n\n"));

    let frame = body
        .split("\n\n")
        .find(|chunk| chunk.contains("data:"))
        .unwrap();
    let lines: Vec<&str> = frame.lines().collect();
    assert_eq!(
        lines,
        vec!["event: update", "id: 7", "retry: 3000", "data: payload"]
    );
}

#[tokio::test]
async fn sse_javascript_mode_replays_script_actions() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: scripted-stream
    protocol: sse
    request: {uri: /events}
    sse:
      mode: javascript
      javascript: |
        sse.send("first");
        sse.sendEvent("custom", "second");
        sse.close();
"#,
    )
    .await;

    let body = read_sse_body(addr, "/events").await;
    assert_eq!(data_lines(&body), vec!["first", "second"]);
    assert!(body.contains("event: custom\ndata: second"));
}

#[tokio::test]
async fn websocket_echo_mode() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: echo-socket
    protocol: websocket
    request: {uri: /ws}
    websocket:
      mode: echo
"#,
    )
    .await;

    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
        .send(Message::Text("ping-1".into()))
        .await
        .unwrap();
    match socket.next().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), "ping-1"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn websocket_sequence_sends_then_closes() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: feed
    protocol: websocket
    request: {uri: /ws}
    websocket:
      mode: sequence
      on_connect: welcome
      close_after: 2
      messages:
        - {text: one}
        - {text: two}
        - {text: three}
"#,
    )
    .await;

    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let mut texts = Vec::new();
    while let Some(Ok(message)) = socket.next().await {
        match message {
            Message::Text(text) => texts.push(text.to_string()),
            Message::Close(_) => break,
            _ => {}
        }
    }
    assert_eq!(texts, vec!["welcome", "one", "two"]);
}

#[tokio::test]
async fn websocket_javascript_mode_answers_messages() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: scripted-socket
    protocol: websocket
    request: {uri: /ws}
    websocket:
      mode: javascript
      javascript: |
        ws.send("ready");
        ws.on("message", function (msg) {
          ws.send("echo:" + msg);
        });
"#,
    )
    .await;

    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    match socket.next().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), "ready"),
        other => panic!("expected greeting, got {:?}", other),
    }

    socket.send(Message::Text("hey".into())).await.unwrap();
    match socket.next().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), "echo:hey"),
        other => panic!("expected echo, got {:?}", other),
    }
}

#[tokio::test]
async fn websocket_connection_cap_refuses_with_503() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: limited
    protocol: websocket
    request: {uri: /ws}
    websocket:
      mode: echo
      max_connections: 1
"#,
    )
    .await;

    let (_first, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let second = connect_async(format!("ws://{}/ws", addr)).await;
    match second {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected HTTP 503 refusal, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn websocket_broadcast_fans_out_to_peers() {
    let (addr, state) = spawn_server(
        r#"
mocks:
  - name: room
    protocol: websocket
    request: {uri: /ws}
    websocket:
      mode: broadcast
      channel: lobby
"#,
    )
    .await;

    let (mut alice, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let (mut bob, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    // Give both connection tasks time to subscribe.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(state.gauge.active("room"), 2);

    alice
        .send(Message::Text("hello room".into()))
        .await
        .unwrap();
    match bob.next().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), "hello room"),
        other => panic!("expected broadcast frame, got {:?}", other),
    }

    // The control plane reaches the same channel.
    let delivered: serde_json::Value = reqwest::Client::new()
        .post(url(addr, "/__ws/broadcast?channel=lobby"))
        .body("announcement")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(delivered["delivered"], 2);
}
