use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use futures::{SinkExt, StreamExt};
use log_relay::logging::{LogBuffer, LogEntry, LogLevel};
use log_relay::web::{router, LiveUpdate, RelayState};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn state_with(messages: &[&str]) -> RelayState {
    let buffer = Arc::new(LogBuffer::new(3).unwrap());
    for message in messages {
        buffer.add(LogEntry::new(LogLevel::Information, *message).with_source("tests"));
    }
    RelayState::new(buffer)
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_get_logs_returns_entries_in_order() {
    let state = state_with(&["a", "b", "c", "d"]);
    let app = router(state, true);

    let response = app.oneshot(request(Method::GET, "/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let messages: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(messages, vec!["b", "c", "d"]);

    let first = &json[0];
    assert_eq!(first["level"], "Information");
    assert_eq!(first["source"], "tests");
    assert!(first["exception"].is_null());
    assert!(first["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_get_logs_on_empty_buffer_is_empty_array() {
    let app = router(state_with(&[]), true);

    let response = app.oneshot(request(Method::GET, "/logs")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_delete_logs_clears_buffer() {
    let state = state_with(&["a", "b"]);
    let buffer = state.buffer.clone();
    let app = router(state, true);

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, "/logs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(buffer.is_empty());

    let response = app.oneshot(request(Method::GET, "/logs")).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_buffer_changes_reach_live_update_channel() {
    let state = state_with(&[]);
    let mut updates = state.updates();

    state
        .buffer
        .add(LogEntry::new(LogLevel::Error, "something broke"));
    assert_eq!(updates.try_recv().unwrap(), LiveUpdate::LogsChanged);

    let app = router(state, true);
    let response = app.oneshot(request(Method::DELETE, "/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(updates.try_recv().unwrap(), LiveUpdate::LogsChanged);
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_hello_endpoint() {
    let app = router(state_with(&[]), false);

    let response = app.oneshot(request(Method::GET, "/hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Hello World!");
}

#[tokio::test]
async fn test_cors_headers_when_enabled() {
    let app = router(state_with(&[]), true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logs")
                .header("origin", "http://viewer.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_no_cors_headers_when_disabled() {
    let app = router(state_with(&[]), false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logs")
                .header("origin", "http://viewer.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[test]
fn test_dropping_state_removes_its_observer() {
    let buffer = Arc::new(LogBuffer::new(3).unwrap());

    for _ in 0..5 {
        let state = RelayState::new(buffer.clone());
        let clone = state.clone();
        assert_eq!(buffer.observer_count(), 1);

        drop(state);
        assert_eq!(buffer.observer_count(), 1, "a live clone keeps the bridge");

        drop(clone);
        assert_eq!(buffer.observer_count(), 0);
    }

    let state = RelayState::new(buffer.clone());
    let app = router(state, true);
    assert_eq!(buffer.observer_count(), 1);
    drop(app);
    assert_eq!(buffer.observer_count(), 0);
}

async fn wait_for_viewers(state: &RelayState, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.viewer_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("viewer count should settle");
}

#[tokio::test]
async fn test_websocket_pushes_change_frames() {
    let buffer = Arc::new(LogBuffer::new(3).unwrap());
    let state = RelayState::new(buffer.clone());
    let app = router(state.clone(), true);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/logs/ws", addr))
        .await
        .unwrap();
    wait_for_viewers(&state, 1).await;

    buffer.add(LogEntry::new(LogLevel::Warning, "queue is backing up"));
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("a frame should arrive")
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Text(r#"{"type":"logs_changed"}"#.to_string()));

    buffer.clear();
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("a frame should arrive")
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Text(r#"{"type":"logs_changed"}"#.to_string()));

    socket.send(Message::Close(None)).await.unwrap();
    wait_for_viewers(&state, 0).await;

    server.abort();
}
