// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::MockTransport;
use yare::parameterized;

#[parameterized(
    no_token = { "ws://h/ws/events/", None, "ws://h/ws/events/" },
    empty_token = { "ws://h/ws/events/", Some(""), "ws://h/ws/events/" },
    plain = { "ws://h/ws/events/", Some("abc"), "ws://h/ws/events/?token=abc" },
    existing_query = { "ws://h/ws?room=1", Some("abc"), "ws://h/ws?room=1&token=abc" },
)]
fn token_is_appended_to_url(url: &str, token: Option<&str>, expected: &str) {
    assert_eq!(with_token(url, token), expected);
}

#[tokio::test]
async fn websocket_transport_starts_disconnected() {
    let mut transport = WebSocketTransport::new();
    assert!(!transport.is_connected());
    assert!(matches!(
        transport.recv().await,
        Err(TransportError::ConnectionClosed)
    ));
    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn websocket_connect_to_closed_port_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let mut transport = WebSocketTransport::new();
    let err = transport
        .connect(&format!("ws://{addr}/ws"), Some("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)));
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn mock_transport_delivers_frames_until_close() {
    let (mut transport, control) = MockTransport::new();
    transport.connect("ws://test", Some("tok")).await.unwrap();
    assert!(transport.is_connected());
    assert_eq!(control.tokens.lock().unwrap().as_slice(), &[Some("tok".to_string())]);

    control.send_text("hello");
    control.close();
    assert_eq!(transport.recv().await.unwrap().as_deref(), Some("hello"));
    assert_eq!(transport.recv().await.unwrap(), None);
    assert!(!transport.is_connected());
}
