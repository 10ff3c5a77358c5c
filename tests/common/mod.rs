//! Shared utilities for integration tests: a scriptable mock node.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use dag_light_client::config::TransportConfig;

/// Instructions pushed to every live connection.
#[derive(Debug, Clone)]
pub enum Control {
    /// Send a raw text frame.
    Send(String),
    /// Drop the socket without a close handshake.
    Drop,
}

/// A node answering requests through a handler.
pub struct MockNode {
    pub url: String,
    frames: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    control: broadcast::Sender<Control>,
}

impl MockNode {
    /// Every frame the node received, decoded.
    pub fn frames(&self) -> Vec<Value> {
        self.frames.lock().unwrap().clone()
    }

    /// Request bodies received for `command`.
    pub fn requests(&self, command: &str) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|frame| frame[0] == "request" && frame[1]["command"] == command)
            .map(|frame| frame[1].clone())
            .collect()
    }

    /// Response bodies received, i.e. answers to node-initiated requests.
    pub fn responses(&self) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|frame| frame[0] == "response")
            .map(|frame| frame[1].clone())
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn push(&self, frame: Value) {
        let _ = self.control.send(Control::Send(frame.to_string()));
    }

    pub fn drop_connections(&self) {
        let _ = self.control.send(Control::Drop);
    }

    /// Transport config pointing at this node with short timings.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            url: self.url.clone(),
            reconnect_delay_ms: 50,
            connect_timeout_ms: 2_000,
            ..TransportConfig::default()
        }
    }
}

/// Start a mock node on an ephemeral port.
///
/// `handler(command, params)` returns the `response` value to send back, or
/// `None` to leave the request unanswered.
pub async fn start_mock_node<F>(handler: F) -> MockNode
where
    F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let (control, _) = broadcast::channel(64);
    let handler = Arc::new(handler);

    let node = MockNode {
        url: format!("ws://{}", addr),
        frames: frames.clone(),
        connections: connections.clone(),
        control: control.clone(),
    };

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(socket) = accept_async(stream).await else {
                continue;
            };
            connections.fetch_add(1, Ordering::SeqCst);
            let frames = frames.clone();
            let handler = handler.clone();
            let mut control = control.subscribe();

            tokio::spawn(async move {
                let (mut sink, mut stream) = socket.split();
                loop {
                    tokio::select! {
                        message = stream.next() => {
                            let text = match message {
                                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => continue,
                            };
                            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            frames.lock().unwrap().push(frame.clone());
                            if frame[0] != "request" {
                                continue;
                            }
                            let command = frame[1]["command"].as_str().unwrap_or_default().to_string();
                            let params = frame[1].get("params").cloned().unwrap_or(Value::Null);
                            if let Some(response) = handler(&command, &params) {
                                let reply = json!(["response", {
                                    "command": command,
                                    "tag": frame[1]["tag"],
                                    "response": response,
                                }]);
                                if sink.send(Message::Text(reply.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        instruction = control.recv() => match instruction {
                            Ok(Control::Send(text)) => {
                                let _ = sink.send(Message::Text(text.into())).await;
                            }
                            Ok(Control::Drop) | Err(_) => break,
                        }
                    }
                }
            });
        }
    });

    node
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
