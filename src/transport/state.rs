//! Connection state machine.
//!
//! # States
//! - Connecting: handshake in progress, outbound frames queue up
//! - Open: frames flow, heartbeats run
//! - Reconnecting: waiting out the fixed reconnect delay
//! - Closed: terminal
//!
//! # State Transitions
//! ```text
//! Connecting → Open: handshake completed
//! Connecting → Closed: handshake completed with a close pending
//! Open → Reconnecting: unexpected close, reconnect enabled
//! Open → Closed: explicit close, or unexpected close without reconnect
//! Reconnecting → Connecting: delay elapsed
//! ```
//!
//! # Design Decisions
//! - No I/O here; events in, `Action`s out, time passed in as `Instant`
//! - The driver task is the only owner, so no locking

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::observability::metrics;
use crate::transport::frame::{Frame, Request, Response};
use crate::transport::types::{ConnectionState, TransportError, TransportResult};

/// Where a response is delivered.
pub type Reply = oneshot::Sender<TransportResult<Value>>;

/// Side effect requested from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write a text frame to the socket.
    Send(String),
    /// Close the socket, then report `closed`.
    Close,
    /// Wait, then report `reconnecting` and dial again.
    Reconnect(Duration),
    /// Hand an uncorrelated inbound frame to subscribers.
    Notify(Frame),
}

struct Pending {
    command: String,
    reply: Reply,
}

/// Heartbeat and timing settings.
#[derive(Debug, Clone)]
pub struct Timings {
    pub liveness_timeout: Duration,
    pub response_timeout: Duration,
    pub pause_threshold: Duration,
    pub reconnect_delay: Duration,
}

impl From<&TransportConfig> for Timings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            liveness_timeout: config.liveness_timeout(),
            response_timeout: config.response_timeout(),
            pause_threshold: config.pause_threshold(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// Request correlation and liveness for one logical connection.
pub struct Connection {
    state: ConnectionState,
    timings: Timings,
    reconnect: bool,
    reject_pending_on_close: bool,
    close_requested: bool,
    deferred_close: bool,
    pending: HashMap<String, Pending>,
    outbox: Vec<String>,
    last_received: Instant,
    last_wake: Instant,
    heartbeat: Option<(String, Instant)>,
}

impl Connection {
    pub fn new(config: &TransportConfig, now: Instant) -> Self {
        Self {
            state: ConnectionState::Connecting,
            timings: Timings::from(config),
            reconnect: config.reconnect,
            reject_pending_on_close: config.reject_pending_on_close,
            close_requested: false,
            deferred_close: false,
            pending: HashMap::new(),
            outbox: Vec::new(),
            last_received: now,
            last_wake: now,
            heartbeat: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue or send a request. The reply fires when the tagged response arrives.
    pub fn request(
        &mut self,
        command: &str,
        params: Option<Value>,
        tag: String,
        reply: Reply,
    ) -> Vec<Action> {
        if self.state == ConnectionState::Closed {
            let _ = reply.send(Err(TransportError::Closed));
            return Vec::new();
        }
        let text = match Frame::request(command, params, &tag).to_text() {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(e));
                return Vec::new();
            }
        };

        tracing::debug!(tag = %tag, command = %command, state = %self.state, "Request queued");
        metrics::record_request(command);
        self.pending.insert(
            tag,
            Pending {
                command: command.to_string(),
                reply,
            },
        );
        metrics::record_pending_requests(self.pending.len());
        self.send(text)
    }

    /// Forget a request whose caller stopped waiting.
    pub fn cancel(&mut self, tag: &str) {
        if self.pending.remove(tag).is_some() {
            tracing::debug!(tag = %tag, "Request abandoned");
            metrics::record_pending_requests(self.pending.len());
        }
    }

    /// Fire-and-forget message.
    pub fn justsaying(&mut self, subject: &str, body: Option<Value>) -> Vec<Action> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }
        match Frame::justsaying(subject, body).to_text() {
            Ok(text) => self.send(text),
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Dropping unencodable justsaying");
                Vec::new()
            }
        }
    }

    /// Explicit close. Disables reconnect.
    pub fn close(&mut self) -> Vec<Action> {
        self.close_requested = true;
        match self.state {
            ConnectionState::Connecting => {
                tracing::debug!("Close deferred until the handshake completes");
                self.deferred_close = true;
                Vec::new()
            }
            ConnectionState::Open => vec![Action::Close],
            ConnectionState::Reconnecting => {
                self.finish_close();
                Vec::new()
            }
            ConnectionState::Closed => Vec::new(),
        }
    }

    /// The handshake completed.
    pub fn opened(&mut self, now: Instant) -> Vec<Action> {
        self.last_received = now;
        if self.deferred_close {
            self.deferred_close = false;
            tracing::info!("Connection opened with a close pending, closing");
            return vec![Action::Close];
        }

        self.state = ConnectionState::Open;
        self.heartbeat = None;
        metrics::record_connection_open(true);
        tracing::info!(queued = self.outbox.len(), "Connection open");
        self.outbox.drain(..).map(Action::Send).collect()
    }

    /// The socket is gone, for whatever reason.
    pub fn closed(&mut self) -> Vec<Action> {
        if matches!(
            self.state,
            ConnectionState::Closed | ConnectionState::Reconnecting
        ) {
            return Vec::new();
        }
        metrics::record_connection_open(false);
        self.heartbeat = None;

        if self.close_requested || !self.reconnect {
            self.finish_close();
            return Vec::new();
        }

        tracing::warn!(
            delay_ms = self.timings.reconnect_delay.as_millis() as u64,
            pending = self.pending.len(),
            "Connection lost, reconnecting"
        );
        metrics::record_reconnect();
        self.state = ConnectionState::Reconnecting;
        self.settle_pending();
        vec![Action::Reconnect(self.timings.reconnect_delay)]
    }

    /// The reconnect delay elapsed and a new handshake starts.
    pub fn reconnecting(&mut self) {
        if self.state == ConnectionState::Reconnecting {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Handle one inbound text frame.
    pub fn frame_received(&mut self, text: &str, now: Instant) -> Vec<Action> {
        self.last_received = now;
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                metrics::record_frame_dropped();
                return Vec::new();
            }
        };

        match frame {
            Frame::Request(request) => self.node_request(request, now),
            Frame::Response(response) => self.response(response),
            justsaying @ Frame::Justsaying(_) => vec![Action::Notify(justsaying)],
        }
    }

    /// Heartbeat timer tick.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        let paused = now.saturating_duration_since(self.last_wake) > self.timings.pause_threshold;
        self.last_wake = now;

        if self.state != ConnectionState::Open {
            return Vec::new();
        }
        if now.saturating_duration_since(self.last_received) < self.timings.liveness_timeout {
            return Vec::new();
        }

        if let Some((tag, sent_at)) = &self.heartbeat {
            if paused {
                tracing::warn!(tag = %tag, "Timers were paused with a heartbeat outstanding, closing");
                metrics::record_heartbeat("paused");
                return vec![Action::Close];
            }
            if now.saturating_duration_since(*sent_at) < self.timings.response_timeout {
                return Vec::new();
            }
            let error = TransportError::HeartbeatTimeout;
            tracing::warn!(tag = %tag, error = %error, "Closing connection");
            metrics::record_heartbeat("timeout");
            return vec![Action::Close];
        }

        let tag = Uuid::new_v4().to_string();
        match Frame::request("heartbeat", None, &tag).to_text() {
            Ok(text) => {
                tracing::debug!(tag = %tag, "Sending heartbeat");
                metrics::record_heartbeat("sent");
                self.heartbeat = Some((tag, now));
                vec![Action::Send(text)]
            }
            Err(_) => Vec::new(),
        }
    }

    fn send(&mut self, text: String) -> Vec<Action> {
        if self.state == ConnectionState::Open {
            vec![Action::Send(text)]
        } else {
            self.outbox.push(text);
            Vec::new()
        }
    }

    fn node_request(&mut self, request: Request, now: Instant) -> Vec<Action> {
        let Request { command, tag, .. } = &request;
        let reply = if command == "heartbeat" {
            if now.saturating_duration_since(self.last_wake) > self.timings.pause_threshold {
                metrics::record_heartbeat("sleep");
                Frame::response(command, tag, Value::String("sleep".into()))
            } else {
                metrics::record_heartbeat("acked");
                Frame::response(command, tag, Value::Null)
            }
        } else if command == "subscribe" {
            Frame::error(command, tag, "I'm light, cannot subscribe you to updates")
        } else if command.starts_with("light/") {
            Frame::error(command, tag, "I'm light myself, can't serve you")
        } else if command.starts_with("hub/") {
            Frame::error(command, tag, "I'm not a hub")
        } else {
            return vec![Action::Notify(Frame::Request(request))];
        };

        match reply.to_text() {
            Ok(text) => self.send(text),
            Err(_) => Vec::new(),
        }
    }

    fn response(&mut self, response: Response) -> Vec<Action> {
        if self
            .heartbeat
            .as_ref()
            .is_some_and(|(tag, _)| *tag == response.tag)
        {
            tracing::debug!(tag = %response.tag, "Heartbeat answered");
            self.heartbeat = None;
            return Vec::new();
        }

        let Some(pending) = self.pending.remove(&response.tag) else {
            metrics::record_response("uncorrelated");
            return vec![Action::Notify(Frame::Response(response))];
        };
        metrics::record_pending_requests(self.pending.len());

        let result = response.into_result();
        metrics::record_response(if result.is_ok() { "ok" } else { "error" });
        tracing::debug!(command = %pending.command, ok = result.is_ok(), "Response received");
        let _ = pending.reply.send(result);
        Vec::new()
    }

    fn finish_close(&mut self) {
        self.state = ConnectionState::Closed;
        self.deferred_close = false;
        self.outbox.clear();
        self.settle_pending();
        tracing::info!(pending = self.pending.len(), "Connection closed");
    }

    fn settle_pending(&mut self) {
        if !self.reject_pending_on_close {
            return;
        }
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(TransportError::Closed));
        }
        metrics::record_pending_requests(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> TransportConfig {
        TransportConfig::default()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn sent(actions: &[Action]) -> Vec<Frame> {
        actions
            .iter()
            .filter_map(|action| match action {
                Action::Send(text) => Some(Frame::parse(text).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn open(now: Instant) -> Connection {
        let mut conn = Connection::new(&config(), now);
        conn.opened(now);
        conn
    }

    #[test]
    fn test_request_queued_until_open_and_sent_once() {
        let t0 = Instant::now();
        let mut conn = Connection::new(&config(), t0);
        let (tx, _rx) = oneshot::channel();

        assert!(conn.request("get_witnesses", None, "t1".into(), tx).is_empty());
        let actions = conn.opened(t0);
        assert_eq!(sent(&actions), vec![Frame::request("get_witnesses", None, "t1")]);

        // Nothing left to flush on a later open.
        conn.closed();
        conn.reconnecting();
        assert!(conn.opened(t0).is_empty());
    }

    #[test]
    fn test_response_resolves_matching_tag_out_of_order() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        conn.request("a", None, "t1".into(), tx1);
        conn.request("b", None, "t2".into(), tx2);

        conn.frame_received(r#"["response",{"command":"b","tag":"t2","response":2}]"#, t0);
        assert_eq!(rx2.try_recv().unwrap(), Ok(json!(2)));
        assert!(rx1.try_recv().is_err());

        conn.frame_received(r#"["response",{"command":"a","tag":"t1","response":1}]"#, t0);
        assert_eq!(rx1.try_recv().unwrap(), Ok(json!(1)));
        assert_eq!(conn.pending_count(), 0);
    }

    #[test]
    fn test_error_response_rejects() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let (tx, mut rx) = oneshot::channel();
        conn.request("light/get_history", Some(json!({})), "t".into(), tx);
        conn.frame_received(
            r#"["response",{"command":"light/get_history","tag":"t","response":{"error":"bad"}}]"#,
            t0,
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(TransportError::Rpc {
                message: "bad".into(),
                code: None
            })
        );
    }

    #[test]
    fn test_uncorrelated_frames_notify() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let actions =
            conn.frame_received(r#"["justsaying",{"subject":"joint","body":{"u":1}}]"#, t0);
        assert!(matches!(&actions[..], [Action::Notify(Frame::Justsaying(_))]));

        let actions = conn.frame_received(r#"["response",{"command":"x","tag":"nobody"}]"#, t0);
        assert!(matches!(&actions[..], [Action::Notify(Frame::Response(_))]));

        let actions = conn.frame_received(r#"["request",{"command":"custom","tag":"n"}]"#, t0);
        assert!(matches!(&actions[..], [Action::Notify(Frame::Request(_))]));
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert!(conn.frame_received("[1,2,3]", t0).is_empty());
        assert!(conn.frame_received("garbage", t0).is_empty());
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn test_node_requests_answered() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let cases = [
            ("heartbeat", Value::Null),
            ("subscribe", json!({"error": "I'm light, cannot subscribe you to updates"})),
            ("light/get_history", json!({"error": "I'm light myself, can't serve you"})),
            ("hub/get_bots", json!({"error": "I'm not a hub"})),
        ];
        for (command, expected) in cases {
            let text = Frame::request(command, None, "n1").to_text().unwrap();
            let actions = conn.frame_received(&text, t0);
            assert_eq!(sent(&actions), vec![Frame::response(command, "n1", expected)]);
        }
    }

    #[test]
    fn test_heartbeat_answered_with_sleep_after_pause() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let text = Frame::request("heartbeat", None, "h").to_text().unwrap();
        let actions = conn.frame_received(&text, t0 + secs(21));
        assert_eq!(sent(&actions), vec![Frame::response("heartbeat", "h", json!("sleep"))]);
    }

    #[test]
    fn test_tick_skips_when_recently_active() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert!(conn.tick(t0 + secs(5)).is_empty());
    }

    #[test]
    fn test_tick_skips_when_not_open() {
        let t0 = Instant::now();
        let mut conn = Connection::new(&config(), t0);
        assert!(conn.tick(t0 + secs(30)).is_empty());
    }

    #[test]
    fn test_one_heartbeat_per_response_window() {
        let t0 = Instant::now();
        let mut conn = open(t0);

        let first = sent(&conn.tick(t0 + secs(10)));
        assert_eq!(first.len(), 1);
        let Frame::Request(heartbeat) = &first[0] else {
            panic!("expected heartbeat request");
        };
        assert_eq!(heartbeat.command, "heartbeat");

        for offset in [20, 30, 40, 50, 60] {
            assert!(conn.tick(t0 + secs(offset)).is_empty(), "tick at {}", offset);
        }
        assert_eq!(conn.tick(t0 + secs(70)), vec![Action::Close]);
    }

    #[test]
    fn test_heartbeat_response_clears_marker() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let frames = sent(&conn.tick(t0 + secs(10)));
        let tag = frames[0].tag().unwrap().to_string();

        let reply = Frame::response("heartbeat", &tag, Value::Null).to_text().unwrap();
        assert!(conn.frame_received(&reply, t0 + secs(11)).is_empty());

        assert_eq!(sent(&conn.tick(t0 + secs(21))).len(), 1);
    }

    #[test]
    fn test_pause_with_outstanding_heartbeat_closes() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert_eq!(sent(&conn.tick(t0 + secs(10))).len(), 1);
        assert_eq!(conn.tick(t0 + secs(35)), vec![Action::Close]);
    }

    #[test]
    fn test_close_while_connecting_is_deferred() {
        let t0 = Instant::now();
        let mut conn = Connection::new(&config(), t0);
        let (tx, _rx) = oneshot::channel();
        conn.request("get_witnesses", None, "t1".into(), tx);

        assert!(conn.close().is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let actions = conn.opened(t0);
        assert_eq!(actions, vec![Action::Close]);
        assert!(conn.closed().is_empty());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_unexpected_close_reconnects() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert_eq!(conn.closed(), vec![Action::Reconnect(secs(1))]);
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
        conn.reconnecting();
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_explicit_close_disables_reconnect() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert_eq!(conn.close(), vec![Action::Close]);
        assert!(conn.closed().is_empty());
        assert_eq!(conn.state(), ConnectionState::Closed);

        let (tx, mut rx) = oneshot::channel();
        assert!(conn.request("get_peers", None, "late".into(), tx).is_empty());
        assert_eq!(rx.try_recv().unwrap(), Err(TransportError::Closed));
    }

    #[test]
    fn test_pending_kept_across_reconnect_by_default() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let (tx, mut rx) = oneshot::channel();
        conn.request("get_peers", None, "t".into(), tx);
        conn.closed();
        assert_eq!(conn.pending_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pending_rejected_when_configured() {
        let t0 = Instant::now();
        let mut config = config();
        config.reject_pending_on_close = true;
        let mut conn = Connection::new(&config, t0);
        conn.opened(t0);
        let (tx, mut rx) = oneshot::channel();
        conn.request("get_peers", None, "t".into(), tx);
        conn.closed();
        assert_eq!(conn.pending_count(), 0);
        assert_eq!(rx.try_recv().unwrap(), Err(TransportError::Closed));
    }

    #[test]
    fn test_cancel_forgets_request() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        let (tx, _rx) = oneshot::channel();
        conn.request("get_peers", None, "t".into(), tx);
        conn.cancel("t");
        let actions = conn.frame_received(r#"["response",{"command":"get_peers","tag":"t"}]"#, t0);
        assert!(matches!(&actions[..], [Action::Notify(_)]));
    }
}
