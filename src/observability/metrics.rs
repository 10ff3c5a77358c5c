//! Client metrics.
//!
//! # Metrics
//! - `light_requests_total` (counter): requests sent, by command
//! - `light_responses_total` (counter): responses, by outcome
//! - `light_heartbeats_total` (counter): heartbeats, by event
//! - `light_reconnects_total` (counter): reconnect attempts
//! - `light_connection_open` (gauge): 1=open, 0=otherwise
//! - `light_pending_requests` (gauge): requests awaiting a response
//! - `light_units_composed_total` (counter): units composed, by app
//! - `light_broadcasts_total` (counter): broadcasts, by outcome
//! - `light_frames_dropped_total` (counter): malformed inbound frames

use metrics::{counter, gauge};

pub fn record_request(command: &str) {
    counter!("light_requests_total", "command" => command.to_string()).increment(1);
}

pub fn record_response(outcome: &'static str) {
    counter!("light_responses_total", "outcome" => outcome).increment(1);
}

pub fn record_heartbeat(event: &'static str) {
    counter!("light_heartbeats_total", "event" => event).increment(1);
}

pub fn record_reconnect() {
    counter!("light_reconnects_total").increment(1);
}

pub fn record_connection_open(open: bool) {
    gauge!("light_connection_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_pending_requests(count: usize) {
    gauge!("light_pending_requests").set(count as f64);
}

pub fn record_unit_composed(app: &str) {
    counter!("light_units_composed_total", "app" => app.to_string()).increment(1);
}

pub fn record_broadcast(outcome: &'static str) {
    counter!("light_broadcasts_total", "outcome" => outcome).increment(1);
}

pub fn record_frame_dropped() {
    counter!("light_frames_dropped_total").increment(1);
}
