//! Wire format: the event envelope and the SSE frame decoder
//!
//! The upstream event source emits UTF-8 text frames, each carrying one JSON
//! envelope. The envelope is a closed tagged union: an unknown `type`
//! discriminator is a decode error, never silently ignored. Decoding happens
//! exactly once, at the transport boundary.

use crate::error::ConnectError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entity's current status, as reported by either transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusRecord {
    pub id: i64,
    pub status: String,
}

/// The self-describing event envelope carried by each stream frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    /// One or more entities changed status
    StatusUpdate {
        data: Vec<StatusRecord>,
        timestamp: f64,
    },
    /// Liveness signal; requires no caller action
    Heartbeat { timestamp: f64 },
    /// Server-signaled fault; treated as a connection-level failure
    Error { message: String, timestamp: f64 },
}

impl Envelope {
    /// Decode one frame payload
    pub fn decode(payload: &str) -> Result<Envelope, ConnectError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Convert the envelope's epoch-milliseconds timestamp to a wall-clock time.
///
/// Falls back to "now" if the value is out of chrono's representable range.
pub fn event_time(timestamp_ms: f64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64).unwrap_or_else(Utc::now)
}

/// Incremental decoder for the `text/event-stream` framing.
///
/// Feed it raw byte chunks as they arrive; it yields one payload string per
/// complete event (the concatenated `data:` field lines). Comment lines and
/// non-`data` fields (`event:`, `id:`, `retry:`) are ignored, since the
/// upstream envelope is self-describing.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain any events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        // Events are separated by a blank line.
        while let Some(end) = find_event_boundary(&self.buf) {
            let event: Vec<u8> = self.buf.drain(..end.consumed).collect();
            let text = String::from_utf8_lossy(&event[..end.payload]);
            if let Some(payload) = parse_event(&text) {
                events.push(payload);
            }
        }
        events
    }
}

struct EventBoundary {
    /// Length of the event block, excluding the separator
    payload: usize,
    /// Length including the separator, to drain from the buffer
    consumed: usize,
}

fn find_event_boundary(buf: &[u8]) -> Option<EventBoundary> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some(EventBoundary {
                payload: i + 1,
                consumed: i + 2,
            });
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some(EventBoundary {
                payload: i + 2,
                consumed: i + 4,
            });
        }
        i += 1;
    }
    None
}

/// Extract the payload from one event block, or `None` for comment-only or
/// empty blocks.
fn parse_event(block: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
