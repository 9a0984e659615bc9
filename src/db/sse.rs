// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-Sent Events parsing for realtime database subscriptions.
//!
//! The database streams events such as:
//!
//! ```text
//! event: put
//! data: {"path": "/", "data": {"a1": {"name": "run"}}}
//!
//! event: keep-alive
//! data: null
//! ```

use crate::db::{ChangeEvent, DbPath, StoreError};
use serde::Deserialize;
use serde_json::Value;

/// One dispatched event from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser. Chunks may split lines, or UTF-8 sequences,
/// at any byte.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    scanned: usize,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every event completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut buffer = std::mem::take(&mut self.buffer);

        let mut events = Vec::new();
        let mut start = 0;
        // Bytes before `scanned` were searched on an earlier feed.
        let mut from = self.scanned;
        while let Some(offset) = buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            let line = String::from_utf8_lossy(&buffer[start..end]);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
            start = end + 1;
            from = start;
        }

        buffer.drain(..start);
        self.scanned = buffer.len();
        self.buffer = buffer;
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Translate a database stream event. `keep-alive` and unknown events
/// yield `None`.
pub fn to_change_event(event: &SseEvent) -> Result<Option<ChangeEvent>, StoreError> {
    match event.event.as_str() {
        "put" | "patch" => {
            let body: PathData = serde_json::from_str(&event.data)
                .map_err(|e| StoreError::Decode(format!("{} event: {}", event.event, e)))?;
            let path = DbPath::parse(&body.path)?;
            Ok(Some(if event.event == "put" {
                ChangeEvent::Put {
                    path,
                    data: body.data,
                }
            } else {
                ChangeEvent::Patch {
                    path,
                    data: body.data,
                }
            }))
        }
        "cancel" => {
            let reason = match serde_json::from_str::<Value>(&event.data) {
                Ok(Value::Null) => None,
                Ok(Value::String(s)) => Some(s),
                Ok(other) => Some(other.to_string()),
                Err(_) if event.data.is_empty() => None,
                Err(_) => Some(event.data.clone()),
            };
            Ok(Some(ChangeEvent::Cancel { reason }))
        }
        "auth_revoked" => Ok(Some(ChangeEvent::AuthRevoked)),
        "keep-alive" => Ok(None),
        other => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            Ok(None)
        }
    }
}
