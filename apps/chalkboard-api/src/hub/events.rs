//! Event kinds and server-sent-events wire framing.
//!
//! Every event is serialized exactly once into a complete SSE frame
//! (`event: <kind>\ndata: <json>\n\n`). The frame is shared by reference
//! count, so fanning it out to many subscribers never re-encodes it.

use std::fmt;

use axum::body::Bytes;
use serde::Serialize;

use crate::models::note::Note;

/// Payload of the greeting sent once at the start of every stream.
pub const HELLO_PAYLOAD: &str = r#""keep alive""#;

/// SSE comment frame written on heartbeat ticks. `EventSource` ignores it.
pub const HEARTBEAT_FRAME: &[u8] = b": ping\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Hello,
    Add,
    Update,
    Remove,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Hello => "hello",
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Remove => "remove",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, pre-serialized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    frame: Bytes,
}

impl Event {
    /// Frame `data` (already JSON) under `kind`.
    pub fn new(kind: EventKind, data: &str) -> Self {
        let frame = format!("event: {}\ndata: {}\n\n", kind.as_str(), data);
        Self {
            kind,
            frame: Bytes::from(frame),
        }
    }

    pub fn hello() -> Self {
        Self::new(EventKind::Hello, HELLO_PAYLOAD)
    }

    pub fn add(note: &Note) -> Self {
        Self::new(EventKind::Add, &to_json(note))
    }

    pub fn update(note: &Note) -> Self {
        Self::new(EventKind::Update, &to_json(note))
    }

    /// The payload is the id as a JSON *string*, e.g. `"1"`.
    pub fn remove(id: i64) -> Self {
        Self::new(EventKind::Remove, &to_json(&id.to_string()))
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn into_frame(self) -> Bytes {
        self.frame
    }
}

pub fn heartbeat_frame() -> Bytes {
    Bytes::from_static(HEARTBEAT_FRAME)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Notes and strings have no failing Serialize paths.
    serde_json::to_string(value).expect("event payload serializes")
}
