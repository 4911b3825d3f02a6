use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Largest id accepted from clients: the biggest integer a browser can
/// round-trip through a JSON number.
pub const MAX_CLIENT_ID: i64 = (1 << 53) - 1;

/// A positioned, labeled sticky note.
///
/// Serializes to exactly `{"id","note","x","y"}`; this is both the JSON
/// response body for a create and the payload of `add`/`update` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Note {
    pub id: i64,
    pub note: String,
    pub x: i64,
    pub y: i64,
}

impl Note {
    /// A note that has not been stored yet. The store assigns the id.
    pub fn draft(note: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            id: 0,
            note: note.into(),
            x,
            y,
        }
    }
}
