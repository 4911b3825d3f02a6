use std::fmt;

use crate::error::FieldError;

/// Board served at `/` and `/events`.
pub const DEFAULT_BOARD: &str = "default";

pub const MAX_BOARD_NAME_LEN: usize = 64;

/// A validated board name: 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// Every board has its own notes and its own subscribers. Boards exist
/// implicitly once named in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardName(String);

impl BoardName {
    pub fn parse(raw: &str) -> Result<Self, FieldError> {
        if raw.is_empty() || raw.len() > MAX_BOARD_NAME_LEN {
            return Err(FieldError::new(
                "board",
                format!("Board name must be 1 to {MAX_BOARD_NAME_LEN} characters"),
            ));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(FieldError::new(
                "board",
                "Board name may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BoardName {
    fn default() -> Self {
        Self(DEFAULT_BOARD.to_string())
    }
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
