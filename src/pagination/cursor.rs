use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque resume token marking the boundary between delivered and undelivered items
///
/// The initial cursor is empty. Sources must treat a cursor as "items strictly
/// after this position".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Cursor that starts iteration from the beginning of the source
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_cursor_is_empty() {
        assert!(Cursor::initial().is_initial());
        assert!(!Cursor::from("order-42").is_initial());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Cursor::new("retry-7")).unwrap();
        assert_eq!(json, "\"retry-7\"");
    }
}
