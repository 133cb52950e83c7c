use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a cart process instance.
///
/// Cart identifiers double as process (workflow) identifiers, so they are
/// free-form strings chosen by the caller. Generated identifiers follow the
/// `CART-<uuid>` convention used by the front door.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(String);

impl CartId {
    /// Prefix used for generated identifiers.
    pub const PREFIX: &'static str = "CART-";

    /// Creates a cart ID from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique cart ID.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CartId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CartId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
