//! Document identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by every version of one logical artifact
///
/// A generation stream starts out on the `"init"` sentinel until its
/// `set-id` event binds it to a real document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Sentinel used before a stream is bound to a document
    pub const UNINITIALIZED: &'static str = "init";

    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The unbound sentinel
    #[inline]
    #[must_use]
    pub fn uninitialized() -> Self {
        Self(Self::UNINITIALIZED.to_string())
    }

    /// Whether this id refers to a real document
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.0.is_empty() && self.0 != Self::UNINITIALIZED
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
