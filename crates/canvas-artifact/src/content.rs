//! Artifact content
//!
//! [`ArtifactContent`] is either an opaque string or a structured document
//! tree. Which one is legal is decided by the artifact kind.

use crate::kind::{ArtifactKind, Representation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Content of an artifact or version
///
/// Equality is strict for strings and deep for trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactContent {
    /// Opaque string (plain text, code, image reference, CSV)
    Text(String),
    /// Structured document tree (rich text)
    Structured(Value),
}

impl ArtifactContent {
    /// Text content
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Empty string
    #[inline]
    #[must_use]
    pub fn empty_text() -> Self {
        Self::Text(String::new())
    }

    /// Minimal empty document tree
    #[inline]
    #[must_use]
    pub fn empty_tree() -> Self {
        Self::Structured(json!({ "type": "doc", "content": [] }))
    }

    /// Representation of this value
    #[inline]
    #[must_use]
    pub fn representation(&self) -> Representation {
        match self {
            Self::Text(_) => Representation::Opaque,
            Self::Structured(_) => Representation::Structured,
        }
    }

    /// Whether this value is a legal payload for `kind`
    #[inline]
    #[must_use]
    pub fn matches(&self, kind: ArtifactKind) -> bool {
        self.representation() == kind.representation()
    }

    /// String payload, if opaque
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Tree payload, if structured
    #[inline]
    #[must_use]
    pub fn as_tree(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Structured(tree) => Some(tree),
        }
    }

    /// Length in characters of the flattened content
    #[must_use]
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Structured(_) => self.flatten().chars().count(),
        }
    }

    /// Whether there is nothing to show
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Structured(_) => self.flatten().is_empty(),
        }
    }

    /// Plain-text projection used for previews and search
    ///
    /// Top-level blocks of a `doc` tree are joined with newlines; inline
    /// `text` leaves are concatenated.
    #[must_use]
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(tree) => flatten_tree(tree),
        }
    }
}

impl Default for ArtifactContent {
    fn default() -> Self {
        Self::empty_text()
    }
}

impl From<String> for ArtifactContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ArtifactContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub(crate) fn flatten_tree(tree: &Value) -> String {
    let is_doc = tree.get("type").and_then(Value::as_str) == Some("doc");
    match tree.get("content").and_then(Value::as_array) {
        Some(blocks) if is_doc => blocks
            .iter()
            .map(|block| {
                let mut out = String::new();
                collect_text(block, &mut out);
                out
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => {
            let mut out = String::new();
            collect_text(tree, &mut out);
            out
        }
    }
}

fn collect_text(node: &Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_text(child, out);
        }
    }
}
