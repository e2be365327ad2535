//! Persisted document versions
//!
//! Versions are immutable rows in an append-only log keyed by
//! [`DocumentId`]; `created_at` doubles as the ordering key.

use crate::content::{flatten_tree, ArtifactContent};
use crate::error::ArtifactError;
use crate::id::DocumentId;
use crate::kind::{ArtifactKind, Representation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a version
///
/// `author_id == None` marks a machine-authored version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorship {
    pub user_id: String,
    pub author_id: Option<String>,
}

impl Authorship {
    /// Version written by a human edit
    #[inline]
    #[must_use]
    pub fn human(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            author_id: Some(user_id.clone()),
            user_id,
        }
    }

    /// Version written by a generator on behalf of `user_id`
    #[inline]
    #[must_use]
    pub fn machine(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            author_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_machine_authored(&self) -> bool {
        self.author_id.is_none()
    }
}

/// Payload sent to the version log
///
/// Exactly one of `content` / `content_json` is authoritative for the kind.
/// Rich-text requests also carry a flattened `content` projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersion {
    pub title: String,
    pub kind: ArtifactKind,
    pub content: Option<String>,
    pub content_json: Option<Value>,
    #[serde(flatten)]
    pub author: Authorship,
}

impl NewVersion {
    /// Build a request from kind-checked content
    ///
    /// # Errors
    /// Returns error if `content` does not fit `kind`
    pub fn from_content(
        title: impl Into<String>,
        kind: ArtifactKind,
        content: ArtifactContent,
        author: Authorship,
    ) -> Result<Self, ArtifactError> {
        if !content.matches(kind) {
            return Err(ArtifactError::RepresentationMismatch {
                kind,
                found: content.representation(),
            });
        }
        let (content, content_json) = match content {
            ArtifactContent::Text(text) => (Some(text), None),
            ArtifactContent::Structured(tree) => (Some(flatten_tree(&tree)), Some(tree)),
        };
        Ok(Self {
            title: title.into(),
            kind,
            content,
            content_json,
            author,
        })
    }

    /// Rich-text request with an explicit string projection
    #[must_use]
    pub fn structured(
        title: impl Into<String>,
        projection: impl Into<String>,
        tree: Value,
        author: Authorship,
    ) -> Self {
        Self {
            title: title.into(),
            kind: ArtifactKind::RichText,
            content: Some(projection.into()),
            content_json: Some(tree),
            author,
        }
    }

    /// Authoritative payload for the kind
    #[must_use]
    pub fn payload(&self) -> Option<ArtifactContent> {
        authoritative(self.kind, self.content.as_ref(), self.content_json.as_ref())
    }
}

/// Immutable snapshot in the version log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub document_id: DocumentId,
    pub title: String,
    pub kind: ArtifactKind,
    pub content: Option<String>,
    pub content_json: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub author: Authorship,
}

impl DocumentVersion {
    /// Materialise a request as a row
    #[must_use]
    pub fn from_new(document_id: DocumentId, request: NewVersion, created_at: DateTime<Utc>) -> Self {
        Self {
            document_id,
            title: request.title,
            kind: request.kind,
            content: request.content,
            content_json: request.content_json,
            created_at,
            author: request.author,
        }
    }

    /// Authoritative payload for the kind
    #[must_use]
    pub fn payload(&self) -> Option<ArtifactContent> {
        authoritative(self.kind, self.content.as_ref(), self.content_json.as_ref())
    }

    /// Whether `candidate` equals this version's payload
    ///
    /// Strict equality for strings, deep equality for trees.
    #[must_use]
    pub fn payload_matches(&self, candidate: &ArtifactContent) -> bool {
        match (self.kind.representation(), candidate) {
            (Representation::Opaque, ArtifactContent::Text(text)) => {
                self.content.as_deref() == Some(text.as_str())
            }
            (Representation::Structured, ArtifactContent::Structured(tree)) => {
                self.content_json.as_ref() == Some(tree)
            }
            _ => false,
        }
    }

    /// Request that would recreate this row's payload
    #[must_use]
    pub fn to_request(&self) -> NewVersion {
        NewVersion {
            title: self.title.clone(),
            kind: self.kind,
            content: self.content.clone(),
            content_json: self.content_json.clone(),
            author: self.author.clone(),
        }
    }
}

fn authoritative(
    kind: ArtifactKind,
    content: Option<&String>,
    content_json: Option<&Value>,
) -> Option<ArtifactContent> {
    match kind.representation() {
        Representation::Opaque => content.cloned().map(ArtifactContent::Text),
        Representation::Structured => content_json.cloned().map(ArtifactContent::Structured),
    }
}
