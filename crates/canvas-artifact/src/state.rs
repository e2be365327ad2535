//! Artifact state store
//!
//! [`ArtifactState`] is the one in-memory record for the currently open
//! artifact. Content is private so that its representation can never drift
//! from the kind.

use crate::content::ArtifactContent;
use crate::error::ArtifactError;
use crate::id::DocumentId;
use crate::kind::ArtifactKind;
use serde::{Deserialize, Serialize};

/// Generation status of the open artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// No generation in progress
    #[default]
    Idle,
    /// Deltas are arriving
    Streaming,
}

/// Live record of the open artifact
///
/// # Invariants
/// - `content` always has the representation required by `kind`
/// - `visible` only ever moves from `false` to `true` while the record lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactState {
    pub document_id: DocumentId,
    pub title: String,
    kind: ArtifactKind,
    content: ArtifactContent,
    status: ArtifactStatus,
    visible: bool,
}

impl ArtifactState {
    /// Fresh state with the kind's default content
    #[must_use]
    pub fn new(document_id: DocumentId, kind: ArtifactKind, title: impl Into<String>) -> Self {
        Self {
            document_id,
            title: title.into(),
            kind,
            content: kind.default_content(),
            status: ArtifactStatus::Idle,
            visible: false,
        }
    }

    /// State for an artifact opened with existing content
    ///
    /// Content whose representation does not fit `kind` is discarded in favour
    /// of the kind default.
    #[must_use]
    pub fn open(
        document_id: DocumentId,
        kind: ArtifactKind,
        title: impl Into<String>,
        content: Option<ArtifactContent>,
        status: ArtifactStatus,
    ) -> Self {
        let mut state = Self::new(document_id, kind, title);
        if let Some(content) = content {
            if content.matches(kind) {
                state.content = content;
            }
        }
        state.status = status;
        state
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &ArtifactContent {
        &self.content
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.status == ArtifactStatus::Streaming
    }

    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Change kind
    ///
    /// Content is kept when the representation is unchanged; otherwise it is
    /// re-derived from the new kind's default. Returns `true` if the content
    /// was re-derived.
    pub fn set_kind(&mut self, kind: ArtifactKind) -> bool {
        let rederive = kind.representation() != self.kind.representation();
        self.kind = kind;
        if rederive {
            self.content = kind.default_content();
        }
        rederive
    }

    /// Replace content wholesale
    ///
    /// # Errors
    /// Returns error if `content` does not fit the current kind
    pub fn replace_content(&mut self, content: ArtifactContent) -> Result<(), ArtifactError> {
        if !content.matches(self.kind) {
            return Err(ArtifactError::RepresentationMismatch {
                kind: self.kind,
                found: content.representation(),
            });
        }
        self.content = content;
        Ok(())
    }

    /// Append to string content, returning the new length in characters
    ///
    /// # Errors
    /// Returns error if the content is structured
    pub fn append_text(&mut self, delta: &str) -> Result<usize, ArtifactError> {
        match &mut self.content {
            ArtifactContent::Text(text) => {
                text.push_str(delta);
                Ok(text.chars().count())
            }
            ArtifactContent::Structured(_) => Err(self.mismatch()),
        }
    }

    /// Replace string content, returning the new length in characters
    ///
    /// # Errors
    /// Returns error if the content is structured
    pub fn replace_text(&mut self, text: impl Into<String>) -> Result<usize, ArtifactError> {
        match &mut self.content {
            ArtifactContent::Text(current) => {
                *current = text.into();
                Ok(current.chars().count())
            }
            ArtifactContent::Structured(_) => Err(self.mismatch()),
        }
    }

    /// Reset content to the kind's empty value
    pub fn clear(&mut self) {
        self.content = self.kind.default_content();
    }

    /// Enter `streaming`, returning `true` on a transition
    pub fn begin_streaming(&mut self) -> bool {
        let changed = self.status != ArtifactStatus::Streaming;
        self.status = ArtifactStatus::Streaming;
        changed
    }

    /// Enter `idle`, returning `true` on a transition
    pub fn finish(&mut self) -> bool {
        let changed = self.status != ArtifactStatus::Idle;
        self.status = ArtifactStatus::Idle;
        changed
    }

    /// Make the artifact visible, returning `true` the first time
    pub fn reveal(&mut self) -> bool {
        let changed = !self.visible;
        self.visible = true;
        changed
    }

    fn mismatch(&self) -> ArtifactError {
        ArtifactError::RepresentationMismatch {
            kind: self.kind,
            found: self.content.representation(),
        }
    }
}
