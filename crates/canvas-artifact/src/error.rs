//! Errors for the artifact model

use crate::kind::{ArtifactKind, Representation};

/// Errors related to artifact kinds and content
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// No kind is registered under this name
    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),

    /// Content representation does not fit the kind
    #[error("{found} content is not valid for kind {kind}")]
    RepresentationMismatch {
        kind: ArtifactKind,
        found: Representation,
    },

    /// A delta cannot be applied to the current content representation
    #[error("stream contract violation: {event} cannot apply to {kind} content")]
    StreamContractViolation {
        event: &'static str,
        kind: ArtifactKind,
    },
}

impl ArtifactError {
    /// Check if error signals a registry/configuration mismatch
    #[inline]
    #[must_use]
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, Self::UnknownKind(_))
    }
}
