//! Gateway errors

use canvas_artifact::{ArtifactKind, DocumentId};

/// Errors raised by a version log
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Versions cannot be written before a stream binds a real document id
    #[error("cannot persist a version for unbound document id '{0}'")]
    UnboundDocument(DocumentId),

    /// Request lacks the authoritative payload column for its kind
    #[error("version for kind {kind} is missing its payload")]
    MissingPayload { kind: ArtifactKind },

    /// Storage backend unreachable or rejecting writes
    #[error("version log unavailable: {0}")]
    Unavailable(String),

    /// Request timed out
    #[error("version log request timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl GatewayError {
    /// Check if the failure may succeed on retry
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
