//! Error types for the canvas engine
//!
//! Failure classes and how they propagate:
//! - Stream contract violations are logged and dropped inside the consumer
//!   and never reach these types
//! - Persistence failures are retryable and keep optimistic state
//! - Unknown artifact kinds are fatal for the artifact instance
//! - Out-of-range navigation is clamped and never raised

use canvas_artifact::{ArtifactError, ArtifactKind};
use canvas_gateway::GatewayError;
use canvas_history::SaveTicket;

/// Main canvas error type
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    /// No handler or viewer exists for the kind
    #[error("unknown artifact kind: {0}")]
    UnknownArtifactKind(String),

    /// Content or kind rule violated
    #[error("artifact error: {0}")]
    Artifact(ArtifactError),

    /// Version log call failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] GatewayError),

    /// An optimistic save was rejected; the entry is kept for retry
    #[error("save {ticket} failed: {source}")]
    SaveFailed {
        ticket: SaveTicket,
        #[source]
        source: GatewayError,
    },

    /// Generation or dispatch failed
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Saving requires a session user
    #[error("saving requires an authenticated session user")]
    Unauthenticated,

    /// The session was closed
    #[error("artifact session is closed")]
    Closed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl CanvasError {
    /// Check if error may succeed on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(e) | Self::SaveFailed { source: e, .. } => e.is_transient(),
            Self::Dispatch(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if error must abort the artifact rather than be retried
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::UnknownArtifactKind(_) | Self::Config(_) => true,
            Self::Dispatch(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<ArtifactError> for CanvasError {
    fn from(error: ArtifactError) -> Self {
        match error {
            ArtifactError::UnknownKind(name) => Self::UnknownArtifactKind(name),
            other => Self::Artifact(other),
        }
    }
}

/// Failure inside a generator backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Backend returned an error
    #[error("generation backend failed: {0}")]
    Backend(String),

    /// Request was cancelled upstream
    #[error("generation cancelled")]
    Cancelled,
}

/// Document handler dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Kind name has no registered handler
    #[error("no handler registered for artifact kind: {0}")]
    UnknownArtifactKind(String),

    /// A handler was registered under the wrong kind
    #[error("handler for {handler} registered under {slot}")]
    KindMismatch {
        slot: ArtifactKind,
        handler: ArtifactKind,
    },

    /// Generator returned a draft that does not fit the kind
    #[error("draft does not fit kind {kind}")]
    DraftMismatch { kind: ArtifactKind },

    /// Generator failed
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Persisting the generated version failed
    #[error("persisting generated version failed: {0}")]
    Persistence(#[from] GatewayError),

    /// Content rule violated
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

impl DispatchError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(GenerationError::Backend(_)) => true,
            Self::Persistence(e) => e.is_transient(),
            _ => false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownArtifactKind(_)
                | Self::KindMismatch { .. }
                | Self::Artifact(ArtifactError::UnknownKind(_))
        )
    }
}
