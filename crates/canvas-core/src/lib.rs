//! Canvas Core - artifact session engine
//!
//! The pieces that sit between a generation backend and a version log:
//! - Folds streamed deltas into the live artifact exactly once
//! - Navigates and reconciles the version history
//! - Debounces and deduplicates direct-edit saves with optimistic updates
//! - Dispatches create/update generations to one handler per kind
//!
//! # Example
//!
//! ```rust,ignore
//! use canvas_core::prelude::*;
//! use canvas_gateway::InMemoryGateway;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), CanvasError> {
//! let config = CanvasConfig::new().with_user("u1");
//! let gateway = Arc::new(InMemoryGateway::new());
//! let open = OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::PlainText, "");
//! let mut session = ArtifactSession::open(open, gateway, &config).await?;
//!
//! session.push_delta(DeltaEvent::TextDelta("hello".into())).await?;
//! session.push_delta(DeltaEvent::Finish).await?;
//! let state = session.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod consumer;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod save;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use config::{CanvasConfig, RevealWindow};
pub use consumer::{DeltaStreamConsumer, FoldOutcome, SideEffect, StreamOutbox};
pub use debounce::DebounceTimer;
pub use dispatch::{
    CreateContext, CreateDocumentRequest, DeltaWriter, DispatchOutcome, DocumentDispatcher,
    DocumentHandler, Draft, GenerationSession, HandlerRegistry, UpdateContext,
    UpdateDocumentRequest,
};
pub use error::{CanvasError, DispatchError, GenerationError};
pub use save::{SaveFailure, SaveOutcome, SavePolicyEngine, SaveStatus};
pub use session::{ArtifactSession, OpenArtifact};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the canvas engine
    pub use crate::{
        ArtifactSession, CanvasConfig, CanvasError, DocumentDispatcher, DocumentHandler, Draft,
        GenerationSession, OpenArtifact, SaveOutcome, SaveStatus,
    };
    pub use canvas_artifact::{
        ArtifactContent, ArtifactKind, ArtifactState, ArtifactStatus, DeltaEvent, DocumentId,
    };
    pub use canvas_history::{DisplayMode, VersionAction};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
