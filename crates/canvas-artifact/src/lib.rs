//! Canvas Artifact Model
//!
//! Kind-aware content, the live artifact record and the persisted version rows
//! that every other canvas crate builds on.
//!
//! # Core Concepts
//!
//! - [`ArtifactKind`]: Closed set of artifact kinds (plain text, rich text, code, image, tabular)
//! - [`ArtifactContent`]: Opaque string or structured tree, chosen by kind
//! - [`ArtifactState`]: The single in-memory record for the open artifact
//! - [`DocumentVersion`]: Immutable, timestamped snapshot in the version log
//! - [`DeltaEvent`]: One unit of a generation stream
//!
//! # Example
//!
//! ```rust
//! use canvas_artifact::{ArtifactKind, ArtifactState, DocumentId};
//!
//! let state = ArtifactState::new(DocumentId::new("doc-1"), ArtifactKind::RichText, "Notes");
//! assert!(state.content().as_tree().is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod content;
mod delta;
mod error;
mod id;
mod kind;
mod state;
mod version;

// Re-exports
pub use content::ArtifactContent;
pub use delta::{DeltaEvent, Suggestion};
pub use error::ArtifactError;
pub use id::DocumentId;
pub use kind::{ArtifactKind, KindTable, Representation};
pub use state::{ArtifactState, ArtifactStatus};
pub use version::{Authorship, DocumentVersion, NewVersion};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
