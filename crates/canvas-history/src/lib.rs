//! Canvas Version History
//!
//! Ordered version snapshots for a document, the navigation pointer used by
//! version footers, and the reducer that merges optimistic local saves with
//! server-confirmed rows.
//!
//! # Example
//!
//! ```rust
//! use canvas_artifact::DocumentId;
//! use canvas_history::{VersionAction, VersionHistory};
//!
//! let mut history = VersionHistory::new(DocumentId::new("doc-1"));
//! history.reconcile(Vec::new());
//! assert!(history.is_current_version());
//! assert!(!history.change_version(VersionAction::Prev));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod history;
mod navigation;

pub use cache::{revalidate, shared, SharedHistory};
pub use history::{EntryOrigin, SaveTicket, VersionEntry, VersionHistory};
pub use navigation::{DisplayMode, UnknownAction, VersionAction};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
