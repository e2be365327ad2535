//! Canvas Persistence Gateway
//!
//! The narrow contract the engine uses to talk to the append-only version
//! log, plus [`InMemoryGateway`], a reference log used by tests and the CLI.
//!
//! # Contract
//!
//! - `list_versions` returns every version of a document ordered ascending by
//!   `created_at`
//! - `create_version` always appends; it never updates a row in place
//! - the current version of a document is the row with the greatest
//!   `created_at`

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod memory;

pub use error::GatewayError;
pub use memory::InMemoryGateway;

use async_trait::async_trait;
use canvas_artifact::{DocumentId, DocumentVersion, NewVersion};
use std::sync::Arc;

/// Append-only version log
#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
    /// All versions of a document, oldest first
    ///
    /// An unknown document yields an empty list.
    async fn list_versions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentVersion>, GatewayError>;

    /// Append a new version and return the stored row
    async fn create_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> Result<DocumentVersion, GatewayError>;

    /// Current version of a document
    async fn latest_version(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<DocumentVersion>, GatewayError> {
        let versions = self.list_versions(document_id).await?;
        Ok(versions.into_iter().max_by_key(|v| v.created_at))
    }
}

#[async_trait]
impl<G: PersistenceGateway + ?Sized> PersistenceGateway for Arc<G> {
    async fn list_versions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentVersion>, GatewayError> {
        (**self).list_versions(document_id).await
    }

    async fn create_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> Result<DocumentVersion, GatewayError> {
        (**self).create_version(document_id, version).await
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
