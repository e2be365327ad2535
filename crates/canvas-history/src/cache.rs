//! Shared history handle and server revalidation

use crate::history::VersionHistory;
use canvas_gateway::{GatewayError, PersistenceGateway};
use parking_lot::RwLock;
use std::sync::Arc;

/// History shared between the session, the save engine and debounce tasks
///
/// Read-mostly; written only by optimistic appends and revalidation.
pub type SharedHistory = Arc<RwLock<VersionHistory>>;

/// Wrap a history for sharing
#[inline]
#[must_use]
pub fn shared(history: VersionHistory) -> SharedHistory {
    Arc::new(RwLock::new(history))
}

/// Refetch the version list and reconcile it into `history`
///
/// Unbound documents are skipped. A listing that comes back after the history
/// was rebound to another document is discarded. Returns the entry count.
///
/// # Errors
/// Returns the gateway error if listing fails; the history is left untouched.
pub async fn revalidate<G>(history: &SharedHistory, gateway: &G) -> Result<usize, GatewayError>
where
    G: PersistenceGateway + ?Sized,
{
    let document_id = history.read().document_id().clone();
    if !document_id.is_initialized() {
        return Ok(0);
    }

    let versions = gateway.list_versions(&document_id).await?;

    let mut guard = history.write();
    if guard.document_id() != &document_id {
        tracing::debug!(
            stale = %document_id,
            current = %guard.document_id(),
            "discarding revalidation for rebound history"
        );
        return Ok(guard.len());
    }
    guard.reconcile(versions);
    tracing::debug!(document_id = %document_id, versions = guard.len(), "history revalidated");
    Ok(guard.len())
}
