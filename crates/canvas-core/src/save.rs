//! Save policy engine
//!
//! Routes direct edits to the version log:
//! 1. resolve the most recent persisted version (none: no-op)
//! 2. compare the edit against its payload (unchanged: no-op)
//! 3. debounce or write immediately
//! 4. append an optimistic entry, then confirm or mark it failed
//!
//! A failed write keeps its optimistic entry and is reported on the failure
//! channel so a collaborator can offer [`SavePolicyEngine::retry`].

use crate::debounce::DebounceTimer;
use crate::error::CanvasError;
use canvas_artifact::{ArtifactContent, Authorship, DocumentId, DocumentVersion, NewVersion};
use canvas_gateway::{GatewayError, PersistenceGateway};
use canvas_history::{revalidate, SaveTicket, SharedHistory};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Transient indicator shown while writes are outstanding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    /// The last write settled and at least one save is awaiting retry
    Failed,
}

/// A rejected save, published for retry affordances
#[derive(Debug, Clone)]
pub struct SaveFailure {
    pub document_id: DocumentId,
    pub ticket: SaveTicket,
    pub error: GatewayError,
}

/// What a save request resulted in
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The document has no persisted version yet
    NoVersion,
    /// The payload equals the latest persisted version
    Unchanged,
    /// Deferred until the quiet period elapses
    Scheduled,
    /// Nothing was waiting on the debounce timer
    NothingPending,
    Saved(DocumentVersion),
}

enum Plan {
    Skip(SaveOutcome),
    Write(DocumentId, NewVersion),
}

struct SaveInner<G> {
    gateway: Arc<G>,
    history: SharedHistory,
    user_id: Option<String>,
    debounce: DebounceTimer<ArtifactContent>,
    status: watch::Sender<SaveStatus>,
    in_flight: AtomicUsize,
    failures_tx: mpsc::UnboundedSender<SaveFailure>,
    failures_rx: Mutex<Option<mpsc::UnboundedReceiver<SaveFailure>>>,
}

/// Idempotent, debounced writer for direct edits
pub struct SavePolicyEngine<G> {
    inner: Arc<SaveInner<G>>,
}

impl<G> Clone for SavePolicyEngine<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> std::fmt::Debug for SavePolicyEngine<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavePolicyEngine")
            .field("document_id", self.inner.history.read().document_id())
            .field("user_id", &self.inner.user_id)
            .field("pending", &self.inner.debounce.is_pending())
            .field("in_flight", &self.inner.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl<G: PersistenceGateway> SavePolicyEngine<G> {
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        history: SharedHistory,
        user_id: Option<String>,
        quiet_period: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SaveInner {
                gateway,
                history,
                user_id,
                debounce: DebounceTimer::new(quiet_period),
                status,
                in_flight: AtomicUsize::new(0),
                failures_tx,
                failures_rx: Mutex::new(Some(failures_rx)),
            }),
        }
    }

    /// Route an edited payload to the version log
    ///
    /// Identical payloads never produce a write. With `debounce`, bursts
    /// collapse into one write of the last payload after the quiet period.
    ///
    /// # Errors
    /// `Unauthenticated` when a changed payload has no session user;
    /// `SaveFailed` when an immediate write is rejected.
    pub async fn save_content(
        &self,
        content: ArtifactContent,
        debounce: bool,
    ) -> Result<SaveOutcome, CanvasError> {
        self.ensure_loaded().await?;
        let (document_id, request) = match self.plan(&content)? {
            Plan::Skip(outcome) => {
                if outcome == SaveOutcome::Unchanged && self.inner.debounce.cancel() {
                    tracing::debug!("edit reverted; dropped pending save");
                }
                return Ok(outcome);
            }
            Plan::Write(document_id, request) => (document_id, request),
        };

        if debounce {
            let engine = self.clone();
            self.inner.debounce.schedule(content, move |content| async move {
                if let Err(error) = engine.persist_if_changed(content).await {
                    tracing::warn!(%error, "debounced save failed");
                }
            });
            return Ok(SaveOutcome::Scheduled);
        }

        self.inner.debounce.cancel();
        self.write(document_id, request).await.map(SaveOutcome::Saved)
    }

    /// Write any debounced payload now
    ///
    /// # Errors
    /// Same as an immediate [`save_content`](Self::save_content)
    pub async fn flush(&self) -> Result<SaveOutcome, CanvasError> {
        match self.inner.debounce.flush() {
            Some(content) => {
                tracing::debug!("flushing pending save");
                self.persist_if_changed(content).await
            }
            None => Ok(SaveOutcome::NothingPending),
        }
    }

    /// Drop any debounced payload. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        self.inner.debounce.cancel()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.debounce.is_pending()
    }

    /// Resend a failed save
    ///
    /// Returns `Ok(None)` when `ticket` does not name a failed entry.
    ///
    /// # Errors
    /// `SaveFailed` if the log rejects the write again
    pub async fn retry(&self, ticket: SaveTicket) -> Result<Option<DocumentVersion>, CanvasError> {
        let Some(version) = self.inner.history.write().mark_pending(ticket) else {
            return Ok(None);
        };
        tracing::info!(document_id = %version.document_id, %ticket, "retrying save");
        let request = version.to_request();
        self.send(version.document_id, ticket, request).await.map(Some)
    }

    /// Subscribe to the saving indicator
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Take the failure receiver; `None` after the first call
    pub fn take_failures(&self) -> Option<mpsc::UnboundedReceiver<SaveFailure>> {
        self.inner.failures_rx.lock().take()
    }

    #[must_use]
    pub fn history(&self) -> &SharedHistory {
        &self.inner.history
    }

    async fn persist_if_changed(&self, content: ArtifactContent) -> Result<SaveOutcome, CanvasError> {
        self.ensure_loaded().await?;
        match self.plan(&content)? {
            Plan::Skip(outcome) => Ok(outcome),
            Plan::Write(document_id, request) => {
                self.write(document_id, request).await.map(SaveOutcome::Saved)
            }
        }
    }

    async fn ensure_loaded(&self) -> Result<(), CanvasError> {
        if !self.inner.history.read().is_loaded() {
            revalidate(&self.inner.history, self.inner.gateway.as_ref()).await?;
        }
        Ok(())
    }

    fn plan(&self, content: &ArtifactContent) -> Result<Plan, CanvasError> {
        let history = self.inner.history.read();
        let Some(latest) = history.latest_persisted() else {
            return Ok(Plan::Skip(SaveOutcome::NoVersion));
        };
        if latest.payload_matches(content) {
            return Ok(Plan::Skip(SaveOutcome::Unchanged));
        }
        let user_id = self
            .inner
            .user_id
            .as_deref()
            .ok_or(CanvasError::Unauthenticated)?;
        let request = NewVersion::from_content(
            latest.title.clone(),
            latest.kind,
            content.clone(),
            Authorship::human(user_id),
        )?;
        Ok(Plan::Write(history.document_id().clone(), request))
    }

    async fn write(
        &self,
        document_id: DocumentId,
        request: NewVersion,
    ) -> Result<DocumentVersion, CanvasError> {
        let optimistic = DocumentVersion::from_new(document_id.clone(), request.clone(), Utc::now());
        let ticket = self.inner.history.write().append_optimistic(optimistic);
        self.send(document_id, ticket, request).await
    }

    async fn send(
        &self,
        document_id: DocumentId,
        ticket: SaveTicket,
        request: NewVersion,
    ) -> Result<DocumentVersion, CanvasError> {
        self.begin();
        let result = self.inner.gateway.create_version(&document_id, request).await;
        let outcome = match result {
            Ok(stored) => {
                self.inner.history.write().confirm(ticket, stored.clone());
                tracing::info!(
                    document_id = %document_id,
                    %ticket,
                    created_at = %stored.created_at,
                    "version saved"
                );
                Ok(stored)
            }
            Err(error) => {
                self.inner.history.write().mark_failed(ticket);
                tracing::warn!(document_id = %document_id, %ticket, %error, "save failed");
                let _ = self.inner.failures_tx.send(SaveFailure {
                    document_id,
                    ticket,
                    error: error.clone(),
                });
                Err(CanvasError::SaveFailed { ticket, source: error })
            }
        };
        self.end();
        outcome
    }

    fn begin(&self) {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.status.send_replace(SaveStatus::Saving);
    }

    fn end(&self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            let failed = !self.inner.history.read().failed_entries().is_empty();
            self.inner
                .status
                .send_replace(if failed { SaveStatus::Failed } else { SaveStatus::Idle });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_artifact::ArtifactKind;
    use canvas_gateway::InMemoryGateway;
    use canvas_history::{shared, VersionHistory};
    use serde_json::json;

    async fn seeded(kind: ArtifactKind, content: ArtifactContent) -> (Arc<InMemoryGateway>, SharedHistory) {
        let gateway = Arc::new(InMemoryGateway::new());
        let id = DocumentId::new("doc-1");
        let request = NewVersion::from_content("Notes", kind, content, Authorship::machine("u1")).unwrap();
        gateway.create_version(&id, request).await.unwrap();
        (gateway, shared(VersionHistory::new(id)))
    }

    fn engine(gateway: &Arc<InMemoryGateway>, history: &SharedHistory) -> SavePolicyEngine<InMemoryGateway> {
        SavePolicyEngine::new(
            Arc::clone(gateway),
            Arc::clone(history),
            Some("u1".into()),
            Duration::from_millis(2000),
        )
    }

    #[tokio::test]
    async fn identical_string_saves_write_once() {
        let (gateway, history) = seeded(ArtifactKind::PlainText, ArtifactContent::text("a")).await;
        let engine = engine(&gateway, &history);
        let id = DocumentId::new("doc-1");

        let first = engine.save_content(ArtifactContent::text("b"), false).await.unwrap();
        assert!(matches!(first, SaveOutcome::Saved(_)));
        let second = engine.save_content(ArtifactContent::text("b"), false).await.unwrap();
        assert_eq!(second, SaveOutcome::Unchanged);
        assert_eq!(gateway.version_count(&id), 2);
    }

    #[tokio::test]
    async fn identical_structured_saves_write_once() {
        let tree = json!({"type": "doc", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "hi"}]}]});
        let (gateway, history) = seeded(ArtifactKind::RichText, ArtifactContent::empty_tree()).await;
        let engine = engine(&gateway, &history);

        for _ in 0..2 {
            engine
                .save_content(ArtifactContent::Structured(tree.clone()), false)
                .await
                .unwrap();
        }
        assert_eq!(gateway.version_count(&DocumentId::new("doc-1")), 2);
    }

    #[tokio::test]
    async fn no_version_is_a_no_op() {
        let gateway = Arc::new(InMemoryGateway::new());
        let history = shared(VersionHistory::new(DocumentId::new("fresh")));
        let engine = engine(&gateway, &history);

        let outcome = engine.save_content(ArtifactContent::text("x"), false).await.unwrap();
        assert_eq!(outcome, SaveOutcome::NoVersion);
        assert!(history.read().is_loaded());
    }

    #[tokio::test]
    async fn unauthenticated_changed_save_is_rejected() {
        let (gateway, history) = seeded(ArtifactKind::Code, ArtifactContent::text("a")).await;
        let engine = SavePolicyEngine::new(gateway, history, None, Duration::from_millis(10));

        let err = engine.save_content(ArtifactContent::text("b"), false).await.unwrap_err();
        assert!(matches!(err, CanvasError::Unauthenticated));
    }

    #[tokio::test]
    async fn saved_version_is_human_authored_and_confirmed() {
        let (gateway, history) = seeded(ArtifactKind::PlainText, ArtifactContent::text("a")).await;
        let engine = engine(&gateway, &history);

        let SaveOutcome::Saved(stored) = engine.save_content(ArtifactContent::text("b"), false).await.unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(stored.author, Authorship::human("u1"));
        assert_eq!(stored.title, "Notes");

        let guard = history.read();
        assert_eq!(guard.pending_count(), 0);
        assert_eq!(guard.latest().unwrap().version, stored);
        assert_eq!(*engine.status().borrow(), SaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_payload() {
        let (gateway, history) = seeded(ArtifactKind::PlainText, ArtifactContent::text("a")).await;
        let engine = engine(&gateway, &history);

        let outcome = engine.save_content(ArtifactContent::text("draft"), true).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Scheduled);
        assert!(engine.is_pending());

        let SaveOutcome::Saved(stored) = engine.flush().await.unwrap() else {
            panic!("expected flush to write");
        };
        assert_eq!(stored.content.as_deref(), Some("draft"));
        assert_eq!(engine.flush().await.unwrap(), SaveOutcome::NothingPending);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(gateway.version_count(&DocumentId::new("doc-1")), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reverting_edit_cancels_pending_save() {
        let (gateway, history) = seeded(ArtifactKind::PlainText, ArtifactContent::text("a")).await;
        let engine = engine(&gateway, &history);

        engine.save_content(ArtifactContent::text("ab"), true).await.unwrap();
        let outcome = engine.save_content(ArtifactContent::text("a"), true).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert!(!engine.is_pending());

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(gateway.version_count(&DocumentId::new("doc-1")), 1);
    }

    #[tokio::test]
    async fn payload_for_wrong_kind_is_an_artifact_error() {
        let (gateway, history) = seeded(ArtifactKind::Code, ArtifactContent::text("a")).await;
        let engine = engine(&gateway, &history);

        let err = engine
            .save_content(ArtifactContent::empty_tree(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvasError::Artifact(_)));
        assert_eq!(history.read().len(), 1);
    }
}
