//! Per-artifact session handle
//!
//! An [`ArtifactSession`] is created when an artifact opens and torn down by
//! [`ArtifactSession::close`]. It owns the live [`ArtifactState`] and wires
//! the delta consumer, the version history and the save engine together.
//! Nothing here is process-wide; two sessions never share state.

use crate::config::CanvasConfig;
use crate::consumer::{DeltaStreamConsumer, FoldOutcome, StreamOutbox};
use crate::error::CanvasError;
use crate::save::{SaveFailure, SaveOutcome, SavePolicyEngine, SaveStatus};
use canvas_artifact::{
    ArtifactContent, ArtifactKind, ArtifactState, ArtifactStatus, DeltaEvent, DocumentId,
    DocumentVersion,
};
use canvas_gateway::PersistenceGateway;
use canvas_history::{
    revalidate, shared, DisplayMode, SaveTicket, SharedHistory, VersionAction, VersionHistory,
};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Parameters for opening an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct OpenArtifact {
    pub document_id: DocumentId,
    pub kind: ArtifactKind,
    pub title: String,
    /// Initial content; `None` or a mismatched representation opens with the kind default
    pub content: Option<ArtifactContent>,
    pub status: ArtifactStatus,
}

impl OpenArtifact {
    #[must_use]
    pub fn new(document_id: DocumentId, kind: ArtifactKind, title: impl Into<String>) -> Self {
        Self {
            document_id,
            kind,
            title: title.into(),
            content: None,
            status: ArtifactStatus::Idle,
        }
    }

    /// With initial content
    #[inline]
    #[must_use]
    pub fn with_content(mut self, content: ArtifactContent) -> Self {
        self.content = Some(content);
        self
    }

    /// With initial status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ArtifactStatus) -> Self {
        self.status = status;
        self
    }
}

/// Live handle for one open artifact
#[derive(Debug)]
pub struct ArtifactSession<G> {
    state: ArtifactState,
    consumer: DeltaStreamConsumer,
    history: SharedHistory,
    saver: SavePolicyEngine<G>,
    gateway: Arc<G>,
    closed: bool,
}

impl<G: PersistenceGateway> ArtifactSession<G> {
    /// Open an artifact and load its history
    ///
    /// # Errors
    /// `Persistence` if the initial history load fails
    pub async fn open(
        request: OpenArtifact,
        gateway: Arc<G>,
        config: &CanvasConfig,
    ) -> Result<Self, CanvasError> {
        let OpenArtifact {
            document_id,
            kind,
            title,
            content,
            status,
        } = request;
        if content.as_ref().is_some_and(|c| !c.matches(kind)) {
            tracing::warn!(document_id = %document_id, %kind, "opened with mismatched content; using default");
        }
        let state = ArtifactState::open(document_id.clone(), kind, title, content, status);
        let history = shared(VersionHistory::new(document_id.clone()));
        if document_id.is_initialized() {
            revalidate(&history, gateway.as_ref()).await?;
        }
        let saver = SavePolicyEngine::new(
            Arc::clone(&gateway),
            Arc::clone(&history),
            config.user_id.clone(),
            config.save_debounce(),
        );
        tracing::debug!(document_id = %document_id, %kind, "artifact opened");

        Ok(Self {
            state,
            consumer: DeltaStreamConsumer::new(config),
            history,
            saver,
            gateway,
            closed: false,
        })
    }

    /// With side-effect outbox for suggestions and correlation ids
    #[must_use]
    pub fn with_outbox(mut self, outbox: StreamOutbox) -> Self {
        self.consumer = self.consumer.with_outbox(outbox);
        self
    }

    /// Fold the unprocessed suffix of the observed delta sequence
    ///
    /// A `set-id` rebinds the history to the new document after flushing any
    /// pending save for the old one. A status transition on a bound document
    /// refreshes the history once.
    ///
    /// # Errors
    /// `Persistence` if the refresh fails; the fold itself is already applied
    pub async fn ingest(&mut self, events: &[DeltaEvent]) -> Result<FoldOutcome, CanvasError> {
        let bound = self.state.document_id.clone();
        let outcome = self.consumer.consume(&mut self.state, events);
        self.settle(bound, outcome).await?;
        Ok(outcome)
    }

    /// Fold a single event as it arrives
    ///
    /// # Errors
    /// Same as [`ingest`](Self::ingest)
    pub async fn push_delta(&mut self, event: DeltaEvent) -> Result<FoldOutcome, CanvasError> {
        let bound = self.state.document_id.clone();
        let outcome = self.consumer.push(&mut self.state, event);
        self.settle(bound, outcome).await?;
        Ok(outcome)
    }

    /// Drain a delta stream until it ends
    ///
    /// # Errors
    /// Stops at the first refresh failure
    pub async fn ingest_stream<S>(&mut self, mut stream: S) -> Result<FoldOutcome, CanvasError>
    where
        S: Stream<Item = DeltaEvent> + Unpin,
    {
        let mut total = FoldOutcome::default();
        while let Some(event) = stream.next().await {
            total += self.push_delta(event).await?;
        }
        Ok(total)
    }

    /// Drain a generation channel until every writer is dropped
    ///
    /// # Errors
    /// Stops at the first refresh failure
    pub async fn ingest_channel(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<DeltaEvent>,
    ) -> Result<FoldOutcome, CanvasError> {
        let mut total = FoldOutcome::default();
        while let Some(event) = rx.recv().await {
            total += self.push_delta(event).await?;
        }
        Ok(total)
    }

    async fn settle(&mut self, bound: DocumentId, outcome: FoldOutcome) -> Result<(), CanvasError> {
        if self.state.document_id != bound {
            self.rebind(bound).await;
        }
        if outcome.status_changed && self.state.document_id.is_initialized() {
            self.refresh().await?;
        }
        Ok(())
    }

    async fn rebind(&mut self, previous: DocumentId) {
        if let Err(error) = self.saver.flush().await {
            tracing::warn!(document_id = %previous, %error, "pending save failed during rebind");
        }
        self.history.write().rebind(self.state.document_id.clone());
        tracing::debug!(from = %previous, to = %self.state.document_id, "session rebound");
    }

    /// Refetch the version list
    ///
    /// # Errors
    /// `Persistence` if listing fails
    pub async fn refresh(&self) -> Result<usize, CanvasError> {
        Ok(revalidate(&self.history, self.gateway.as_ref()).await?)
    }

    /// Apply a direct edit and route it to the save engine
    ///
    /// The edit stays in the live state even if saving fails.
    ///
    /// # Errors
    /// `Closed` after [`close`](Self::close); `Artifact` if the content does
    /// not fit the kind; otherwise any save engine error
    pub async fn on_save_content(
        &mut self,
        content: ArtifactContent,
        debounce: bool,
    ) -> Result<SaveOutcome, CanvasError> {
        if self.closed {
            return Err(CanvasError::Closed);
        }
        self.state.replace_content(content.clone())?;
        self.saver.save_content(content, debounce).await
    }

    /// Resend a failed save
    ///
    /// # Errors
    /// `SaveFailed` if the write is rejected again
    pub async fn retry(&self, ticket: SaveTicket) -> Result<Option<DocumentVersion>, CanvasError> {
        self.saver.retry(ticket).await
    }

    /// Apply a navigation action; returns `true` if anything moved
    pub fn change_version(&self, action: VersionAction) -> bool {
        self.history.write().change_version(action)
    }

    /// Content to show: live while current, otherwise the selected version
    #[must_use]
    pub fn display_content(&self) -> ArtifactContent {
        self.history.read().display_content(&self.state)
    }

    /// `(previous, selected)` payloads for diff mode
    #[must_use]
    pub fn diff_pair(&self) -> Option<(ArtifactContent, ArtifactContent)> {
        self.history.read().diff_pair()
    }

    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.history.read().is_current_version()
    }

    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        self.history.read().mode()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &ArtifactState {
        &self.state
    }

    /// Copy of the history for rendering
    #[must_use]
    pub fn history_snapshot(&self) -> VersionHistory {
        self.history.read().clone()
    }

    #[must_use]
    pub fn save_status(&self) -> watch::Receiver<SaveStatus> {
        self.saver.status()
    }

    /// Take the failed-save receiver; `None` after the first call
    pub fn save_failures(&self) -> Option<mpsc::UnboundedReceiver<SaveFailure>> {
        self.saver.take_failures()
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop applying deltas, flush any pending save, and return the final state
    ///
    /// An in-flight generation is not cancelled; its remaining deltas are
    /// ignored. Closing twice is a no-op.
    ///
    /// # Errors
    /// `SaveFailed` if the flushed save is rejected; the failed entry is kept
    pub async fn close(&mut self) -> Result<ArtifactState, CanvasError> {
        if !self.closed {
            self.closed = true;
            self.consumer.detach();
            self.saver.flush().await?;
            tracing::debug!(document_id = %self.state.document_id, "artifact closed");
        }
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_artifact::{Authorship, NewVersion};
    use canvas_gateway::InMemoryGateway;
    use pretty_assertions::assert_eq;

    async fn seeded(id: &str, bodies: &[&str]) -> Arc<InMemoryGateway> {
        let gateway = Arc::new(InMemoryGateway::new());
        for body in bodies {
            let request = NewVersion::from_content(
                "Doc",
                ArtifactKind::PlainText,
                ArtifactContent::text(*body),
                Authorship::machine("u1"),
            )
            .unwrap();
            gateway.create_version(&DocumentId::new(id), request).await.unwrap();
        }
        gateway
    }

    fn config() -> CanvasConfig {
        CanvasConfig::new().with_user("u1")
    }

    #[tokio::test]
    async fn open_loads_history_and_defaults_content() {
        let gateway = seeded("doc-1", &["a", "b"]).await;
        let session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::new("doc-1"), ArtifactKind::PlainText, "Doc")
                .with_content(ArtifactContent::empty_tree()),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        assert_eq!(session.state().content(), &ArtifactContent::empty_text());
        assert_eq!(session.history_snapshot().len(), 2);
        assert!(session.is_current_version());
    }

    #[tokio::test]
    async fn uninitialized_document_is_not_loaded() {
        let gateway = Arc::new(InMemoryGateway::new());
        let session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::Code, ""),
            gateway,
            &config(),
        )
        .await
        .unwrap();
        assert!(!session.history_snapshot().is_loaded());
    }

    #[tokio::test]
    async fn ingest_stream_folds_until_exhausted() {
        let gateway = seeded("doc-3", &["old"]).await;
        let mut session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::PlainText, ""),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        let events = futures::stream::iter(vec![
            DeltaEvent::SetId(DocumentId::new("doc-3")),
            DeltaEvent::Clear,
            DeltaEvent::TextDelta("new ".into()),
            DeltaEvent::TextDelta("body".into()),
            DeltaEvent::CorrelationId("c-1".into()),
            DeltaEvent::Finish,
        ]);
        let outcome = session.ingest_stream(events).await.unwrap();

        assert_eq!(outcome.applied, 6);
        assert_eq!(outcome.dropped, 0);
        assert!(outcome.status_changed);
        assert_eq!(session.state().content(), &ArtifactContent::text("new body"));
        assert!(!session.state().is_streaming());
        assert_eq!(session.history_snapshot().document_id(), &DocumentId::new("doc-3"));
        assert_eq!(session.history_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn set_id_rebinds_history() {
        let gateway = seeded("doc-2", &["x"]).await;
        let mut session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::PlainText, ""),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        session
            .ingest(&[DeltaEvent::SetId(DocumentId::new("doc-2"))])
            .await
            .unwrap();
        let history = session.history_snapshot();
        assert_eq!(history.document_id(), &DocumentId::new("doc-2"));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn diff_view_ignores_live_buffer() {
        let gateway = seeded("doc-3", &["v1", "v2"]).await;
        let mut session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::new("doc-3"), ArtifactKind::PlainText, "Doc")
                .with_content(ArtifactContent::text("v2")),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        session.push_delta(DeltaEvent::TextDelta(" live".into())).await.unwrap();
        assert!(session.change_version(VersionAction::Prev));
        session.push_delta(DeltaEvent::TextDelta("!".into())).await.unwrap();

        assert!(!session.is_current_version());
        assert_eq!(session.display_content(), ArtifactContent::text("v1"));
        assert_eq!(session.state().content(), &ArtifactContent::text("v2 live!"));
    }

    #[tokio::test]
    async fn closed_session_rejects_edits_and_deltas() {
        let gateway = seeded("doc-4", &["a"]).await;
        let mut session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::new("doc-4"), ArtifactKind::PlainText, "Doc"),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        let state = session.close().await.unwrap();
        assert!(session.is_closed());

        let outcome = session.push_delta(DeltaEvent::TextDelta("late".into())).await.unwrap();
        assert_eq!(outcome, FoldOutcome::default());
        assert_eq!(session.state(), &state);
        assert!(matches!(
            session.on_save_content(ArtifactContent::text("b"), false).await,
            Err(CanvasError::Closed)
        ));
    }

    #[tokio::test]
    async fn mismatched_edit_is_rejected_without_touching_state() {
        let gateway = seeded("doc-5", &["a"]).await;
        let mut session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::new("doc-5"), ArtifactKind::PlainText, "Doc")
                .with_content(ArtifactContent::text("a")),
            gateway,
            &config(),
        )
        .await
        .unwrap();

        let err = session
            .on_save_content(ArtifactContent::empty_tree(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvasError::Artifact(_)));
        assert_eq!(session.state().content(), &ArtifactContent::text("a"));
    }
}
