//! Document handler dispatch
//!
//! One [`DocumentHandler`] per artifact kind, held in a [`HandlerRegistry`]
//! that has a slot for every kind. [`DocumentDispatcher`] wraps every
//! handler the same way: frame the delta stream, run the generator, then
//! persist the draft as a machine-authored version when a session user is
//! present. Each call appends a new version.

use crate::error::{DispatchError, GenerationError};
use async_trait::async_trait;
use canvas_artifact::{
    ArtifactContent, ArtifactKind, Authorship, DeltaEvent, DocumentId, DocumentVersion, KindTable,
    NewVersion,
};
use canvas_gateway::PersistenceGateway;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One-shot generator output
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// Opaque payload for every kind except rich-text
    Text(String),
    /// Rich-text payload: a flattened projection plus the tree
    Structured { markdown: String, json: Value },
}

impl Draft {
    /// Content the artifact will display
    #[must_use]
    pub fn content(&self) -> ArtifactContent {
        match self {
            Self::Text(text) => ArtifactContent::Text(text.clone()),
            Self::Structured { json, .. } => ArtifactContent::Structured(json.clone()),
        }
    }

    #[inline]
    #[must_use]
    pub fn fits(&self, kind: ArtifactKind) -> bool {
        matches!(self, Self::Structured { .. }) == kind.is_structured()
    }

    /// Version request for this draft
    ///
    /// # Errors
    /// `DraftMismatch` if the draft shape does not fit `kind`
    pub fn to_request(
        &self,
        title: &str,
        kind: ArtifactKind,
        author: Authorship,
    ) -> Result<NewVersion, DispatchError> {
        if !self.fits(kind) {
            return Err(DispatchError::DraftMismatch { kind });
        }
        Ok(match self {
            Self::Text(text) => {
                NewVersion::from_content(title, kind, ArtifactContent::Text(text.clone()), author)?
            }
            Self::Structured { markdown, json } => {
                NewVersion::structured(title, markdown.as_str(), json.clone(), author)
            }
        })
    }
}

/// Writer half of a generation's delta stream
#[derive(Debug, Clone)]
pub struct DeltaWriter {
    tx: mpsc::UnboundedSender<DeltaEvent>,
}

impl DeltaWriter {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeltaEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send one event. Returns `false` once the reader is gone.
    pub fn write(&self, event: DeltaEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Caller context shared by create and update
#[derive(Debug, Clone, Default)]
pub struct GenerationSession {
    /// Authenticated user; `None` for previews, which are never versioned
    pub user_id: Option<String>,
    pub stream: Option<DeltaWriter>,
}

impl GenerationSession {
    #[must_use]
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            stream: None,
        }
    }

    /// With delta stream
    #[inline]
    #[must_use]
    pub fn with_stream(mut self, stream: DeltaWriter) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Send an event if a stream is attached
    pub fn emit(&self, event: DeltaEvent) {
        if let Some(stream) = &self.stream {
            if !stream.write(event) {
                tracing::debug!("delta reader closed; generation continues");
            }
        }
    }
}

/// Input to [`DocumentHandler::on_create_document`]
#[derive(Debug, Clone)]
pub struct CreateContext {
    pub id: DocumentId,
    pub title: String,
    pub session: GenerationSession,
}

/// Input to [`DocumentHandler::on_update_document`]
#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub document: DocumentVersion,
    pub description: String,
    pub session: GenerationSession,
}

/// Kind-specific generator
#[async_trait]
pub trait DocumentHandler: Send + Sync + fmt::Debug {
    /// Kind this handler produces
    fn kind(&self) -> ArtifactKind;

    async fn on_create_document(&self, ctx: CreateContext) -> Result<Draft, GenerationError>;

    async fn on_update_document(&self, ctx: UpdateContext) -> Result<Draft, GenerationError>;
}

/// Closed handler registry with one slot per kind
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: KindTable<Arc<dyn DocumentHandler>>,
}

impl HandlerRegistry {
    /// Build a registry, checking each slot holds a handler for its kind
    ///
    /// # Errors
    /// `KindMismatch` for the first slot whose handler reports another kind
    pub fn new(handlers: KindTable<Arc<dyn DocumentHandler>>) -> Result<Self, DispatchError> {
        for (slot, handler) in handlers.iter() {
            if handler.kind() != slot {
                return Err(DispatchError::KindMismatch {
                    slot,
                    handler: handler.kind(),
                });
            }
        }
        Ok(Self { handlers })
    }

    #[inline]
    #[must_use]
    pub fn handler(&self, kind: ArtifactKind) -> &Arc<dyn DocumentHandler> {
        self.handlers.get(kind)
    }

    /// Look up a handler by kind name
    ///
    /// # Errors
    /// `UnknownArtifactKind` if the name is not a kind
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn DocumentHandler>, DispatchError> {
        let kind: ArtifactKind = name.parse().map_err(|_| {
            tracing::error!(kind = name, "no handler for artifact kind");
            DispatchError::UnknownArtifactKind(name.to_string())
        })?;
        Ok(self.handler(kind))
    }
}

/// Request for a fresh document
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub id: DocumentId,
    pub title: String,
    pub kind: ArtifactKind,
    pub session: GenerationSession,
}

/// Request to regenerate an existing document
#[derive(Debug, Clone)]
pub struct UpdateDocumentRequest {
    /// Current version of the document
    pub document: DocumentVersion,
    pub description: String,
    pub session: GenerationSession,
}

/// Result of a dispatched generation
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub draft: Draft,
    /// Stored version; `None` when the session had no user
    pub version: Option<DocumentVersion>,
}

/// Runs handlers and persists their drafts
#[derive(Debug)]
pub struct DocumentDispatcher<G> {
    registry: HandlerRegistry,
    gateway: Arc<G>,
}

impl<G: PersistenceGateway> DocumentDispatcher<G> {
    #[must_use]
    pub fn new(registry: HandlerRegistry, gateway: Arc<G>) -> Self {
        Self { registry, gateway }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Generate and persist a new document
    ///
    /// The stream receives `set-kind`, `set-id`, `set-title` and `clear`
    /// before the generator runs, and `finish` once the version is stored,
    /// even when generation or the write fails.
    ///
    /// # Errors
    /// Generator failure, a draft that does not fit the kind, or a rejected write
    pub async fn create_document(
        &self,
        request: CreateDocumentRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let CreateDocumentRequest {
            id,
            title,
            kind,
            session,
        } = request;
        let handler = self.registry.handler(kind);

        session.emit(DeltaEvent::SetKind(kind));
        session.emit(DeltaEvent::SetId(id.clone()));
        session.emit(DeltaEvent::SetTitle(title.clone()));
        session.emit(DeltaEvent::Clear);

        let generated = handler
            .on_create_document(CreateContext {
                id: id.clone(),
                title: title.clone(),
                session: session.clone(),
            })
            .await;
        self.complete(&id, &title, kind, generated, &session).await
    }

    /// Regenerate an existing document from a description
    ///
    /// The stream receives `clear` before the generator runs and `finish`
    /// once the version is stored.
    ///
    /// # Errors
    /// Same as [`create_document`](Self::create_document)
    pub async fn update_document(
        &self,
        request: UpdateDocumentRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let UpdateDocumentRequest {
            document,
            description,
            session,
        } = request;
        let id = document.document_id.clone();
        let title = document.title.clone();
        let kind = document.kind;
        let handler = self.registry.handler(kind);

        session.emit(DeltaEvent::Clear);
        let generated = handler
            .on_update_document(UpdateContext {
                document,
                description,
                session: session.clone(),
            })
            .await;
        self.complete(&id, &title, kind, generated, &session).await
    }

    /// Persist a generated draft, then close the stream
    ///
    /// `finish` goes out after the write settles so a consumer refreshing on
    /// the idle transition sees the new version. It is sent on failure too.
    async fn complete(
        &self,
        id: &DocumentId,
        title: &str,
        kind: ArtifactKind,
        generated: Result<Draft, GenerationError>,
        session: &GenerationSession,
    ) -> Result<DispatchOutcome, DispatchError> {
        let outcome = match generated {
            Ok(draft) => {
                let persisted = self
                    .persist(id, title, kind, &draft, session.user_id.as_deref())
                    .await;
                persisted.map(|version| DispatchOutcome { draft, version })
            }
            Err(error) => {
                tracing::warn!(document_id = %id, %kind, %error, "generation failed");
                Err(error.into())
            }
        };
        session.emit(DeltaEvent::Finish);
        outcome
    }

    async fn persist(
        &self,
        id: &DocumentId,
        title: &str,
        kind: ArtifactKind,
        draft: &Draft,
        user_id: Option<&str>,
    ) -> Result<Option<DocumentVersion>, DispatchError> {
        if !draft.fits(kind) {
            tracing::error!(document_id = %id, %kind, "generator returned a draft of the wrong shape");
            return Err(DispatchError::DraftMismatch { kind });
        }
        let Some(user_id) = user_id else {
            tracing::debug!(document_id = %id, "no session user; generation not versioned");
            return Ok(None);
        };
        let request = draft.to_request(title, kind, Authorship::machine(user_id))?;
        let stored = self.gateway.create_version(id, request).await?;
        tracing::info!(
            document_id = %id,
            %kind,
            created_at = %stored.created_at,
            "generated version saved"
        );
        Ok(Some(stored))
    }
}
