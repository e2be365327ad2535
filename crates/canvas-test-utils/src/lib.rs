//! Testing utilities for the canvas workspace
//!
//! Shared gateways, generators and fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use canvas_artifact::{
    ArtifactContent, ArtifactKind, Authorship, DeltaEvent, DocumentId, DocumentVersion, KindTable,
    NewVersion,
};
use canvas_core::{
    CreateContext, DocumentHandler, Draft, GenerationError, HandlerRegistry, UpdateContext,
};
use canvas_gateway::{GatewayError, InMemoryGateway, PersistenceGateway};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// In-memory gateway that counts calls and fails on demand
#[derive(Debug, Default)]
pub struct RecordingGateway {
    inner: InMemoryGateway,
    create_calls: AtomicUsize,
    list_calls: AtomicUsize,
    stored: Mutex<Vec<NewVersion>>,
    fail_next: AtomicUsize,
    failing: AtomicBool,
    write_delay: Option<StdDuration>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Hold every write for `delay` before storing it
    #[must_use]
    pub fn with_write_delay(mut self, delay: StdDuration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// `create_version` attempts, including rejected ones
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Requests that were stored, oldest first
    pub fn created_payloads(&self) -> Vec<NewVersion> {
        self.stored.lock().clone()
    }

    pub fn version_count(&self, document_id: &DocumentId) -> usize {
        self.inner.version_count(document_id)
    }

    /// Reject the next `count` writes
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Reject every write until turned off
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a machine-authored version without touching the counters
    pub async fn seed(
        &self,
        document_id: &DocumentId,
        kind: ArtifactKind,
        title: &str,
        content: ArtifactContent,
    ) -> DocumentVersion {
        let request = NewVersion::from_content(title, kind, content, Authorship::machine("seed"))
            .expect("seed content fits kind");
        self.inner
            .create_version(document_id, request)
            .await
            .expect("seed write")
    }

    fn should_fail(&self) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn list_versions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentVersion>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_versions(document_id).await
    }

    async fn create_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> Result<DocumentVersion, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail() {
            return Err(GatewayError::Unavailable("injected failure".into()));
        }
        let stored = self.inner.create_version(document_id, version.clone()).await?;
        self.stored.lock().push(version);
        Ok(stored)
    }
}

/// Generator that replays a fixed delta script and returns a fixed draft
#[derive(Debug)]
pub struct ScriptedHandler {
    kind: ArtifactKind,
    draft: Draft,
    script: Vec<DeltaEvent>,
    failure: Option<GenerationError>,
    calls: AtomicUsize,
}

impl ScriptedHandler {
    pub fn new(kind: ArtifactKind, draft: Draft) -> Self {
        Self {
            kind,
            draft,
            script: Vec::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Handler whose draft is the kind's natural empty-ish payload
    pub fn echo(kind: ArtifactKind) -> Self {
        let draft = if kind.is_structured() {
            Draft::Structured {
                markdown: "generated".into(),
                json: rich_doc("generated"),
            }
        } else {
            Draft::Text(format!("generated {kind}"))
        };
        Self::new(kind, draft)
    }

    pub fn failing(kind: ArtifactKind, error: GenerationError) -> Self {
        let mut handler = Self::echo(kind);
        handler.failure = Some(error);
        handler
    }

    pub fn with_script(mut self, script: Vec<DeltaEvent>) -> Self {
        self.script = script;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn run(&self, session: &canvas_core::GenerationSession) -> Result<Draft, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for event in &self.script {
            session.emit(event.clone());
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.draft.clone()),
        }
    }
}

#[async_trait]
impl DocumentHandler for ScriptedHandler {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn on_create_document(&self, ctx: CreateContext) -> Result<Draft, GenerationError> {
        self.run(&ctx.session)
    }

    async fn on_update_document(&self, ctx: UpdateContext) -> Result<Draft, GenerationError> {
        self.run(&ctx.session)
    }
}

/// Registry with an echo handler for every kind
pub fn echo_registry() -> HandlerRegistry {
    HandlerRegistry::new(KindTable::from_fn(|kind| {
        Arc::new(ScriptedHandler::echo(kind)) as Arc<dyn DocumentHandler>
    }))
    .expect("echo handlers match their slots")
}

/// Fixed base instant for deterministic timestamps
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// Machine-authored string version `offset_secs` after [`base_time`]
pub fn version_fixture(
    document_id: &str,
    kind: ArtifactKind,
    body: &str,
    offset_secs: i64,
) -> DocumentVersion {
    let request = NewVersion::from_content(
        "Fixture",
        kind,
        ArtifactContent::text(body),
        Authorship::machine("u1"),
    )
    .expect("fixture body fits kind");
    DocumentVersion::from_new(
        DocumentId::new(document_id),
        request,
        base_time() + Duration::seconds(offset_secs),
    )
}

/// Minimal rich-text tree with one paragraph
pub fn rich_doc(text: &str) -> Value {
    json!({
        "type": "doc",
        "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": text}]}
        ]
    })
}

/// Delta events that stream `body` in chunks of `chunk` characters
pub fn text_stream(document_id: &str, body: &str, chunk: usize) -> Vec<DeltaEvent> {
    let chars: Vec<char> = body.chars().collect();
    let mut events = vec![DeltaEvent::SetId(DocumentId::new(document_id))];
    events.extend(
        chars
            .chunks(chunk.max(1))
            .map(|piece| DeltaEvent::TextDelta(piece.iter().collect())),
    );
    events
}
