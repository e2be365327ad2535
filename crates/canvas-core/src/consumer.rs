//! Delta stream consumer
//!
//! Folds generation deltas into an [`ArtifactState`]. The consumer keeps a
//! monotonic cursor into the observed event sequence so every event is
//! applied exactly once, however often the caller hands it the whole buffer.

use crate::config::{CanvasConfig, RevealWindow};
use canvas_artifact::{ArtifactError, ArtifactState, DeltaEvent, Suggestion};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Side effect routed to collaborators instead of the artifact state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Suggestion(Suggestion),
    CorrelationId(String),
}

/// Sending half of the side-effect channel
///
/// Deferred effects go through one forwarding task per outbox, so they keep
/// their publish order.
#[derive(Debug, Clone)]
pub struct StreamOutbox {
    tx: mpsc::UnboundedSender<SideEffect>,
    deferred: Arc<Mutex<Option<mpsc::UnboundedSender<SideEffect>>>>,
}

impl StreamOutbox {
    /// Create an outbox and its receiver
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SideEffect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Self {
            tx,
            deferred: Arc::new(Mutex::new(None)),
        };
        (outbox, rx)
    }

    /// Send now. Returns `false` if the receiver is gone.
    pub fn publish(&self, effect: SideEffect) -> bool {
        self.tx.send(effect).is_ok()
    }

    /// Send after the current fold has returned
    ///
    /// Without a runtime the effect is sent inline.
    pub fn publish_deferred(&self, effect: SideEffect) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            let _ = self.tx.send(effect);
            return;
        };

        let mut slot = self.deferred.lock();
        let queue = slot.get_or_insert_with(|| self.spawn_forwarder(&handle));
        if let Err(mpsc::error::SendError(effect)) = queue.send(effect) {
            // forwarder died with its runtime; start over on this one
            let queue = self.spawn_forwarder(&handle);
            let _ = queue.send(effect);
            *slot = Some(queue);
        }
    }

    fn spawn_forwarder(&self, handle: &tokio::runtime::Handle) -> mpsc::UnboundedSender<SideEffect> {
        let (queue, mut pending) = mpsc::unbounded_channel();
        let tx = self.tx.clone();
        handle.spawn(async move {
            while let Some(effect) = pending.recv().await {
                tokio::task::yield_now().await;
                if tx.send(effect).is_err() {
                    break;
                }
            }
        });
        queue
    }
}

/// Result of one [`DeltaStreamConsumer::consume`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldOutcome {
    /// Events past the cursor that were processed
    pub applied: usize,
    /// Whether the idle/streaming status flipped at least once
    pub status_changed: bool,
    /// Events dropped as contract violations
    pub dropped: usize,
}

impl std::ops::AddAssign for FoldOutcome {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.status_changed |= other.status_changed;
        self.dropped += other.dropped;
    }
}

/// Cursor-tracking fold from delta events to artifact state
#[derive(Debug)]
pub struct DeltaStreamConsumer {
    cursor: usize,
    text_reveal: RevealWindow,
    code_reveal: RevealWindow,
    outbox: Option<StreamOutbox>,
    detached: bool,
}

impl DeltaStreamConsumer {
    #[must_use]
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            cursor: 0,
            text_reveal: config.text_reveal,
            code_reveal: config.code_reveal,
            outbox: None,
            detached: false,
        }
    }

    /// With side-effect outbox
    #[inline]
    #[must_use]
    pub fn with_outbox(mut self, outbox: StreamOutbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Number of events already processed
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Stop applying deltas; later calls to `consume` are no-ops
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// Fold the unprocessed suffix of `events` into `state`
    ///
    /// `events` is the full sequence observed so far. A slice no longer than
    /// the cursor does nothing.
    pub fn consume(&mut self, state: &mut ArtifactState, events: &[DeltaEvent]) -> FoldOutcome {
        let mut outcome = FoldOutcome::default();
        if self.detached || events.len() <= self.cursor {
            return outcome;
        }

        for event in &events[self.cursor..] {
            self.step(state, event, &mut outcome);
        }

        tracing::debug!(
            document_id = %state.document_id,
            cursor = self.cursor,
            applied = outcome.applied,
            dropped = outcome.dropped,
            status = ?state.status(),
            "folded deltas"
        );
        outcome
    }

    /// Fold one event that arrived outside a buffered sequence
    pub fn push(&mut self, state: &mut ArtifactState, event: DeltaEvent) -> FoldOutcome {
        let mut outcome = FoldOutcome::default();
        if !self.detached {
            self.step(state, &event, &mut outcome);
        }
        outcome
    }

    fn step(&mut self, state: &mut ArtifactState, event: &DeltaEvent, outcome: &mut FoldOutcome) {
        let before = state.status();
        match self.fold(state, event) {
            Ok(()) => outcome.applied += 1,
            Err(violation) => {
                tracing::warn!(
                    document_id = %state.document_id,
                    %violation,
                    "dropping delta"
                );
                outcome.dropped += 1;
            }
        }
        outcome.status_changed |= state.status() != before;
        self.cursor += 1;
    }

    fn fold(&self, state: &mut ArtifactState, event: &DeltaEvent) -> Result<(), ArtifactError> {
        match event {
            DeltaEvent::SetId(id) => {
                state.document_id = id.clone();
                state.begin_streaming();
            }
            DeltaEvent::SetTitle(title) => {
                state.title.clone_from(title);
                state.begin_streaming();
            }
            DeltaEvent::SetKind(kind) => {
                if state.set_kind(*kind) {
                    tracing::debug!(kind = %kind, "kind change reset content");
                }
                state.begin_streaming();
            }
            DeltaEvent::TextDelta(delta) => {
                state.begin_streaming();
                let len = state
                    .append_text(delta)
                    .map_err(|_| violation(event, state))?;
                if self.text_reveal.contains(len) {
                    state.reveal();
                }
            }
            DeltaEvent::CodeDelta(snapshot) => {
                state.begin_streaming();
                let len = state
                    .replace_text(snapshot.as_str())
                    .map_err(|_| violation(event, state))?;
                if self.code_reveal.contains(len) {
                    state.reveal();
                }
            }
            DeltaEvent::ImageDelta(payload) | DeltaEvent::SheetDelta(payload) => {
                state.begin_streaming();
                state
                    .replace_text(payload.as_str())
                    .map_err(|_| violation(event, state))?;
                state.reveal();
            }
            DeltaEvent::Clear => {
                state.clear();
                state.begin_streaming();
            }
            DeltaEvent::Finish => {
                state.finish();
            }
            DeltaEvent::Suggestion(suggestion) => {
                if let Some(outbox) = &self.outbox {
                    outbox.publish_deferred(SideEffect::Suggestion(suggestion.clone()));
                }
            }
            DeltaEvent::CorrelationId(id) => {
                if let Some(outbox) = &self.outbox {
                    outbox.publish(SideEffect::CorrelationId(id.clone()));
                }
            }
            DeltaEvent::Unknown => {}
        }
        Ok(())
    }
}

fn violation(event: &DeltaEvent, state: &ArtifactState) -> ArtifactError {
    ArtifactError::StreamContractViolation {
        event: event.name(),
        kind: state.kind(),
    }
}
