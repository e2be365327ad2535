//! Version history for one document
//!
//! [`VersionHistory`] keeps entries ordered ascending by `created_at` and a
//! navigation index. Entries are either confirmed server rows or optimistic
//! local saves; [`VersionHistory::reconcile`] is the one reducer that merges
//! the two after a server round trip.

use crate::navigation::{DisplayMode, VersionAction};
use canvas_artifact::{ArtifactContent, ArtifactState, DocumentId, DocumentVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Handle for one optimistic save
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SaveTicket(pub Ulid);

impl SaveTicket {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SaveTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SaveTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOrigin {
    /// Row returned by the version log
    Confirmed,
    /// Local save awaiting acknowledgement
    Pending(SaveTicket),
    /// Local save the log rejected; kept for retry
    Failed(SaveTicket),
}

impl EntryOrigin {
    #[inline]
    #[must_use]
    pub fn ticket(self) -> Option<SaveTicket> {
        match self {
            Self::Confirmed => None,
            Self::Pending(ticket) | Self::Failed(ticket) => Some(ticket),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }

    #[inline]
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }

    #[inline]
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Tie-break for equal timestamps: confirmed rows sort first
    fn rank(self) -> u8 {
        match self {
            Self::Confirmed => 0,
            Self::Pending(_) => 1,
            Self::Failed(_) => 2,
        }
    }
}

/// One version in the history
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntry {
    pub version: DocumentVersion,
    pub origin: EntryOrigin,
}

impl VersionEntry {
    #[inline]
    #[must_use]
    pub fn confirmed(version: DocumentVersion) -> Self {
        Self {
            version,
            origin: EntryOrigin::Confirmed,
        }
    }
}

/// Ordered versions of one document plus the navigation pointer
///
/// # Invariants
/// - entries are sorted ascending by `created_at`
/// - `index` is within `[0, len - 1]` whenever entries exist
/// - "current" is recomputed from `index` on every call, never stored
#[derive(Debug, Clone)]
pub struct VersionHistory {
    document_id: DocumentId,
    entries: Vec<VersionEntry>,
    loaded: bool,
    index: usize,
    mode: DisplayMode,
}

impl VersionHistory {
    /// Empty, unloaded history
    #[must_use]
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            entries: Vec::new(),
            loaded: false,
            index: 0,
            mode: DisplayMode::Edit,
        }
    }

    #[inline]
    #[must_use]
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Point the history at another document, discarding all entries
    pub fn rebind(&mut self, document_id: DocumentId) {
        *self = Self::new(document_id);
    }

    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Selected index, if any version exists
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.index)
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Whether the selection is the newest version
    ///
    /// True while the history is unloaded or empty.
    #[inline]
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        !self.loaded || self.entries.is_empty() || self.index == self.entries.len() - 1
    }

    /// Selected entry
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&VersionEntry> {
        self.entries.get(self.index)
    }

    #[inline]
    #[must_use]
    pub fn version_at(&self, index: usize) -> Option<&DocumentVersion> {
        self.entries.get(index).map(|entry| &entry.version)
    }

    /// Entry with the greatest `created_at`
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&VersionEntry> {
        self.entries.last()
    }

    /// Newest version that is persisted or on its way, ignoring failed saves
    #[must_use]
    pub fn latest_persisted(&self) -> Option<&DocumentVersion> {
        self.entries
            .iter()
            .rev()
            .find(|entry| !entry.origin.is_failed())
            .map(|entry| &entry.version)
    }

    /// Apply a navigation action
    ///
    /// Out-of-range moves clamp silently. No-op on an empty history.
    /// Returns `true` if the index or mode changed.
    pub fn change_version(&mut self, action: VersionAction) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let last = self.entries.len() - 1;
        let before = (self.index, self.mode);

        match action {
            VersionAction::Latest => {
                self.index = last;
                self.mode = DisplayMode::Edit;
            }
            VersionAction::Toggle => self.mode = self.mode.toggled(),
            VersionAction::Prev => {
                if self.index == 0 {
                    tracing::debug!(document_id = %self.document_id, "prev clamped at first version");
                }
                self.index = self.index.saturating_sub(1);
            }
            VersionAction::Next => {
                if self.index == last {
                    tracing::debug!(document_id = %self.document_id, "next clamped at latest version");
                }
                self.index = (self.index + 1).min(last);
            }
        }

        before != (self.index, self.mode)
    }

    /// Merge a fresh server listing with local optimistic entries
    ///
    /// Server rows replace every confirmed entry. A pending entry whose save
    /// already shows up in the listing is absorbed into that row; other
    /// pending and failed entries survive. The selection moves to the
    /// newest version.
    pub fn reconcile(&mut self, server: Vec<DocumentVersion>) {
        let document_id = self.document_id.clone();
        let mut merged: Vec<VersionEntry> = server
            .into_iter()
            .filter(|version| {
                let ours = version.document_id == document_id;
                if !ours {
                    tracing::warn!(
                        expected = %document_id,
                        found = %version.document_id,
                        "ignoring version for another document"
                    );
                }
                ours
            })
            .map(VersionEntry::confirmed)
            .collect();

        let mut claimed = vec![false; merged.len()];
        let local: Vec<VersionEntry> = self
            .entries
            .drain(..)
            .filter(|entry| !entry.origin.is_confirmed())
            .filter(|entry| {
                if !entry.origin.is_pending() {
                    return true;
                }
                let stored = merged.iter().enumerate().position(|(i, row)| {
                    !claimed[i] && stores_same_save(&row.version, &entry.version)
                });
                match stored {
                    Some(i) => {
                        claimed[i] = true;
                        tracing::debug!(
                            document_id = %document_id,
                            created_at = %merged[i].version.created_at,
                            "pending save already listed by server"
                        );
                        false
                    }
                    None => true,
                }
            })
            .collect();
        merged.extend(local);

        self.entries = merged;
        self.sort();
        self.loaded = true;
        self.index = self.entries.len().saturating_sub(1);
    }

    /// Append a local version ahead of server acknowledgement
    pub fn append_optimistic(&mut self, version: DocumentVersion) -> SaveTicket {
        let ticket = SaveTicket::new();
        self.preserving_selection(|entries| {
            entries.push(VersionEntry {
                version,
                origin: EntryOrigin::Pending(ticket),
            });
        });
        ticket
    }

    /// Replace a pending entry with the row the server stored
    ///
    /// Returns `false` if the ticket is unknown, e.g. after a rebind or once
    /// a refresh has absorbed the save.
    pub fn confirm(&mut self, ticket: SaveTicket, version: DocumentVersion) -> bool {
        if version.document_id != self.document_id {
            return false;
        }
        self.preserving_selection(|entries| {
            let Some(position) = entries
                .iter()
                .position(|entry| entry.origin.ticket() == Some(ticket))
            else {
                return false;
            };
            entries.remove(position);
            let known = entries
                .iter()
                .any(|entry| entry.origin.is_confirmed() && entry.version == version);
            if !known {
                entries.push(VersionEntry::confirmed(version));
            }
            true
        })
    }

    /// Mark a pending entry as rejected by the server
    pub fn mark_failed(&mut self, ticket: SaveTicket) -> bool {
        match self.find_mut(ticket) {
            Some(entry) if entry.origin.is_pending() => {
                entry.origin = EntryOrigin::Failed(ticket);
                true
            }
            _ => false,
        }
    }

    /// Move a failed entry back to pending for a retry, returning its payload
    pub fn mark_pending(&mut self, ticket: SaveTicket) -> Option<DocumentVersion> {
        match self.find_mut(ticket) {
            Some(entry) if entry.origin.is_failed() => {
                entry.origin = EntryOrigin::Pending(ticket);
                Some(entry.version.clone())
            }
            _ => None,
        }
    }

    /// Entries whose save was rejected
    #[must_use]
    pub fn failed_entries(&self) -> Vec<&VersionEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.origin.is_failed())
            .collect()
    }

    /// Number of saves awaiting acknowledgement
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.origin.is_pending())
            .count()
    }

    /// Content to display
    ///
    /// The live buffer while the selection is current, otherwise the
    /// selected committed version; in-flight deltas never leak into history.
    #[must_use]
    pub fn display_content(&self, live: &ArtifactState) -> ArtifactContent {
        if self.is_current_version() {
            return live.content().clone();
        }
        match self.current() {
            Some(entry) => entry
                .version
                .payload()
                .unwrap_or_else(|| entry.version.kind.default_content()),
            None => live.content().clone(),
        }
    }

    /// `(previous, selected)` payloads for diff display
    #[must_use]
    pub fn diff_pair(&self) -> Option<(ArtifactContent, ArtifactContent)> {
        let selected = self.current()?;
        let kind = selected.version.kind;
        let payload_of = |version: &DocumentVersion| {
            version
                .payload()
                .unwrap_or_else(|| version.kind.default_content())
        };
        let previous = match self.index.checked_sub(1) {
            Some(prev) => payload_of(&self.entries[prev].version),
            None => kind.default_content(),
        };
        Some((previous, payload_of(&selected.version)))
    }

    fn find_mut(&mut self, ticket: SaveTicket) -> Option<&mut VersionEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.origin.ticket() == Some(ticket))
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.version
                .created_at
                .cmp(&b.version.created_at)
                .then(a.origin.rank().cmp(&b.origin.rank()))
        });
    }

    /// Run a mutation that may reorder entries, keeping the selection stable
    fn preserving_selection<R>(&mut self, mutate: impl FnOnce(&mut Vec<VersionEntry>) -> R) -> R {
        let follow_latest = self.is_current_version();
        let selected: Option<DateTime<Utc>> = self.current().map(|entry| entry.version.created_at);

        let out = mutate(&mut self.entries);
        self.sort();

        let last = self.entries.len().saturating_sub(1);
        self.index = if follow_latest {
            last
        } else {
            selected
                .and_then(|ts| self.entries.iter().position(|e| e.version.created_at == ts))
                .unwrap_or(self.index)
                .min(last)
        };
        out
    }
}

/// Whether `row` is the server's copy of the optimistic `local` save
fn stores_same_save(row: &DocumentVersion, local: &DocumentVersion) -> bool {
    row.created_at >= local.created_at
        && row.kind == local.kind
        && row.title == local.title
        && row.content == local.content
        && row.content_json == local.content_json
        && row.author == local.author
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_artifact::{ArtifactKind, Authorship, NewVersion};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn doc() -> DocumentId {
        DocumentId::new("doc-1")
    }

    fn version(body: &str, offset_ms: i64) -> DocumentVersion {
        let request = NewVersion::from_content(
            "Notes",
            ArtifactKind::PlainText,
            ArtifactContent::text(body),
            Authorship::machine("u1"),
        )
        .unwrap();
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        DocumentVersion::from_new(doc(), request, base + Duration::milliseconds(offset_ms))
    }

    fn loaded(bodies: &[&str]) -> VersionHistory {
        let mut history = VersionHistory::new(doc());
        history.reconcile(
            bodies
                .iter()
                .enumerate()
                .map(|(i, body)| version(body, i as i64 * 1000))
                .collect(),
        );
        history
    }

    #[test]
    fn unloaded_history_is_current_and_inert() {
        let mut history = VersionHistory::new(doc());
        assert!(history.is_current_version());
        assert_eq!(history.index(), None);
        assert!(!history.change_version(VersionAction::Prev));
        assert!(!history.change_version(VersionAction::Toggle));
    }

    #[test]
    fn reconcile_selects_latest() {
        let history = loaded(&["a", "b", "c"]);
        assert_eq!(history.index(), Some(2));
        assert!(history.is_current_version());
        assert_eq!(history.latest().unwrap().version.content.as_deref(), Some("c"));
    }

    #[test]
    fn navigation_clamps_at_bounds() {
        let mut history = loaded(&["a", "b", "c"]);

        assert!(!history.change_version(VersionAction::Next));
        assert_eq!(history.index(), Some(2));

        history.change_version(VersionAction::Prev);
        history.change_version(VersionAction::Prev);
        assert_eq!(history.index(), Some(0));
        assert!(!history.change_version(VersionAction::Prev));
        assert_eq!(history.index(), Some(0));
        assert!(!history.is_current_version());
    }

    #[test]
    fn latest_exits_diff_mode() {
        let mut history = loaded(&["a", "b", "c"]);
        history.change_version(VersionAction::Prev);
        history.change_version(VersionAction::Toggle);
        assert_eq!(history.mode(), DisplayMode::Diff);
        assert_eq!(history.index(), Some(1));

        assert!(history.change_version(VersionAction::Latest));
        assert_eq!(history.index(), Some(2));
        assert_eq!(history.mode(), DisplayMode::Edit);
    }

    #[test]
    fn toggle_keeps_index() {
        let mut history = loaded(&["a", "b"]);
        history.change_version(VersionAction::Prev);
        history.change_version(VersionAction::Toggle);
        assert_eq!(history.index(), Some(0));
        assert_eq!(history.mode(), DisplayMode::Diff);
    }

    #[test]
    fn display_isolates_history_from_live_buffer() {
        let mut history = loaded(&["first", "second"]);
        let mut live = ArtifactState::new(doc(), ArtifactKind::PlainText, "Notes");
        live.append_text("streaming...").unwrap();

        assert_eq!(history.display_content(&live), ArtifactContent::text("streaming..."));

        history.change_version(VersionAction::Prev);
        live.append_text(" more").unwrap();
        assert_eq!(history.display_content(&live), ArtifactContent::text("first"));
    }

    #[test]
    fn optimistic_append_follows_latest() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("b", 5000));

        assert_eq!(history.len(), 2);
        assert!(history.is_current_version());
        assert_eq!(history.latest().unwrap().origin, EntryOrigin::Pending(ticket));
        assert_eq!(history.pending_count(), 1);
    }

    #[test]
    fn optimistic_append_keeps_browsed_selection() {
        let mut history = loaded(&["a", "b"]);
        history.change_version(VersionAction::Prev);
        history.append_optimistic(version("c", 9000));

        assert_eq!(history.index(), Some(0));
        assert_eq!(history.current().unwrap().version.content.as_deref(), Some("a"));
    }

    #[test]
    fn confirm_replaces_pending_entry() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("b", 5000));
        let stored = version("b", 5003);

        assert!(history.confirm(ticket, stored.clone()));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap(), &VersionEntry::confirmed(stored));
        assert_eq!(history.pending_count(), 0);
    }

    #[test]
    fn confirm_after_reconcile_does_not_duplicate() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("b", 5000));
        let stored = version("b", 5003);

        history.reconcile(vec![version("a", 0), stored.clone()]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.pending_count(), 0);
        assert_eq!(history.latest().unwrap(), &VersionEntry::confirmed(stored.clone()));

        assert!(!history.confirm(ticket, stored));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn reconcile_keeps_pending_saves_the_server_has_not_listed() {
        let mut history = loaded(&["a"]);
        let first = history.append_optimistic(version("b", 5000));
        history.append_optimistic(version("b", 6000));

        // only the first of two identical saves has landed; a stale row does not count
        history.reconcile(vec![version("a", 0), version("b", 5001), version("b", 4000)]);

        assert_eq!(history.pending_count(), 1);
        assert_eq!(history.len(), 4);
        assert!(!history.confirm(first, version("b", 5001)));
    }

    #[test]
    fn reconcile_keeps_local_entries_in_timestamp_order() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("local", 3000));
        history.mark_failed(ticket);

        history.reconcile(vec![version("a", 0), version("machine", 4000)]);

        let bodies: Vec<_> = history
            .entries()
            .iter()
            .map(|e| e.version.content.clone().unwrap())
            .collect();
        assert_eq!(bodies, vec!["a", "local", "machine"]);
        assert_eq!(history.latest_persisted().unwrap().content.as_deref(), Some("machine"));
    }

    #[test]
    fn failed_entries_are_kept_and_retryable() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("b", 5000));

        assert!(history.mark_failed(ticket));
        assert!(!history.mark_failed(ticket));
        assert_eq!(history.len(), 2);
        assert_eq!(history.failed_entries().len(), 1);
        assert_eq!(history.latest_persisted().unwrap().content.as_deref(), Some("a"));

        let retried = history.mark_pending(ticket).unwrap();
        assert_eq!(retried.content.as_deref(), Some("b"));
        assert!(history.failed_entries().is_empty());
    }

    #[test]
    fn confirm_rejects_foreign_document() {
        let mut history = loaded(&["a"]);
        let ticket = history.append_optimistic(version("b", 5000));
        let mut foreign = version("b", 5001);
        foreign.document_id = DocumentId::new("other");

        assert!(!history.confirm(ticket, foreign));
        assert_eq!(history.pending_count(), 1);
    }

    #[test]
    fn diff_pair_compares_with_previous() {
        let mut history = loaded(&["a", "b", "c"]);
        history.change_version(VersionAction::Prev);

        let (previous, selected) = history.diff_pair().unwrap();
        assert_eq!(previous, ArtifactContent::text("a"));
        assert_eq!(selected, ArtifactContent::text("b"));

        history.change_version(VersionAction::Prev);
        let (previous, _) = history.diff_pair().unwrap();
        assert_eq!(previous, ArtifactContent::empty_text());
    }

    #[test]
    fn rebind_resets_history() {
        let mut history = loaded(&["a", "b"]);
        history.rebind(DocumentId::new("doc-2"));
        assert!(!history.is_loaded());
        assert!(history.is_empty());
        assert_eq!(history.document_id(), &DocumentId::new("doc-2"));
    }
}
