//! End-to-end properties of an artifact session
//!
//! Idempotent saves, ordered delta folding, reveal thresholds, navigation
//! bounds, diff isolation, kind defaults and debounce collapse.

use canvas_artifact::{ArtifactContent, ArtifactKind, ArtifactState, ArtifactStatus, DeltaEvent, DocumentId};
use canvas_core::{ArtifactSession, CanvasConfig, DeltaStreamConsumer, OpenArtifact, SaveOutcome};
use canvas_gateway::{InMemoryGateway, PersistenceGateway};
use canvas_history::{DisplayMode, VersionAction};
use canvas_test_utils::{rich_doc, text_stream, RecordingGateway};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn config() -> CanvasConfig {
    CanvasConfig::new().with_user("u1")
}

async fn open_seeded(
    gateway: &Arc<RecordingGateway>,
    id: &str,
    kind: ArtifactKind,
    bodies: &[ArtifactContent],
) -> ArtifactSession<RecordingGateway> {
    let document_id = DocumentId::new(id);
    for body in bodies {
        gateway.seed(&document_id, kind, "Doc", body.clone()).await;
    }
    let open = OpenArtifact::new(document_id, kind, "Doc");
    let open = match bodies.last() {
        Some(body) => open.with_content(body.clone()),
        None => open,
    };
    ArtifactSession::open(open, Arc::clone(gateway), &config())
        .await
        .unwrap()
}

#[tokio::test]
async fn identical_string_saves_write_once() {
    let gateway = RecordingGateway::shared();
    let mut session = open_seeded(&gateway, "d1", ArtifactKind::PlainText, &[ArtifactContent::text("a")]).await;

    let first = session.on_save_content(ArtifactContent::text("x"), false).await.unwrap();
    let second = session.on_save_content(ArtifactContent::text("x"), false).await.unwrap();

    assert!(matches!(first, SaveOutcome::Saved(_)));
    assert_eq!(second, SaveOutcome::Unchanged);
    assert_eq!(gateway.create_calls(), 1);
}

#[tokio::test]
async fn identical_structured_saves_write_once() {
    let gateway = RecordingGateway::shared();
    let mut session = open_seeded(
        &gateway,
        "d2",
        ArtifactKind::RichText,
        &[ArtifactContent::Structured(rich_doc("a"))],
    )
    .await;

    for _ in 0..2 {
        session
            .on_save_content(ArtifactContent::Structured(rich_doc("edited")), false)
            .await
            .unwrap();
    }
    assert_eq!(gateway.create_calls(), 1);

    let stored = gateway.created_payloads().pop().unwrap();
    assert_eq!(stored.content_json, Some(rich_doc("edited")));
    assert_eq!(stored.content.as_deref(), Some("edited"));
}

#[tokio::test]
async fn saving_the_seeded_payload_is_a_no_op() {
    let gateway = RecordingGateway::shared();
    let mut session = open_seeded(&gateway, "d3", ArtifactKind::Code, &[ArtifactContent::text("fn a() {}")]).await;

    let outcome = session
        .on_save_content(ArtifactContent::text("fn a() {}"), false)
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(gateway.create_calls(), 0);
}

#[tokio::test]
async fn delta_ordering_and_replay() {
    let gateway = Arc::new(InMemoryGateway::new());
    let mut session = ArtifactSession::open(
        OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::PlainText, ""),
        gateway,
        &config(),
    )
    .await
    .unwrap();

    let mut events = vec![
        DeltaEvent::SetId(DocumentId::new("d1")),
        DeltaEvent::TextDelta("ab".into()),
        DeltaEvent::TextDelta("cd".into()),
    ];
    session.ingest(&events).await.unwrap();
    assert_eq!(session.state().content(), &ArtifactContent::text("abcd"));
    assert_eq!(session.state().status(), ArtifactStatus::Streaming);

    events.push(DeltaEvent::Finish);
    session.ingest(&events).await.unwrap();
    assert_eq!(session.state().status(), ArtifactStatus::Idle);

    let before = session.state().clone();
    let outcome = session.ingest(&events[..3]).await.unwrap();
    assert_eq!(outcome.applied, 0);
    let outcome = session.ingest(&events).await.unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(session.state(), &before);
}

#[tokio::test]
async fn text_stream_reveals_once() {
    let gateway = Arc::new(InMemoryGateway::new());
    let mut session = ArtifactSession::open(
        OpenArtifact::new(DocumentId::uninitialized(), ArtifactKind::PlainText, ""),
        gateway,
        &config(),
    )
    .await
    .unwrap();

    let body = "w".repeat(600);
    let events = text_stream("d-reveal", &body, 10);
    let mut seen_visible = false;
    for end in 1..=events.len() {
        session.ingest(&events[..end]).await.unwrap();
        let visible = session.state().is_visible();
        assert!(visible || !seen_visible, "artifact was hidden again");
        let len = session.state().content().char_len();
        if !seen_visible {
            assert_eq!(visible, (400..450).contains(&len));
        }
        seen_visible |= visible;
    }
    assert!(seen_visible);
}

proptest! {
    #[test]
    fn reveal_is_monotonic_and_tied_to_window(chunks in prop::collection::vec(1usize..40, 1..60)) {
        let config = CanvasConfig::default();
        let mut consumer = DeltaStreamConsumer::new(&config);
        let mut state = ArtifactState::new(DocumentId::new("p"), ArtifactKind::PlainText, "");
        let mut expected = false;
        let mut len = 0usize;

        for size in chunks {
            consumer.push(&mut state, DeltaEvent::TextDelta("t".repeat(size)));
            len += size;
            expected |= config.text_reveal.contains(len);
            prop_assert_eq!(state.is_visible(), expected);
        }
    }

    #[test]
    fn cursor_only_moves_forward(splits in prop::collection::vec(0usize..8, 1..10)) {
        let events: Vec<DeltaEvent> = (0..8).map(|i| DeltaEvent::TextDelta(i.to_string())).collect();
        let mut consumer = DeltaStreamConsumer::new(&CanvasConfig::default());
        let mut state = ArtifactState::new(DocumentId::new("p"), ArtifactKind::Code, "");
        let mut high = 0usize;

        for end in splits {
            consumer.consume(&mut state, &events[..end]);
            high = high.max(end);
            prop_assert_eq!(consumer.cursor(), high);
        }
        let expected: String = (0..high).map(|i| i.to_string()).collect();
        prop_assert_eq!(state.content(), &ArtifactContent::text(expected));
    }
}

#[tokio::test]
async fn navigation_bounds_through_session() {
    let gateway = RecordingGateway::shared();
    let bodies: Vec<_> = ["v0", "v1", "v2"].iter().map(|b| ArtifactContent::text(*b)).collect();
    let session = open_seeded(&gateway, "nav", ArtifactKind::PlainText, &bodies).await;

    session.change_version(VersionAction::Prev);
    session.change_version(VersionAction::Prev);
    assert!(!session.change_version(VersionAction::Prev));
    assert_eq!(session.history_snapshot().index(), Some(0));

    session.change_version(VersionAction::Toggle);
    assert_eq!(session.mode(), DisplayMode::Diff);
    assert_eq!(session.history_snapshot().index(), Some(0));

    session.change_version(VersionAction::Next);
    session.change_version(VersionAction::Next);
    assert!(!session.change_version(VersionAction::Next));
    assert_eq!(session.history_snapshot().index(), Some(2));

    session.change_version(VersionAction::Prev);
    session.change_version(VersionAction::Latest);
    assert_eq!(session.history_snapshot().index(), Some(2));
    assert_eq!(session.mode(), DisplayMode::Edit);
}

#[tokio::test]
async fn diff_isolation_from_live_edits() {
    let gateway = RecordingGateway::shared();
    let bodies: Vec<_> = ["first", "second"].iter().map(|b| ArtifactContent::text(*b)).collect();
    let mut session = open_seeded(&gateway, "diff", ArtifactKind::PlainText, &bodies).await;

    session.change_version(VersionAction::Prev);
    session.change_version(VersionAction::Toggle);
    assert!(!session.is_current_version());

    session.on_save_content(ArtifactContent::text("typed"), true).await.unwrap();
    assert_eq!(session.display_content(), ArtifactContent::text("first"));

    let (previous, selected) = session.diff_pair().unwrap();
    assert_eq!(previous, ArtifactContent::empty_text());
    assert_eq!(selected, ArtifactContent::text("first"));
    assert_eq!(session.state().content(), &ArtifactContent::text("typed"));
}

#[tokio::test]
async fn kind_correct_defaults() {
    for kind in ArtifactKind::ALL {
        let session = ArtifactSession::open(
            OpenArtifact::new(DocumentId::generate(), kind, "t"),
            Arc::new(InMemoryGateway::new()),
            &config(),
        )
        .await
        .unwrap();
        let content = session.state().content();
        if kind == ArtifactKind::RichText {
            assert_eq!(content, &ArtifactContent::empty_tree());
        } else {
            assert_eq!(content, &ArtifactContent::empty_text());
        }
    }
}

#[tokio::test]
async fn create_then_list_round_trip() {
    let gateway = InMemoryGateway::new();
    let id = DocumentId::new("rt");
    for body in ["one", "two"] {
        let request = canvas_artifact::NewVersion::from_content(
            "t",
            ArtifactKind::Code,
            ArtifactContent::text(body),
            canvas_artifact::Authorship::human("u1"),
        )
        .unwrap();
        gateway.create_version(&id, request).await.unwrap();
    }
    let tree = rich_doc("three");
    let request = canvas_artifact::NewVersion::structured(
        "t",
        "three",
        tree.clone(),
        canvas_artifact::Authorship::human("u1"),
    );
    let created = gateway.create_version(&id, request).await.unwrap();

    let listed = gateway.list_versions(&id).await.unwrap();
    let last = listed.last().unwrap();
    assert_eq!(last, &created);
    assert_eq!(last.content_json.as_ref(), Some(&tree));
    assert!(listed.iter().all(|v| v.created_at <= last.created_at));
}

#[tokio::test(start_paused = true)]
async fn debounce_collapses_bursts() {
    let gateway = RecordingGateway::shared();
    let mut session = open_seeded(&gateway, "burst", ArtifactKind::PlainText, &[ArtifactContent::text("a")]).await;

    for (i, body) in ["one", "two", "three"].into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
        let outcome = session
            .on_save_content(ArtifactContent::text(body), true)
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Scheduled);
    }
    assert_eq!(gateway.create_calls(), 0);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(gateway.create_calls(), 1);
    let stored = gateway.created_payloads();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content.as_deref(), Some("three"));
}
