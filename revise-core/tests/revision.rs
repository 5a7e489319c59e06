//! Integration tests for the revision state machine.
//!
//! Exercises: accept, accept_option, ignore, can_accept, effective_text,
//! RevisionState persistence snapshots, progress and navigation helpers.

use revise_core::preview::{change_stats, inline_changes, unified_diff, SegmentKind};
use revise_core::{
    accept, accept_option, can_accept, effective_text, ignore, normalize_session, AnchorKind,
    Decision, PatchError, PersistedState, Progress, RevisionError, RevisionState,
    SessionWithMeta,
};

fn simple(findings: &str) -> SessionWithMeta {
    normalize_session(&format!(r#"{{"session_id":"s","findings":[{findings}]}}"#)).unwrap()
}

const THREE_FIXES: &str = r#"
    {"patch":{"from":"teh","to":"the"}},
    {"patch":{"from":"recieve","to":"receive"}},
    {"patch":{"from":"wierd","to":"weird"}}
"#;
const THREE_FIXES_DOC: &str = "I saw teh cat. Did you recieve it? So wierd.";

#[test]
fn scenario_a_accept_applies_patch() {
    let review = normalize_session(
        r#"{"session_id":"s1","findings":[{"comment":"fix typo","patch":{"from":"teh","to":"the"}}]}"#,
    )
    .unwrap();
    let original = "I saw teh cat.";
    let mut state = RevisionState::new();

    assert!(can_accept(&state, &review, 0));
    let accepted = accept(&mut state, original, &review, 0).unwrap();
    assert_eq!(accepted.text, "I saw the cat.");
    assert_eq!(accepted.anchor, AnchorKind::From);
    assert_eq!(state.decision(0), Decision::Accepted);
    assert_eq!(effective_text(original, &review, &state, None), "I saw the cat.");
}

#[test]
fn scenario_b_ambiguous_anchor_leaves_state_untouched() {
    let review = simple(r#"{"comment":"fix typo","patch":{"from":"teh","to":"the"}}"#);
    let original = "teh cat saw teh dog.";
    let mut state = RevisionState::new();

    let err = accept(&mut state, original, &review, 0).unwrap_err();
    assert_eq!(
        err,
        RevisionError::Patch { index: 0, source: PatchError::AmbiguousFrom { count: 2 } }
    );
    assert_eq!(state, RevisionState::new());
    assert_eq!(effective_text(original, &review, &state, None), original);
    assert!(can_accept(&state, &review, 0), "a refused accept can be retried");
}

#[test]
fn scenario_c_option_choice_is_recorded_and_final() {
    let review = normalize_session(
        r#"{"protocol_version":"rb_session_v1","session_id":"c","findings":[
            {"location":{"anchor_quote":"z"},"patch_options":[{"to":"x"},{"to":"y"}]}
        ]}"#,
    )
    .unwrap();
    let original = "a z b";
    let mut state = RevisionState::new();

    let accepted = accept_option(&mut state, original, &review, 0, 1).unwrap();
    assert_eq!(accepted.text, "a y b");
    assert_eq!(accepted.anchor, AnchorKind::Span);
    assert_eq!(state.accepted_options().get(&0), Some(&1));
    assert_eq!(state.decision(0), Decision::AcceptedOption(1));

    let before = state.clone();
    assert_eq!(
        accept_option(&mut state, original, &review, 0, 0),
        Err(RevisionError::AlreadyDecided { index: 0, decision: Decision::AcceptedOption(1) })
    );
    assert!(matches!(
        accept(&mut state, original, &review, 0),
        Err(RevisionError::AlreadyDecided { .. })
    ));
    assert!(matches!(ignore(&mut state, 0), Err(RevisionError::AlreadyDecided { .. })));
    assert_eq!(state, before);
}

#[test]
fn scenario_d_suggestion_only_can_be_ignored_not_accepted() {
    let review = normalize_session(
        r#"{"protocol_version":"rb_session_v1","findings":[{"suggestions":["try X"]}]}"#,
    )
    .unwrap();
    let mut state = RevisionState::new();

    assert!(!can_accept(&state, &review, 0));
    assert_eq!(
        accept(&mut state, "anything", &review, 0),
        Err(RevisionError::SuggestionOnly { index: 0 })
    );
    ignore(&mut state, 0).unwrap();
    assert_eq!(state.decision(0), Decision::Ignored);
}

#[test]
fn ignore_is_idempotent() {
    let mut once = RevisionState::new();
    ignore(&mut once, 2).unwrap();
    let mut twice = once.clone();
    ignore(&mut twice, 2).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.ignored_indices().collect::<Vec<_>>(), [2]);
}

#[test]
fn ignored_finding_cannot_be_accepted() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    ignore(&mut state, 1).unwrap();
    assert!(!can_accept(&state, &review, 1));
    assert_eq!(
        accept(&mut state, THREE_FIXES_DOC, &review, 1),
        Err(RevisionError::AlreadyDecided { index: 1, decision: Decision::Ignored })
    );
}

#[test]
fn unknown_indices_and_options_are_refused() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    assert!(!can_accept(&state, &review, 3));
    assert_eq!(
        accept(&mut state, THREE_FIXES_DOC, &review, 3),
        Err(RevisionError::UnknownFinding { index: 3 })
    );
    assert_eq!(
        accept_option(&mut state, THREE_FIXES_DOC, &review, 0, 0),
        Err(RevisionError::UnknownOption { index: 0, option: 0 })
    );
}

#[test]
fn replay_is_independent_of_click_order() {
    let review = simple(THREE_FIXES);
    let expected = "I saw the cat. Did you receive it? So weird.";

    let mut forward = RevisionState::new();
    for i in 0..3 {
        accept(&mut forward, THREE_FIXES_DOC, &review, i).unwrap();
    }

    let mut backward = RevisionState::new();
    for i in (0..3).rev() {
        accept(&mut backward, THREE_FIXES_DOC, &review, i).unwrap();
    }

    assert_eq!(forward, backward);
    let a = effective_text(THREE_FIXES_DOC, &review, &forward, None);
    let b = effective_text(THREE_FIXES_DOC, &review, &backward, None);
    assert_eq!(a, expected);
    assert_eq!(a, b);
    assert_eq!(a, effective_text(THREE_FIXES_DOC, &review, &forward, None));
}

#[test]
fn later_findings_see_earlier_accepts() {
    // Finding 1 anchors on text produced by finding 0.
    let review = simple(
        r#"{"patch":{"from":"colour","to":"color"}},
           {"patch":{"from":"color scheme","to":"palette"}}"#,
    );
    let original = "Pick a colour scheme.";
    let mut state = RevisionState::new();

    assert!(matches!(
        accept(&mut state, original, &review, 1),
        Err(RevisionError::Patch { index: 1, source: PatchError::NotFound })
    ));
    accept(&mut state, original, &review, 0).unwrap();
    let accepted = accept(&mut state, original, &review, 1).unwrap();
    assert_eq!(accepted.text, "Pick a palette.");
}

#[test]
fn up_to_limits_replay_to_earlier_findings() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    accept(&mut state, THREE_FIXES_DOC, &review, 0).unwrap();
    accept(&mut state, THREE_FIXES_DOC, &review, 2).unwrap();

    assert_eq!(state.replay_order(None), [0, 2]);
    assert_eq!(state.replay_order(Some(2)), [0]);
    assert_eq!(
        effective_text(THREE_FIXES_DOC, &review, &state, Some(2)),
        "I saw the cat. Did you recieve it? So wierd."
    );
}

#[test]
fn replay_skips_patches_that_no_longer_resolve() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    accept(&mut state, THREE_FIXES_DOC, &review, 0).unwrap();
    accept(&mut state, THREE_FIXES_DOC, &review, 2).unwrap();

    // Same decisions replayed over a document that no longer has "teh".
    let drifted = "I saw a cat. So wierd.";
    assert_eq!(effective_text(drifted, &review, &state, None), "I saw a cat. So weird.");
}

#[test]
fn fallback_anchor_is_reported() {
    let review = simple(r#"{"patch":{"from":"quick","to":"slow","span":"quick brown"}}"#);
    let mut state = RevisionState::new();
    let accepted = accept(&mut state, "The quick  brown fox", &review, 0).unwrap();
    assert_eq!(accepted.anchor, AnchorKind::FallbackFrom);
    assert_eq!(accepted.text, "The slow  brown fox");
}

#[test]
fn persisted_state_round_trips() {
    let review = normalize_session(
        r#"{"protocol_version":"rb_session_v1","findings":[
            {"patch":{"from":"one","to":"1"}},
            {"location":{"anchor_quote":"two"},"patch_options":[{"to":"2"},{"to":"II"}]},
            {"suggestions":["reword"]}
        ]}"#,
    )
    .unwrap();
    let original = "one two three";
    let mut state = RevisionState::new();
    accept(&mut state, original, &review, 0).unwrap();
    accept_option(&mut state, original, &review, 1, 1).unwrap();
    ignore(&mut state, 2).unwrap();

    let persisted = state.to_persisted("{raw}");
    assert_eq!(persisted.accepted_indices, [0]);
    assert_eq!(persisted.ignored_indices, [2]);
    assert_eq!(persisted.accepted_option_by_index.get("1"), Some(&1));

    let json = serde_json::to_string(&persisted).unwrap();
    assert!(json.contains("\"rawJson\""));
    assert!(json.contains("\"acceptedOptionByIndex\":{\"1\":1}"));
    let decoded: PersistedState = serde_json::from_str(&json).unwrap();
    let restored = RevisionState::from_persisted(&decoded);

    assert_eq!(restored, state);
    assert_eq!(
        effective_text(original, &review, &restored, None),
        effective_text(original, &review, &state, None)
    );
    assert_eq!(effective_text(original, &review, &restored, None), "1 II three");

    assert!(!json.contains("originalText"));
    let with_original = persisted.with_original(original);
    let json = serde_json::to_string(&with_original).unwrap();
    assert!(json.contains("\"originalText\":\"one two three\""));
    let decoded: PersistedState = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.original_text.as_deref(), Some(original));
}

#[test]
fn persisted_state_tolerates_overlapping_and_bad_entries() {
    let persisted: PersistedState = serde_json::from_str(
        r#"{
            "rawJson": "{}",
            "acceptedIndices": [0, 1],
            "ignoredIndices": [1, 3],
            "acceptedOptionByIndex": {"0": 2, "x": 1}
        }"#,
    )
    .unwrap();
    let state = RevisionState::from_persisted(&persisted);
    assert_eq!(state.decision(0), Decision::AcceptedOption(2));
    assert_eq!(state.decision(1), Decision::Accepted);
    assert_eq!(state.decision(3), Decision::Ignored);
    assert_eq!(state.accepted_options().len(), 1);

    let minimal: PersistedState = serde_json::from_str(r#"{"rawJson": ""}"#).unwrap();
    assert_eq!(RevisionState::from_persisted(&minimal), RevisionState::new());
}

#[test]
fn progress_and_navigation_track_decisions() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    assert_eq!(state.next_undecided(0, review.len()), Some(1));

    accept(&mut state, THREE_FIXES_DOC, &review, 1).unwrap();
    ignore(&mut state, 2).unwrap();
    assert_eq!(state.progress(review.len()), Progress { accepted: 1, ignored: 1, pending: 1 });
    assert_eq!(state.next_undecided(0, review.len()), Some(0));

    accept(&mut state, THREE_FIXES_DOC, &review, 0).unwrap();
    assert_eq!(state.next_undecided(0, review.len()), None);
    assert_eq!(state.next_undecided(0, 0), None);
}

#[test]
fn next_undecided_wraps_large_starting_points() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    ignore(&mut state, 0).unwrap();

    // usize::MAX % 3 == 0, so the search starts after finding 0.
    assert_eq!(state.next_undecided(usize::MAX, review.len()), Some(1));
    assert_eq!(state.next_undecided(4, review.len()), Some(2));
    assert_eq!(state.next_undecided(usize::MAX, 0), None);
}

#[test]
fn previews_describe_the_revision() {
    let review = simple(THREE_FIXES);
    let mut state = RevisionState::new();
    accept(&mut state, THREE_FIXES_DOC, &review, 0).unwrap();
    let revised = effective_text(THREE_FIXES_DOC, &review, &state, None);

    let diff = unified_diff(THREE_FIXES_DOC, &revised, "notes.md");
    assert!(diff.contains("-I saw teh cat."));
    assert!(diff.contains("+I saw the cat."));
    assert_eq!(unified_diff(&revised, &revised, "notes.md"), "");

    let stats = change_stats(THREE_FIXES_DOC, &revised);
    assert_eq!((stats.removed_lines, stats.inserted_lines), (1, 1));
    assert!(change_stats(&revised, &revised).is_empty());

    let (old, new) = inline_changes("I saw teh cat.", "I saw the cat.");
    assert!(old.iter().any(|s| s.kind == SegmentKind::Removed && s.text.contains("teh")));
    assert!(new.iter().any(|s| s.kind == SegmentKind::Inserted && s.text.contains("the")));
    let rebuilt: String = new.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(rebuilt, "I saw the cat.");
}
