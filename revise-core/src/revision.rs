//! Per-document accept/ignore state and effective-text replay.
//!
//! Decisions are monotonic: a finding starts pending and moves at most once,
//! to accepted, accepted-with-option, or ignored. There is no un-accept.
//!
//! The effective document text is never stored. It is derived by replaying
//! every accepted patch over the original text in ascending finding-index
//! order, so the same persisted state always yields the same text regardless
//! of the order in which the user clicked through the findings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, warn};

use crate::error::RevisionError;
use crate::patch::{apply_patch, AnchorKind};
use crate::types::{PersistedState, SessionWithMeta};

/// Where a single finding stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Accepted,
    /// Accepted with the option at this index of the finding's `patch_options`.
    AcceptedOption(usize),
    Ignored,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Pending => f.write_str("pending"),
            Decision::Accepted => f.write_str("accepted"),
            Decision::AcceptedOption(option) => write!(f, "accepted with option {option}"),
            Decision::Ignored => f.write_str("ignored"),
        }
    }
}

/// Counts of decided and pending findings for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub accepted: usize,
    pub ignored: usize,
    pub pending: usize,
}

/// Accept/ignore decisions for one open document.
///
/// An index lives in at most one of the three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionState {
    accepted: BTreeSet<usize>,
    ignored: BTreeSet<usize>,
    accepted_options: BTreeMap<usize, usize>,
}

impl RevisionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision(&self, index: usize) -> Decision {
        if let Some(&option) = self.accepted_options.get(&index) {
            Decision::AcceptedOption(option)
        } else if self.accepted.contains(&index) {
            Decision::Accepted
        } else if self.ignored.contains(&index) {
            Decision::Ignored
        } else {
            Decision::Pending
        }
    }

    pub fn is_decided(&self, index: usize) -> bool {
        self.decision(index) != Decision::Pending
    }

    /// Plain accepts, ascending.
    pub fn accepted_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.accepted.iter().copied()
    }

    pub fn ignored_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.ignored.iter().copied()
    }

    /// Finding index → chosen option index.
    pub fn accepted_options(&self) -> &BTreeMap<usize, usize> {
        &self.accepted_options
    }

    /// Every accepted index (plain or with option) below `up_to`, ascending.
    pub fn replay_order(&self, up_to: Option<usize>) -> Vec<usize> {
        let all: BTreeSet<usize> =
            self.accepted.iter().chain(self.accepted_options.keys()).copied().collect();
        all.into_iter().filter(|&i| up_to.map_or(true, |limit| i < limit)).collect()
    }

    /// The first pending index after `after`, wrapping to the start; `None`
    /// when every one of the `len` findings is decided.
    pub fn next_undecided(&self, after: usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let start = after % len;
        (1..=len).map(|step| (start + step) % len).find(|&i| !self.is_decided(i))
    }

    pub fn progress(&self, len: usize) -> Progress {
        let mut progress = Progress::default();
        for index in 0..len {
            match self.decision(index) {
                Decision::Pending => progress.pending += 1,
                Decision::Accepted | Decision::AcceptedOption(_) => progress.accepted += 1,
                Decision::Ignored => progress.ignored += 1,
            }
        }
        progress
    }

    /// Snapshot for the state store, paired with the raw session text.
    pub fn to_persisted(&self, raw_json: &str) -> PersistedState {
        PersistedState {
            raw_json: raw_json.to_owned(),
            accepted_indices: self.accepted.iter().copied().collect(),
            ignored_indices: self.ignored.iter().copied().collect(),
            accepted_option_by_index: self
                .accepted_options
                .iter()
                .map(|(index, option)| (index.to_string(), *option))
                .collect(),
            original_text: None,
        }
    }

    /// Rebuilds state from a stored snapshot.
    ///
    /// Snapshots written by older tools may list an option-accepted index in
    /// `accepted_indices` too; the option entry wins. Option keys that are not
    /// integers are dropped. Ignores never override accepts.
    pub fn from_persisted(persisted: &PersistedState) -> Self {
        let accepted_options: BTreeMap<usize, usize> = persisted
            .accepted_option_by_index
            .iter()
            .filter_map(|(key, option)| key.parse::<usize>().ok().map(|index| (index, *option)))
            .collect();
        let accepted: BTreeSet<usize> = persisted
            .accepted_indices
            .iter()
            .copied()
            .filter(|i| !accepted_options.contains_key(i))
            .collect();
        let ignored = persisted
            .ignored_indices
            .iter()
            .copied()
            .filter(|i| !accepted.contains(i) && !accepted_options.contains_key(i))
            .collect();
        Self { accepted, ignored, accepted_options }
    }
}

/// Result of a successful accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Effective text with the new decision included.
    pub text: String,
    /// Which anchor matched when the patch was checked.
    pub anchor: AnchorKind,
}

/// Replays accepted patches over `original`, in ascending finding order.
///
/// With `up_to`, only findings with a lower index are replayed: that is the
/// text a finding at `up_to` sees when it is applied. A patch whose anchor no
/// longer resolves during replay is skipped and the text is left as it was.
pub fn effective_text(
    original: &str,
    review: &SessionWithMeta,
    state: &RevisionState,
    up_to: Option<usize>,
) -> String {
    let mut text = original.to_owned();
    for index in state.replay_order(up_to) {
        let option = state.accepted_options.get(&index).copied();
        let Some(patch) = review.resolve_patch(index, option) else {
            warn!(index, ?option, "accepted finding has no patch in this session");
            continue;
        };
        match apply_patch(&text, patch) {
            Ok(applied) => text = applied.text,
            Err(reason) => warn!(index, %reason, "skipping accepted finding during replay"),
        }
    }
    text
}

/// True when finding `index` exists, has a patch, and is still pending.
pub fn can_accept(state: &RevisionState, review: &SessionWithMeta, index: usize) -> bool {
    index < review.len() && review.has_patch(index) && !state.is_decided(index)
}

/// Accepts finding `index` with its primary patch.
///
/// # Errors
///
/// Returns `RevisionError::UnknownFinding`, `SuggestionOnly` or
/// `AlreadyDecided` when the transition is not allowed, and
/// `RevisionError::Patch` when the patch does not apply to the text produced
/// by the earlier accepted findings. The state is unchanged on error.
pub fn accept(
    state: &mut RevisionState,
    original: &str,
    review: &SessionWithMeta,
    index: usize,
) -> Result<Accepted, RevisionError> {
    let anchor = check_transition(state, original, review, index, None)?;
    state.accepted.insert(index);
    debug!(index, ?anchor, "finding accepted");
    Ok(Accepted { text: effective_text(original, review, state, None), anchor })
}

/// Accepts finding `index` with the patch of its option `option`.
///
/// Only one of [`accept`] and `accept_option` can ever succeed for an index.
///
/// # Errors
///
/// As [`accept`], plus `RevisionError::UnknownOption` when the finding has no
/// such option.
pub fn accept_option(
    state: &mut RevisionState,
    original: &str,
    review: &SessionWithMeta,
    index: usize,
    option: usize,
) -> Result<Accepted, RevisionError> {
    let anchor = check_transition(state, original, review, index, Some(option))?;
    state.accepted_options.insert(index, option);
    debug!(index, option, ?anchor, "finding accepted with option");
    Ok(Accepted { text: effective_text(original, review, state, None), anchor })
}

/// Marks finding `index` ignored. Allowed for suggestion-only findings and
/// idempotent for findings that are already ignored.
///
/// # Errors
///
/// Returns `RevisionError::AlreadyDecided` when the finding was accepted.
pub fn ignore(state: &mut RevisionState, index: usize) -> Result<(), RevisionError> {
    match state.decision(index) {
        Decision::Pending => {
            state.ignored.insert(index);
            debug!(index, "finding ignored");
            Ok(())
        }
        Decision::Ignored => Ok(()),
        decision => Err(RevisionError::AlreadyDecided { index, decision }),
    }
}

fn check_transition(
    state: &RevisionState,
    original: &str,
    review: &SessionWithMeta,
    index: usize,
    option: Option<usize>,
) -> Result<AnchorKind, RevisionError> {
    if index >= review.len() {
        return Err(RevisionError::UnknownFinding { index });
    }
    if !review.has_patch(index) {
        return Err(RevisionError::SuggestionOnly { index });
    }
    let decision = state.decision(index);
    if decision != Decision::Pending {
        return Err(RevisionError::AlreadyDecided { index, decision });
    }
    let patch = review.resolve_patch(index, option).ok_or(match option {
        Some(option) => RevisionError::UnknownOption { index, option },
        None => RevisionError::UnknownFinding { index },
    })?;

    let base = effective_text(original, review, state, Some(index));
    let applied =
        apply_patch(&base, patch).map_err(|source| RevisionError::Patch { index, source })?;
    if applied.anchor.is_fallback() {
        warn!(index, "span no longer matches; applied using the 'from' text");
    }
    Ok(applied.anchor)
}
