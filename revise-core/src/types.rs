use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A literal text replacement proposed by a review pass.
///
/// `span`, when present and non-empty, is the preferred anchor to search for;
/// `from` is the fallback anchor and also the text being replaced when the
/// span is absent. `to` may equal `from`: such a patch changes nothing and
/// marks a passage as approved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

impl Patch {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into(), span: None }
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    /// True when applying the patch would leave the anchored text unchanged.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// The text a reader should look for: the span when set, otherwise `from`.
    pub fn anchor(&self) -> &str {
        match self.span.as_deref() {
            Some(span) if !span.is_empty() => span,
            _ => &self.from,
        }
    }
}

/// One reviewable item: a proposed change plus the reviewer's rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub comment: String,
    pub patch: Patch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

/// An ordered batch of findings from one review pass.
///
/// Order is significant: it is the display order and the order in which
/// accepted patches are replayed over the original document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub findings: Vec<Finding>,
}

impl Session {
    /// Returns each finding's search anchor (span, else `from`), skipping empty ones.
    ///
    /// Consumers use these to highlight the reviewed passages in an editor.
    pub fn highlight_anchors(&self) -> Vec<&str> {
        self.findings
            .iter()
            .map(|f| f.patch.anchor())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Document-level narrative attached to an extended session. Never affects patching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_picture: Option<String>,
    #[serde(default)]
    pub what_improved: Vec<String>,
    #[serde(default)]
    pub top_risks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_next_pass: Option<String>,
}

/// Example edit carried by a doc comment, for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocCommentPatch {
    pub from: String,
    pub to: String,
}

/// A free-standing annotation anchored to a quoted excerpt.
///
/// Doc comments never enter the accept/ignore state machine. `patch` is only
/// kept when it would actually change the text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocComment {
    pub agent_id: Option<String>,
    pub severity: Option<String>,
    pub comment: Option<String>,
    pub rationale: Option<String>,
    pub confidence: Option<String>,
    /// Quote from the document to jump to when the comment is selected.
    pub anchor_quote: Option<String>,
    pub patch: Option<DocCommentPatch>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// One mutually exclusive replacement for a finding ("Option A", "Option B", ...).
///
/// All options of a finding share the same `from`/`span` and differ only in `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOption {
    pub label: String,
    pub patch: Patch,
}

/// Auxiliary metadata for a finding, index-aligned with `Session::findings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingMeta {
    pub rationale: Option<String>,
    pub tradeoff: Option<String>,
    /// Free-text alternative phrasings with no structured patch.
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub agent_id: Option<String>,
    pub confidence: Option<String>,
    /// `false` marks a suggestion-only finding that cannot be accepted.
    pub has_patch: bool,
    /// Either empty or at least two entries; a single option is folded into
    /// the finding's primary patch instead.
    #[serde(default)]
    pub patch_options: Vec<PatchOption>,
}

/// A normalized session plus everything the extended format carries alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWithMeta {
    pub session: Session,
    pub summary: Option<Summary>,
    #[serde(default)]
    pub doc_comments: Vec<DocComment>,
    /// Present for extended sessions only; simple sessions have no metadata.
    pub finding_meta: Option<Vec<FindingMeta>>,
}

impl SessionWithMeta {
    pub fn len(&self) -> usize {
        self.session.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.findings.is_empty()
    }

    pub fn finding(&self, index: usize) -> Option<&Finding> {
        self.session.findings.get(index)
    }

    pub fn meta(&self, index: usize) -> Option<&FindingMeta> {
        self.finding_meta.as_ref().and_then(|m| m.get(index))
    }

    /// Findings without metadata always carry a structured patch.
    pub fn has_patch(&self, index: usize) -> bool {
        self.meta(index).map_or(true, |m| m.has_patch)
    }

    pub fn patch_options(&self, index: usize) -> &[PatchOption] {
        self.meta(index).map_or(&[], |m| m.patch_options.as_slice())
    }

    /// Resolves the patch to replay for `index`: the chosen option's patch when
    /// `option` is set, otherwise the finding's primary patch.
    pub fn resolve_patch(&self, index: usize, option: Option<usize>) -> Option<&Patch> {
        match option {
            Some(o) => self.patch_options(index).get(o).map(|opt| &opt.patch),
            None => self.finding(index).map(|f| &f.patch),
        }
    }
}

/// Accept/ignore progress for one document as written to the state store.
///
/// Field names follow the camelCase wire format shared with earlier tools;
/// option choices are keyed by the finding index rendered as a string.
/// `original_text` is the document text the session was loaded against;
/// snapshots from tools that did not record it leave it unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub raw_json: String,
    #[serde(default)]
    pub accepted_indices: Vec<usize>,
    #[serde(default)]
    pub ignored_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accepted_option_by_index: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl PersistedState {
    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original_text = Some(original.into());
        self
    }
}
