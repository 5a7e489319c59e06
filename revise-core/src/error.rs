//! Error types for the review engine.
//!
//! Every failure the engine can produce is a recoverable condition for the
//! user (edit the document, pick another finding, re-run the review), so all
//! of them are returned as values and render as human-readable messages.

use thiserror::Error;

use crate::revision::Decision;

/// Anchor lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// An empty needle matches everywhere and is never a usable anchor.
    #[error("anchor text is empty")]
    Empty,
}

/// Refusal to apply a patch to the current text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("span appears {count} times; cannot apply safely")]
    AmbiguousSpan { count: usize },

    #[error("'from' appears {count} times; cannot apply safely")]
    AmbiguousFrom { count: usize },

    /// Neither the span nor `from` occurs in the text (stale anchor).
    #[error("could not locate span or 'from' in text")]
    NotFound,

    #[error("patch has no anchor text")]
    EmptyAnchor,
}

impl PatchError {
    /// Number of anchor occurrences that caused the refusal.
    pub fn occurrences(&self) -> usize {
        match self {
            PatchError::AmbiguousSpan { count } | PatchError::AmbiguousFrom { count } => *count,
            PatchError::NotFound | PatchError::EmptyAnchor => 0,
        }
    }
}

impl From<AnchorError> for PatchError {
    fn from(_: AnchorError) -> Self {
        PatchError::EmptyAnchor
    }
}

/// Raw session input could not be turned into a session.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing or invalid session_id (must be a string)")]
    InvalidSessionId,

    #[error("missing or invalid findings (must be an array)")]
    InvalidFindings,

    #[error("findings[{index}] must be an object")]
    FindingNotObject { index: usize },

    #[error("findings[{index}].patch must be an object")]
    PatchNotObject { index: usize },

    #[error("findings[{index}].patch must have from and to (strings)")]
    PatchFields { index: usize },

    #[error("findings[{index}].patch_options[{option}] must be an object with a string `to`")]
    InvalidPatchOption { index: usize, option: usize },

    #[error("doc_comments[{index}] must be an object")]
    DocCommentNotObject { index: usize },
}

/// A state-machine transition was refused. The state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("finding {index} does not exist")]
    UnknownFinding { index: usize },

    #[error("finding {index} is suggestion-only and has no patch to apply")]
    SuggestionOnly { index: usize },

    #[error("finding {index} has already been {decision}")]
    AlreadyDecided { index: usize, decision: Decision },

    #[error("finding {index} has no option {option}")]
    UnknownOption { index: usize, option: usize },

    #[error("finding {index}: {source}")]
    Patch { index: usize, source: PatchError },
}
