//! revise-core — review-session ingestion and patch-application engine.
//!
//! Turns JSON review output into a canonical [`SessionWithMeta`], applies
//! individual text patches only when their anchor is unique, and tracks which
//! findings a user accepted or ignored so the revised document can always be
//! re-derived from the original text plus the stored decisions.
//!
//! Everything here is synchronous and pure over in-memory strings. Storage,
//! document I/O and the per-document actor live in `revise-host`.

pub mod anchor;
pub mod error;
pub mod normalize;
pub mod patch;
pub mod preview;
pub mod revision;
pub mod types;

pub use anchor::{count_occurrences, highlight_ranges, locate, snippet, Location, Occurrence, Snippet};
pub use error::{AnchorError, NormalizeError, PatchError, RevisionError};
pub use normalize::{normalize_session, SessionFormat, EXTENDED_PROTOCOL};
pub use patch::{apply_patch, can_apply_patch, check_patch, AnchorKind, Applied};
pub use revision::{
    accept, accept_option, can_accept, effective_text, ignore, Accepted, Decision, Progress,
    RevisionState,
};
pub use types::{
    DocComment, DocCommentPatch, Finding, FindingMeta, Patch, PatchOption, PersistedState,
    Session, SessionWithMeta, Summary,
};
