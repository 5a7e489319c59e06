//! Safe application of a single patch.
//!
//! A review session is generated against a snapshot of the document, so by
//! the time a patch is applied the text may have drifted. The applier first
//! tries the patch's span, then falls back to `from` when the span no longer
//! occurs. It never guesses between several candidate matches: any anchor
//! that occurs more than once is a refusal.

use tracing::debug;

use crate::anchor::{locate, Occurrence};
use crate::error::PatchError;
use crate::types::Patch;

/// Which anchor located the replaced text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// The patch's span occurred exactly once.
    Span,
    /// The patch had no span; `from` occurred exactly once.
    From,
    /// The span was set but no longer occurs; `from` occurred exactly once.
    FallbackFrom,
}

impl AnchorKind {
    pub fn is_fallback(self) -> bool {
        self == AnchorKind::FallbackFrom
    }
}

/// Successful patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    pub anchor: AnchorKind,
    /// Byte offset in the input text where the replaced anchor started.
    pub position: usize,
}

/// Replaces the patch's unique anchor in `text` with `patch.to`.
///
/// All text outside the anchored occurrence is preserved byte for byte.
///
/// # Errors
///
/// Returns `PatchError::AmbiguousSpan` / `AmbiguousFrom` when the resolved
/// anchor occurs more than once, `NotFound` when neither anchor occurs, and
/// `EmptyAnchor` when the patch has nothing to search for.
pub fn apply_patch(text: &str, patch: &Patch) -> Result<Applied, PatchError> {
    let (anchor, needle, position) = resolve_anchor(text, patch)?;

    let end = position + needle.len();
    let mut out = String::with_capacity(text.len() - needle.len() + patch.to.len());
    out.push_str(&text[..position]);
    out.push_str(&patch.to);
    out.push_str(&text[end..]);

    debug!(position, ?anchor, "patch applied");
    Ok(Applied { text: out, anchor, position })
}

/// Runs the same anchor checks as [`apply_patch`] without building new text.
///
/// # Errors
///
/// Returns the refusal `apply_patch` would return.
pub fn check_patch(text: &str, patch: &Patch) -> Result<AnchorKind, PatchError> {
    resolve_anchor(text, patch).map(|(anchor, _, _)| anchor)
}

/// True when `patch` would apply cleanly to `text`.
pub fn can_apply_patch(text: &str, patch: &Patch) -> bool {
    check_patch(text, patch).is_ok()
}

fn resolve_anchor<'p>(
    text: &str,
    patch: &'p Patch,
) -> Result<(AnchorKind, &'p str, usize), PatchError> {
    let span = patch.span.as_deref().filter(|s| !s.is_empty());

    if let Some(span) = span {
        match locate(text, span)?.occurrence() {
            Occurrence::Unique(pos) => return Ok((AnchorKind::Span, span, pos)),
            Occurrence::Ambiguous(count) => return Err(PatchError::AmbiguousSpan { count }),
            Occurrence::Missing => debug!("span not found, falling back to 'from'"),
        }
    }

    match locate(text, &patch.from)?.occurrence() {
        Occurrence::Unique(pos) => {
            let kind = if span.is_some() { AnchorKind::FallbackFrom } else { AnchorKind::From };
            Ok((kind, patch.from.as_str(), pos))
        }
        Occurrence::Ambiguous(count) => Err(PatchError::AmbiguousFrom { count }),
        Occurrence::Missing => Err(PatchError::NotFound),
    }
}
