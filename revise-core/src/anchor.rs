//! Literal anchor lookup.
//!
//! Anchors are matched as exact substrings, scanning left to right without
//! overlap. Uniqueness, not position, decides whether an edit is safe: a
//! patch is only applied when its anchor occurs exactly once.

use std::ops::Range;

use crate::error::AnchorError;

/// How many times an anchor occurs, with the byte offset of the first hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub count: usize,
    pub position: Option<usize>,
}

/// Occurrence classes that drive the apply decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    Missing,
    /// Exactly one match, at this byte offset.
    Unique(usize),
    /// Two or more matches.
    Ambiguous(usize),
}

impl Location {
    pub fn occurrence(&self) -> Occurrence {
        match (self.count, self.position) {
            (1, Some(pos)) => Occurrence::Unique(pos),
            (0, _) | (_, None) => Occurrence::Missing,
            (n, _) => Occurrence::Ambiguous(n),
        }
    }
}

/// Counts non-overlapping occurrences of `needle` in `text`.
///
/// # Errors
///
/// Returns `AnchorError::Empty` for an empty needle.
pub fn count_occurrences(text: &str, needle: &str) -> Result<usize, AnchorError> {
    if needle.is_empty() {
        return Err(AnchorError::Empty);
    }
    Ok(text.matches(needle).count())
}

/// Counts `needle` in `text` and reports where the first occurrence starts.
///
/// # Errors
///
/// Returns `AnchorError::Empty` for an empty needle.
pub fn locate(text: &str, needle: &str) -> Result<Location, AnchorError> {
    if needle.is_empty() {
        return Err(AnchorError::Empty);
    }
    let mut hits = text.match_indices(needle);
    let position = hits.next().map(|(pos, _)| pos);
    let count = match position {
        Some(_) => 1 + hits.count(),
        None => 0,
    };
    Ok(Location { count, position })
}

/// A matched excerpt with up to `context_chars` characters on either side.
///
/// `before` starts with `…` when text was cut on the left, `after` ends with
/// `…` when text was cut on the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub before: String,
    pub matched: String,
    pub after: String,
}

/// Builds a preview snippet around the first occurrence of `needle`.
///
/// Returns `None` when `needle` is empty or absent. Context is measured in
/// characters so multi-byte text is never split mid-codepoint.
pub fn snippet(text: &str, needle: &str, context_chars: usize) -> Option<Snippet> {
    let pos = locate(text, needle).ok()?.position?;
    let match_end = pos + needle.len();

    let start = text[..pos]
        .char_indices()
        .rev()
        .take(context_chars)
        .last()
        .map_or(pos, |(i, _)| i);
    let end = text[match_end..]
        .char_indices()
        .nth(context_chars)
        .map_or(text.len(), |(i, _)| match_end + i);

    let mut before = String::new();
    if start > 0 {
        before.push('…');
    }
    before.push_str(&text[start..pos]);

    let mut after = text[match_end..end].to_owned();
    if end < text.len() {
        after.push('…');
    }

    Some(Snippet { before, matched: text[pos..match_end].to_owned(), after })
}

/// Byte ranges of the first occurrence of each non-empty anchor found in `text`.
///
/// Anchors that do not occur are skipped; ranges come back sorted by start.
pub fn highlight_ranges<'a, I>(text: &str, anchors: I) -> Vec<Range<usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ranges: Vec<Range<usize>> = anchors
        .into_iter()
        .filter_map(|anchor| {
            let pos = locate(text, anchor).ok()?.position?;
            Some(pos..pos + anchor.len())
        })
        .collect();
    ranges.sort_by_key(|r| (r.start, r.end));
    ranges.dedup();
    ranges
}
