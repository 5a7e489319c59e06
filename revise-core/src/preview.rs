//! Before/after previews of revised text.
//!
//! Line-level unified diffs summarise everything accepted so far; word-level
//! inline changes show what a single finding would do to its passage.

use similar::{ChangeTag, TextDiff};

/// Kind of a word-level segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Equal,
    Removed,
    Inserted,
}

/// A run of text from a word diff. `emphasized` marks the words that actually
/// changed within a removed or inserted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSegment {
    pub kind: SegmentKind,
    pub text: String,
    pub emphasized: bool,
}

/// Line counts touched between two versions of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeStats {
    pub inserted_lines: usize,
    pub removed_lines: usize,
}

impl ChangeStats {
    pub fn is_empty(&self) -> bool {
        self.inserted_lines == 0 && self.removed_lines == 0
    }
}

/// Unified diff from `original` to `revised`, both labelled with `path`.
///
/// Returns an empty string when the texts are identical.
pub fn unified_diff(original: &str, revised: &str, path: &str) -> String {
    if original == revised {
        return String::new();
    }
    TextDiff::from_lines(original, revised)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string()
}

pub fn change_stats(original: &str, revised: &str) -> ChangeStats {
    let diff = TextDiff::from_lines(original, revised);
    let mut stats = ChangeStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.inserted_lines += 1,
            ChangeTag::Delete => stats.removed_lines += 1,
            ChangeTag::Equal => {}
        }
    }
    stats
}

/// Word-level diff of a passage before and after an edit.
///
/// Returns two parallel segment lists: the old passage (equal + removed) and
/// the new passage (equal + inserted).
pub fn inline_changes(old: &str, new: &str) -> (Vec<InlineSegment>, Vec<InlineSegment>) {
    let diff = TextDiff::from_words(old, new);
    let mut old_segments = Vec::new();
    let mut new_segments = Vec::new();

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                match change.tag() {
                    ChangeTag::Delete => old_segments.push(InlineSegment {
                        kind: SegmentKind::Removed,
                        text,
                        emphasized,
                    }),
                    ChangeTag::Insert => new_segments.push(InlineSegment {
                        kind: SegmentKind::Inserted,
                        text,
                        emphasized,
                    }),
                    ChangeTag::Equal => {
                        let segment = InlineSegment { kind: SegmentKind::Equal, text, emphasized: false };
                        old_segments.push(segment.clone());
                        new_segments.push(segment);
                    }
                }
            }
        }
    }
    (old_segments, new_segments)
}
