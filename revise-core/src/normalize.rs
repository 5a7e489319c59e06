//! Session normalization.
//!
//! Review passes emit JSON in two shapes:
//!
//! - **Simple**: `{ session_id, findings: [{ id?, comment?, severity?, patch: { from, to, span? } }] }`.
//!   Every finding must carry a complete patch.
//! - **Extended** (`rb_session_v1`): findings anchored by `location.anchor_quote`,
//!   with an optional direct `patch`, optional `patch_options`, free-text
//!   `suggestions`, and document-level `summary` / `doc_comments`.
//!
//! Both shapes produce the same [`SessionWithMeta`]. The shape is detected once
//! up front by [`SessionFormat::detect`]; unknown fields are ignored. Any
//! structural violation aborts normalization with an error naming the
//! offending index or field.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::NormalizeError;
use crate::types::{
    DocComment, DocCommentPatch, Finding, FindingMeta, Patch, PatchOption, Session,
    SessionWithMeta, Summary,
};

/// Protocol tag that marks an extended session.
pub const EXTENDED_PROTOCOL: &str = "rb_session_v1";

/// Session id given to extended sessions that do not declare one.
pub const UNKNOWN_SESSION_ID: &str = "unknown";

const OPTION_LABELS: [&str; 5] = ["Option A", "Option B", "Option C", "Option D", "Option E"];

type JsonObject = Map<String, Value>;

/// The input shapes accepted by [`normalize_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFormat {
    Simple,
    Extended,
}

impl SessionFormat {
    /// An object is extended when it declares the extended protocol tag, or
    /// when it has both an object `summary` and an array `doc_comments`.
    pub fn detect(obj: &JsonObject) -> Self {
        let tagged = obj.get("protocol_version").and_then(Value::as_str) == Some(EXTENDED_PROTOCOL);
        let shaped = obj.get("summary").is_some_and(Value::is_object)
            && obj.get("doc_comments").is_some_and(Value::is_array);
        if tagged || shaped {
            SessionFormat::Extended
        } else {
            SessionFormat::Simple
        }
    }
}

/// Parses raw session text in either supported shape.
///
/// Leading and trailing whitespace is ignored.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidJson` when the text is not JSON,
/// `NotAnObject` when the top level is not an object, and an index-qualified
/// variant for any malformed finding, patch option or doc comment.
pub fn normalize_session(raw: &str) -> Result<SessionWithMeta, NormalizeError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(obj) = value else {
        return Err(NormalizeError::NotAnObject);
    };

    let format = SessionFormat::detect(&obj);
    let normalized = match format {
        SessionFormat::Simple => normalize_simple(&obj)?,
        SessionFormat::Extended => normalize_extended(&obj)?,
    };

    debug!(
        ?format,
        session_id = %normalized.session.session_id,
        findings = normalized.len(),
        "session normalized"
    );
    Ok(normalized)
}

fn normalize_simple(obj: &JsonObject) -> Result<SessionWithMeta, NormalizeError> {
    let session_id = str_field(obj, "session_id").ok_or(NormalizeError::InvalidSessionId)?;
    let raw_findings = obj
        .get("findings")
        .and_then(Value::as_array)
        .ok_or(NormalizeError::InvalidFindings)?;

    let findings = raw_findings
        .iter()
        .enumerate()
        .map(|(index, value)| simple_finding(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SessionWithMeta {
        session: Session { session_id, findings },
        summary: None,
        doc_comments: Vec::new(),
        finding_meta: None,
    })
}

fn simple_finding(index: usize, value: &Value) -> Result<Finding, NormalizeError> {
    let finding = value.as_object().ok_or(NormalizeError::FindingNotObject { index })?;
    let patch = finding
        .get("patch")
        .and_then(Value::as_object)
        .ok_or(NormalizeError::PatchNotObject { index })?;
    let (Some(from), Some(to)) = (str_field(patch, "from"), str_field(patch, "to")) else {
        return Err(NormalizeError::PatchFields { index });
    };

    Ok(Finding {
        id: str_field(finding, "id"),
        comment: str_field(finding, "comment").unwrap_or_default(),
        patch: Patch { from, to, span: str_field(patch, "span") },
        severity: str_field(finding, "severity"),
    })
}

fn normalize_extended(obj: &JsonObject) -> Result<SessionWithMeta, NormalizeError> {
    let session_id =
        str_field(obj, "session_id").unwrap_or_else(|| UNKNOWN_SESSION_ID.to_owned());
    let raw_findings = obj.get("findings").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);

    let mut findings = Vec::with_capacity(raw_findings.len());
    let mut metas = Vec::with_capacity(raw_findings.len());
    for (index, value) in raw_findings.iter().enumerate() {
        let (finding, meta) = extended_finding(index, value)?;
        findings.push(finding);
        metas.push(meta);
    }

    let summary = obj.get("summary").and_then(Value::as_object).map(summary_from);
    let doc_comments = match obj.get("doc_comments").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| doc_comment(index, value))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(SessionWithMeta {
        session: Session { session_id, findings },
        summary,
        doc_comments,
        finding_meta: if metas.is_empty() { None } else { Some(metas) },
    })
}

fn extended_finding(index: usize, value: &Value) -> Result<(Finding, FindingMeta), NormalizeError> {
    let finding = value.as_object().ok_or(NormalizeError::FindingNotObject { index })?;

    let anchor = finding
        .get("location")
        .and_then(Value::as_object)
        .and_then(|loc| str_field(loc, "anchor_quote"))
        .filter(|a| !a.is_empty());
    let patch_obj = finding.get("patch").and_then(Value::as_object);
    let direct = patch_obj.and_then(|p| Some((str_field(p, "from")?, str_field(p, "to")?)));

    let from_str = direct
        .as_ref()
        .map(|(from, _)| from.clone())
        .or_else(|| anchor.clone())
        .unwrap_or_default();
    let span_str = patch_obj
        .and_then(|p| str_field(p, "span"))
        .filter(|s| !s.is_empty())
        .or_else(|| anchor.clone());

    let mut options = Vec::new();
    if !from_str.is_empty() {
        let raw_options =
            finding.get("patch_options").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
        for (option, raw) in raw_options.iter().enumerate() {
            let raw = raw.as_object().ok_or_else(|| invalid_option(index, option))?;
            let to = str_field(raw, "to").ok_or_else(|| invalid_option(index, option))?;
            options.push(PatchOption {
                label: str_field(raw, "label").unwrap_or_else(|| option_label(option)),
                patch: Patch { from: from_str.clone(), to, span: span_str.clone() },
            });
        }
    }

    let has_patch = direct.is_some() || !options.is_empty();
    let patch = match direct {
        Some((from, to)) => Patch { from, to, span: span_str.clone() },
        None if options.len() == 1 => options[0].patch.clone(),
        None => Patch { from: from_str.clone(), to: from_str, span: span_str },
    };
    if options.len() < 2 {
        options.clear();
    }

    let normalized = Finding {
        id: str_field(finding, "finding_id"),
        comment: str_field(finding, "comment").unwrap_or_default(),
        patch,
        severity: str_field(finding, "severity"),
    };
    let meta = FindingMeta {
        rationale: str_field(finding, "rationale"),
        tradeoff: str_field(finding, "tradeoff"),
        suggestions: string_list(finding, "suggestions"),
        tags: string_list(finding, "tags"),
        agent_id: str_field(finding, "agent_id"),
        confidence: str_field(finding, "confidence"),
        has_patch,
        patch_options: options,
    };
    Ok((normalized, meta))
}

fn invalid_option(index: usize, option: usize) -> NormalizeError {
    NormalizeError::InvalidPatchOption { index, option }
}

/// "Option A" through "Option E", then "Option 6", "Option 7", ...
fn option_label(position: usize) -> String {
    OPTION_LABELS
        .get(position)
        .map(|label| (*label).to_owned())
        .unwrap_or_else(|| format!("Option {}", position + 1))
}

fn summary_from(obj: &JsonObject) -> Summary {
    Summary {
        big_picture: str_field(obj, "big_picture"),
        what_improved: string_list(obj, "what_improved"),
        top_risks: string_list(obj, "top_risks"),
        recommended_next_pass: str_field(obj, "recommended_next_pass"),
    }
}

fn doc_comment(index: usize, value: &Value) -> Result<DocComment, NormalizeError> {
    let d = value.as_object().ok_or(NormalizeError::DocCommentNotObject { index })?;

    // A recommended edit that changes nothing is not worth surfacing.
    let patch = d
        .get("patch")
        .and_then(Value::as_object)
        .and_then(|p| Some(DocCommentPatch { from: str_field(p, "from")?, to: str_field(p, "to")? }))
        .filter(|p| p.from != p.to);

    Ok(DocComment {
        agent_id: str_field(d, "agent_id"),
        severity: str_field(d, "severity"),
        comment: str_field(d, "comment"),
        rationale: str_field(d, "rationale"),
        confidence: str_field(d, "confidence"),
        anchor_quote: str_field(d, "anchor_quote"),
        patch,
        suggestions: string_list(d, "suggestions"),
    })
}

fn str_field(obj: &JsonObject, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// String entries of an array field; non-string entries are skipped.
fn string_list(obj: &JsonObject, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}
