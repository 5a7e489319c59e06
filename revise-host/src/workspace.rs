//! Open documents and their review progress.
//!
//! A [`Workspace`] owns, per open document, the text the session applies to
//! (the *original*), the normalized session, and the accept/ignore state. The
//! original is stored with the session, so reopening after a write-back
//! replays decisions over the same text they were made against. Every
//! mutation is saved through the [`StateStore`] before it returns; a failed
//! save leaves the in-memory state as it was before the call.

use std::collections::HashMap;

use revise_core::{
    effective_text, locate, normalize_session, snippet, Accepted, Progress, RevisionError,
    RevisionState, SessionWithMeta, Snippet,
};
use tracing::{info, warn};

use crate::config::DEFAULT_SNIPPET_CONTEXT_CHARS;
use crate::error::{HostError, HostResult};
use crate::host::{DocumentHost, StateStore};

/// A session as loaded for one document, with the JSON it came from.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub raw_json: String,
    pub review: SessionWithMeta,
}

#[derive(Debug, Clone)]
pub struct OpenDocument {
    pub path: String,
    /// Text the session was loaded against; the host text when there is none.
    pub original: String,
    pub session: Option<LoadedSession>,
    pub state: RevisionState,
}

impl OpenDocument {
    fn loaded(&self) -> HostResult<&LoadedSession> {
        self.session.as_ref().ok_or_else(|| HostError::NoSession(self.path.clone()))
    }

    pub fn effective_text(&self) -> String {
        match &self.session {
            Some(loaded) => effective_text(&self.original, &loaded.review, &self.state, None),
            None => self.original.clone(),
        }
    }

    pub fn status(&self) -> DocumentStatus {
        let findings = self.session.as_ref().map_or(0, |s| s.review.len());
        DocumentStatus {
            path: self.path.clone(),
            has_session: self.session.is_some(),
            findings,
            progress: self.state.progress(findings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStatus {
    pub path: String,
    pub has_session: bool,
    pub findings: usize,
    pub progress: Progress,
}

pub struct Workspace<H, S> {
    host: H,
    store: S,
    documents: HashMap<String, OpenDocument>,
    snippet_context: usize,
}

impl<H, S> Workspace<H, S>
where
    H: DocumentHost,
    S: StateStore,
{
    pub fn new(host: H, store: S) -> Self {
        Self {
            host,
            store,
            documents: HashMap::new(),
            snippet_context: DEFAULT_SNIPPET_CONTEXT_CHARS,
        }
    }

    pub fn with_snippet_context(mut self, chars: usize) -> Self {
        self.snippet_context = chars;
        self
    }

    pub fn document(&self, path: &str) -> Option<&OpenDocument> {
        self.documents.get(path)
    }

    /// Opens `path`, restoring any stored session and decisions.
    ///
    /// Opening an already open document returns its current status without
    /// re-reading it. A stored session replays over the original text saved
    /// with it; sessions saved without one fall back to the host text. A
    /// stored session whose JSON no longer normalizes is dropped with a
    /// warning and the document opens without one.
    ///
    /// # Errors
    ///
    /// Returns `HostError` if the host cannot read the document or the store
    /// cannot be queried.
    pub async fn open(&mut self, path: &str) -> HostResult<DocumentStatus> {
        if let Some(doc) = self.documents.get(path) {
            return Ok(doc.status());
        }

        let host_text = self.host.read_document(path).await?;
        let (original, session, state) = match self.store.load_state(path).await? {
            Some(persisted) => match normalize_session(&persisted.raw_json) {
                Ok(review) => {
                    let state = RevisionState::from_persisted(&persisted);
                    let session = LoadedSession { raw_json: persisted.raw_json, review };
                    (persisted.original_text.unwrap_or(host_text), Some(session), state)
                }
                Err(e) => {
                    warn!(path, error = %e, "stored session no longer parses; opening without it");
                    (host_text, None, RevisionState::new())
                }
            },
            None => (host_text, None, RevisionState::new()),
        };

        let doc = OpenDocument { path: path.to_owned(), original, session, state };
        let status = doc.status();
        info!(path, findings = status.findings, "document opened");
        self.documents.insert(path.to_owned(), doc);
        Ok(status)
    }

    /// Replaces the document's session with one parsed from `raw_json`.
    ///
    /// All earlier decisions are discarded. The document's current host text
    /// becomes the original the new session applies to, and is saved with the
    /// fresh state.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotOpen`, `HostError::Normalize` if the JSON is not
    /// a recognised session, or a store error (the previous session is kept).
    pub async fn load_session(&mut self, path: &str, raw_json: &str) -> HostResult<DocumentStatus> {
        let review = normalize_session(raw_json)?;
        let doc = self.documents.get_mut(path).ok_or_else(|| HostError::NotOpen(path.to_owned()))?;
        let original = self.host.read_document(path).await?;

        let state = RevisionState::new();
        let persisted = state.to_persisted(raw_json).with_original(original.as_str());
        self.store.save_state(path, &persisted).await?;

        info!(
            path,
            session_id = %review.session.session_id,
            findings = review.len(),
            "review session loaded"
        );
        doc.original = original;
        doc.session = Some(LoadedSession { raw_json: raw_json.to_owned(), review });
        doc.state = state;
        Ok(doc.status())
    }

    /// Accepts finding `index` with its primary patch and returns the new
    /// effective text.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotOpen` or `NoSession` for an unknown document,
    /// `HostError::Revision` when the transition is refused, and the state
    /// store's error when the decision cannot be saved.
    pub async fn accept(&mut self, path: &str, index: usize) -> HostResult<Accepted> {
        self.mutate(path, |state, doc| {
            revise_core::accept(state, &doc.original, &doc.loaded()?.review, index)
                .map_err(HostError::from)
        })
        .await
    }

    /// Accepts finding `index` with option `option` of its patch options.
    ///
    /// # Errors
    ///
    /// As [`Workspace::accept`]; unknown options surface as
    /// `RevisionError::UnknownOption`.
    pub async fn accept_option(
        &mut self,
        path: &str,
        index: usize,
        option: usize,
    ) -> HostResult<Accepted> {
        self.mutate(path, |state, doc| {
            revise_core::accept_option(state, &doc.original, &doc.loaded()?.review, index, option)
                .map_err(HostError::from)
        })
        .await
    }

    /// Marks finding `index` as ignored. Ignoring twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RevisionError::UnknownFinding` for an out-of-range index and
    /// `RevisionError::AlreadyDecided` for an accepted finding.
    pub async fn ignore(&mut self, path: &str, index: usize) -> HostResult<()> {
        self.mutate(path, |state, doc| {
            let review = &doc.loaded()?.review;
            if index >= review.len() {
                return Err(RevisionError::UnknownFinding { index }.into());
            }
            revise_core::ignore(state, index).map_err(HostError::from)
        })
        .await
    }

    /// The document text with every accepted patch replayed.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotOpen` if `path` is not open.
    pub fn effective_text(&self, path: &str) -> HostResult<String> {
        Ok(self.open_document(path)?.effective_text())
    }

    /// # Errors
    ///
    /// Returns `HostError::NotOpen` if `path` is not open.
    pub fn status(&self, path: &str) -> HostResult<DocumentStatus> {
        Ok(self.open_document(path)?.status())
    }

    /// Preview of finding `index` in the text it would be applied to.
    ///
    /// Looks for the span first, then `from`. `None` when neither occurs.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotOpen`, `HostError::NoSession` or
    /// `RevisionError::UnknownFinding`.
    pub fn snippet_for(&self, path: &str, index: usize) -> HostResult<Option<Snippet>> {
        let doc = self.open_document(path)?;
        let review = &doc.loaded()?.review;
        let finding = review.finding(index).ok_or(RevisionError::UnknownFinding { index })?;
        let text = effective_text(&doc.original, review, &doc.state, Some(index));

        let found = search_candidates(&finding.patch.span, &finding.patch.from)
            .find_map(|needle| snippet(&text, needle, self.snippet_context));
        Ok(found)
    }

    /// Selects finding `index`'s passage in the live host document.
    ///
    /// Returns `false` when neither the span nor `from` occurs in the text the
    /// host currently holds.
    ///
    /// # Errors
    ///
    /// Returns the lookup errors of [`Workspace::snippet_for`] and any host
    /// error from reading the document or moving the selection.
    pub async fn jump_to_finding(&self, path: &str, index: usize) -> HostResult<bool> {
        let doc = self.open_document(path)?;
        let finding = doc
            .loaded()?
            .review
            .finding(index)
            .ok_or(RevisionError::UnknownFinding { index })?;

        let live = self.host.read_document(path).await?;
        let hit = search_candidates(&finding.patch.span, &finding.patch.from).find_map(|needle| {
            let pos = locate(&live, needle).ok()?.position?;
            Some(pos..pos + needle.len())
        });

        match hit {
            Some(range) => {
                self.host.select_range(path, range).await?;
                Ok(true)
            }
            None => {
                warn!(path, index, "finding text not found in current document");
                Ok(false)
            }
        }
    }

    /// Writes the effective text back through the host and returns it.
    ///
    /// The original stays as it was, in memory and in the store, so later
    /// accepts and later opens replay over the text the session was loaded
    /// against rather than over the written result.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotOpen` or the host's write error.
    pub async fn write_back(&self, path: &str) -> HostResult<String> {
        let text = self.effective_text(path)?;
        self.host.write_document(path, &text).await?;
        info!(path, bytes = text.len(), "effective text written back");
        Ok(text)
    }

    /// Forgets `path`. Stored state is untouched. Returns whether it was open.
    pub fn close(&mut self, path: &str) -> bool {
        self.documents.remove(path).is_some()
    }

    pub fn open_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.documents.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn open_document(&self, path: &str) -> HostResult<&OpenDocument> {
        self.documents.get(path).ok_or_else(|| HostError::NotOpen(path.to_owned()))
    }

    /// Runs `change` on a copy of the document's state, saves the copy, and
    /// only then installs it.
    async fn mutate<T, F>(&mut self, path: &str, change: F) -> HostResult<T>
    where
        F: FnOnce(&mut RevisionState, &OpenDocument) -> HostResult<T>,
    {
        let doc = self.documents.get_mut(path).ok_or_else(|| HostError::NotOpen(path.to_owned()))?;
        let mut next = doc.state.clone();
        let out = change(&mut next, doc)?;

        if next != doc.state {
            let raw_json = &doc.loaded()?.raw_json;
            let persisted = next.to_persisted(raw_json).with_original(doc.original.as_str());
            self.store.save_state(path, &persisted).await?;
            doc.state = next;
        }
        Ok(out)
    }
}

/// Span (when non-empty) then `from`, skipping a `from` equal to the span.
fn search_candidates<'a>(
    span: &'a Option<String>,
    from: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    let span = span.as_deref().filter(|s| !s.is_empty());
    span.into_iter()
        .chain(Some(from).filter(move |f| !f.is_empty() && Some(*f) != span))
}
