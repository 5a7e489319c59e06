use revise_core::{NormalizeError, RevisionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("state store error: {0}")]
    Db(#[from] tokio_rusqlite::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid review session: {0}")]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error("document is not open: {0}")]
    NotOpen(String),

    #[error("no review session loaded for {0}")]
    NoSession(String),

    #[error("document path escapes the workspace root: {0}")]
    InvalidPath(String),

    #[error("review actor has shut down")]
    ActorClosed,
}

impl HostError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type HostResult<T> = Result<T, HostError>;
