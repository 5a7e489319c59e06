//! Collaborator seams between the engine and the outside world.
//!
//! [`DocumentHost`] reads and writes document text and moves the editor
//! selection; [`StateStore`] keeps per-document review progress across
//! restarts. Both are addressed by a document id, which for the bundled
//! implementations is a path relative to a workspace root.

use std::future::Future;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use revise_core::PersistedState;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::error::{HostError, HostResult};

/// The editing surface a review is applied to.
pub trait DocumentHost {
    fn read_document(&self, id: &str) -> impl Future<Output = HostResult<String>> + Send;

    fn write_document(&self, id: &str, text: &str) -> impl Future<Output = HostResult<()>> + Send;

    /// Best-effort: highlights `range` (byte offsets) in the document's view.
    fn select_range(
        &self,
        id: &str,
        range: Range<usize>,
    ) -> impl Future<Output = HostResult<()>> + Send;
}

/// Durable per-document review state.
pub trait StateStore {
    fn load_state(
        &self,
        id: &str,
    ) -> impl Future<Output = HostResult<Option<PersistedState>>> + Send;

    fn save_state(
        &self,
        id: &str,
        state: &PersistedState,
    ) -> impl Future<Output = HostResult<()>> + Send;
}

/// Plain files under a root directory.
///
/// There is no view to scroll, so [`select_range`](DocumentHost::select_range)
/// only remembers the most recent selection.
#[derive(Debug)]
pub struct FsDocumentHost {
    root: PathBuf,
    last_selection: Mutex<Option<(String, Range<usize>)>>,
}

impl FsDocumentHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), last_selection: Mutex::new(None) }
    }

    pub fn last_selection(&self) -> Option<(String, Range<usize>)> {
        self.last_selection.lock().ok().and_then(|guard| guard.clone())
    }

    /// Joins `id` onto the root, refusing absolute ids and `..` components.
    fn resolve(&self, id: &str) -> HostResult<PathBuf> {
        let relative = Path::new(id);
        let escapes = id.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(HostError::InvalidPath(id.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentHost for FsDocumentHost {
    async fn read_document(&self, id: &str) -> HostResult<String> {
        let path = self.resolve(id)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| HostError::io(id, e))
    }

    async fn write_document(&self, id: &str, text: &str) -> HostResult<()> {
        let path = self.resolve(id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| HostError::io(id, e))?;
        }
        tokio::fs::write(&path, text).await.map_err(|e| HostError::io(id, e))?;
        debug!(id, bytes = text.len(), "document written");
        Ok(())
    }

    async fn select_range(&self, id: &str, range: Range<usize>) -> HostResult<()> {
        self.resolve(id)?;
        debug!(id, start = range.start, end = range.end, "selection moved");
        if let Ok(mut guard) = self.last_selection.lock() {
            *guard = Some((id.to_owned(), range));
        }
        Ok(())
    }
}

/// [`StateStore`] backed by the WAL-mode SQLite database from [`db::open_db`].
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Opens the database at `path`, creating its parent directory first.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Io` if the directory cannot be created and
    /// `HostError::Db` if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HostError::io(parent.display().to_string(), e))?;
        }
        let conn = db::open_db(path).await?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StateStore for SqliteStateStore {
    async fn load_state(&self, id: &str) -> HostResult<Option<PersistedState>> {
        Ok(db::load_state(&self.conn, id).await?)
    }

    async fn save_state(&self, id: &str, state: &PersistedState) -> HostResult<()> {
        db::save_state(&self.conn, id, state).await?;
        Ok(())
    }
}
