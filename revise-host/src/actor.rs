//! Serialized access to a [`Workspace`] from many callers.
//!
//! The workspace is moved into one tokio task that handles [`ReviewCommand`]s
//! strictly in arrival order over an unbounded MPSC channel, so accept,
//! accept-option and ignore calls for a document never interleave. Callers hold
//! a cloneable [`ReviewHandle`] and await a oneshot reply per command.

use revise_core::{Accepted, Snippet};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{HostError, HostResult};
use crate::host::{DocumentHost, StateStore};
use crate::workspace::{DocumentStatus, Workspace};

type Reply<T> = oneshot::Sender<HostResult<T>>;

/// Every operation the actor performs on behalf of a [`ReviewHandle`].
#[derive(Debug)]
pub enum ReviewCommand {
    Open { path: String, reply: Reply<DocumentStatus> },
    LoadSession { path: String, raw_json: String, reply: Reply<DocumentStatus> },
    Accept { path: String, index: usize, reply: Reply<Accepted> },
    AcceptOption { path: String, index: usize, option: usize, reply: Reply<Accepted> },
    Ignore { path: String, index: usize, reply: Reply<()> },
    EffectiveText { path: String, reply: Reply<String> },
    Status { path: String, reply: Reply<DocumentStatus> },
    Snippet { path: String, index: usize, reply: Reply<Option<Snippet>> },
    JumpTo { path: String, index: usize, reply: Reply<bool> },
    WriteBack { path: String, reply: Reply<String> },
    Close { path: String, reply: oneshot::Sender<bool> },
}

/// Front end of a running review actor. Dropping every clone stops the task.
#[derive(Debug, Clone)]
pub struct ReviewHandle {
    tx: mpsc::UnboundedSender<ReviewCommand>,
}

/// Moves `workspace` into a background task and returns its handle together
/// with the task's `JoinHandle`, which resolves once all handles are dropped.
pub fn spawn_review_actor<H, S>(workspace: Workspace<H, S>) -> (ReviewHandle, JoinHandle<()>)
where
    H: DocumentHost + Send + Sync + 'static,
    S: StateStore + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(workspace, rx));
    (ReviewHandle { tx }, task)
}

async fn run<H, S>(mut workspace: Workspace<H, S>, mut rx: mpsc::UnboundedReceiver<ReviewCommand>)
where
    H: DocumentHost + Send + Sync,
    S: StateStore + Send + Sync,
{
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver means the caller stopped waiting.
        match command {
            ReviewCommand::Open { path, reply } => {
                let _ = reply.send(workspace.open(&path).await);
            }
            ReviewCommand::LoadSession { path, raw_json, reply } => {
                let _ = reply.send(workspace.load_session(&path, &raw_json).await);
            }
            ReviewCommand::Accept { path, index, reply } => {
                let _ = reply.send(workspace.accept(&path, index).await);
            }
            ReviewCommand::AcceptOption { path, index, option, reply } => {
                let _ = reply.send(workspace.accept_option(&path, index, option).await);
            }
            ReviewCommand::Ignore { path, index, reply } => {
                let _ = reply.send(workspace.ignore(&path, index).await);
            }
            ReviewCommand::EffectiveText { path, reply } => {
                let _ = reply.send(workspace.effective_text(&path));
            }
            ReviewCommand::Status { path, reply } => {
                let _ = reply.send(workspace.status(&path));
            }
            ReviewCommand::Snippet { path, index, reply } => {
                let _ = reply.send(workspace.snippet_for(&path, index));
            }
            ReviewCommand::JumpTo { path, index, reply } => {
                let _ = reply.send(workspace.jump_to_finding(&path, index).await);
            }
            ReviewCommand::WriteBack { path, reply } => {
                let _ = reply.send(workspace.write_back(&path).await);
            }
            ReviewCommand::Close { path, reply } => {
                let _ = reply.send(workspace.close(&path));
            }
        }
    }
    debug!("review actor stopped");
}

impl ReviewHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> ReviewCommand,
    ) -> HostResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| HostError::ActorClosed)?;
        rx.await.map_err(|_| HostError::ActorClosed)?
    }

    pub async fn open(&self, path: impl Into<String>) -> HostResult<DocumentStatus> {
        let path = path.into();
        self.request(|reply| ReviewCommand::Open { path, reply }).await
    }

    pub async fn load_session(
        &self,
        path: impl Into<String>,
        raw_json: impl Into<String>,
    ) -> HostResult<DocumentStatus> {
        let (path, raw_json) = (path.into(), raw_json.into());
        self.request(|reply| ReviewCommand::LoadSession { path, raw_json, reply }).await
    }

    pub async fn accept(&self, path: impl Into<String>, index: usize) -> HostResult<Accepted> {
        let path = path.into();
        self.request(|reply| ReviewCommand::Accept { path, index, reply }).await
    }

    pub async fn accept_option(
        &self,
        path: impl Into<String>,
        index: usize,
        option: usize,
    ) -> HostResult<Accepted> {
        let path = path.into();
        self.request(|reply| ReviewCommand::AcceptOption { path, index, option, reply }).await
    }

    pub async fn ignore(&self, path: impl Into<String>, index: usize) -> HostResult<()> {
        let path = path.into();
        self.request(|reply| ReviewCommand::Ignore { path, index, reply }).await
    }

    pub async fn effective_text(&self, path: impl Into<String>) -> HostResult<String> {
        let path = path.into();
        self.request(|reply| ReviewCommand::EffectiveText { path, reply }).await
    }

    pub async fn status(&self, path: impl Into<String>) -> HostResult<DocumentStatus> {
        let path = path.into();
        self.request(|reply| ReviewCommand::Status { path, reply }).await
    }

    pub async fn snippet_for(
        &self,
        path: impl Into<String>,
        index: usize,
    ) -> HostResult<Option<Snippet>> {
        let path = path.into();
        self.request(|reply| ReviewCommand::Snippet { path, index, reply }).await
    }

    pub async fn jump_to_finding(&self, path: impl Into<String>, index: usize) -> HostResult<bool> {
        let path = path.into();
        self.request(|reply| ReviewCommand::JumpTo { path, index, reply }).await
    }

    pub async fn write_back(&self, path: impl Into<String>) -> HostResult<String> {
        let path = path.into();
        self.request(|reply| ReviewCommand::WriteBack { path, reply }).await
    }

    pub async fn close(&self, path: impl Into<String>) -> HostResult<bool> {
        let path = path.into();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ReviewCommand::Close { path, reply })
            .map_err(|_| HostError::ActorClosed)?;
        rx.await.map_err(|_| HostError::ActorClosed)
    }
}
