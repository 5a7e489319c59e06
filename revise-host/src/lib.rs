//! revise-host — async plumbing around `revise-core`.
//!
//! Provides the collaborator seams the engine is driven through
//! ([`DocumentHost`], [`StateStore`]), a SQLite-backed state store in WAL mode,
//! a filesystem document host, the per-document [`Workspace`], and a tokio
//! actor ([`spawn_review_actor`]) that serializes review commands.
//!
//! Configuration comes from `config.toml` ([`Config`]) and logging goes
//! through `tracing` ([`init_tracing`]).

pub mod actor;
pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod logging;
pub mod schema;
pub mod workspace;

pub use actor::{spawn_review_actor, ReviewCommand, ReviewHandle};
pub use config::{config_path, Config};
pub use error::{HostError, HostResult};
pub use host::{DocumentHost, FsDocumentHost, SqliteStateStore, StateStore};
pub use logging::init_tracing;
pub use workspace::{DocumentStatus, LoadedSession, OpenDocument, Workspace};
