//! User configuration loaded from `config.toml`.
//!
//! Every key is optional. A missing file, an unreadable file or a parse error
//! yields [`Config::default`] plus a warning; configuration never stops the
//! host from starting.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_DATABASE_PATH: &str = ".revise/state.db";
pub const DEFAULT_SNIPPET_CONTEXT_CHARS: usize = 50;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding review state. Relative paths resolve against the
    /// process working directory.
    pub database_path: PathBuf,
    /// Characters of context on each side of a finding preview.
    pub snippet_context_chars: usize,
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            snippet_context_chars: DEFAULT_SNIPPET_CONTEXT_CHARS,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

/// Returns the path to the revise config file.
///
/// Prefers `$XDG_CONFIG_HOME/revise/config.toml`; falls back to
/// `~/.config/revise/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("revise").join("config.toml")
}

impl Config {
    /// Loads the config from [`config_path`].
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Loads the config from `path`, falling back to defaults on any failure.
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable; using defaults");
                return Self::default();
            }
        };
        match Self::from_toml_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config parse error; using defaults");
                Self::default()
            }
        }
    }

    /// Parses a config document. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `toml::de::Error` if the text is not valid TOML or a known key
    /// has the wrong type.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
