//! Error taxonomy for the extraction engine.
//!
//! Only run-level preconditions surface as errors from [`crate::Engine::run`].
//! Plugin-local failures are downgraded to a [`crate::RunStatus::Failure`]
//! record at the plugin boundary and never reach the caller as an `Err`.

use std::path::PathBuf;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, LeappError>;

/// Errors that can occur in the engine
#[derive(Debug, thiserror::Error)]
pub enum LeappError {
    /// One plugin's metadata is invalid; the plugin is excluded
    #[error("Invalid plugin {identity}: {reason}")]
    Discovery { identity: String, reason: String },

    /// Two plugins registered under the same identity
    #[error("Duplicate plugin identity: {0}")]
    DuplicateIdentity(String),

    /// A profile file could not be read or has the wrong marker/version
    #[error("Invalid profile {path:?}: {reason}")]
    ProfileFormat { path: PathBuf, reason: String },

    /// A case data file could not be read or has the wrong marker
    #[error("Invalid case data file {path:?}: {reason}")]
    CaseDataFormat { path: PathBuf, reason: String },

    /// A plugin failed while extracting
    #[error("Plugin {identity} failed: {message}")]
    PluginExecution { identity: String, message: String },

    /// The input root or output folder is unusable
    #[error("{context}: {source}")]
    GlobalIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The run was started with an empty selection
    #[error("No plugins selected")]
    NoPluginsSelected,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LeappError {
    pub(crate) fn global_io(context: impl Into<String>, source: std::io::Error) -> Self {
        LeappError::GlobalIo {
            context: context.into(),
            source,
        }
    }

    /// True for errors that stop a run before any plugin executes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LeappError::DuplicateIdentity(_)
                | LeappError::GlobalIo { .. }
                | LeappError::NoPluginsSelected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LeappError::NoPluginsSelected.is_fatal());
        assert!(LeappError::DuplicateIdentity("a".into()).is_fatal());
        assert!(!LeappError::PluginExecution {
            identity: "a".into(),
            message: "boom".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_identity() {
        let err = LeappError::Discovery {
            identity: "photos.fav".into(),
            reason: "missing category".into(),
        };
        assert_eq!(err.to_string(), "Invalid plugin photos.fav: missing category");
    }
}
