//! Domain-specific errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Reasons a fragment's declared options could not be linked to real files.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkageError {
    #[error("{0}")]
    InvalidOptions(String),
    #[error("File not found: {}", .0.display())]
    SourceFileNotFound(PathBuf),
    #[error("Unable to read file {}: {reason}", .file.display())]
    SourceFileUnreadable { file: PathBuf, reason: String },
    #[error("Project not found: {}", .0.display())]
    ProjectNotFound(PathBuf),
    #[error("Region \"{region}\" not found in file {}", .file.display())]
    RegionNotFound { region: String, file: PathBuf },
}

/// Failures talking to the compiler service itself.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("no compiler command configured")]
    NoCommand,
    #[error("failed to start compiler `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compiler i/o failed")]
    Io(#[from] std::io::Error),
    #[error("compiler returned an unreadable response")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("compiler timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
