//! Errors raised by the atomic batch writer

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::UserFacingError;
use thiserror::Error;

/// Pipeline phase in which a write error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Resolve,
    Stage,
    Commit,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Stage => "stage",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of a single batch.
///
/// Variants that wrap a filesystem failure keep the original `io::Error`
/// so callers can inspect `kind()` and `raw_os_error()` of the root cause.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum WriteError {
    #[error("failed to resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to read metadata of {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to stage {} at {}: {source}", path.display(), temp_path.display())]
    Stage {
        path: PathBuf,
        temp_path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to chown {} to {uid}:{gid}: {source}", temp_path.display())]
    Ownership {
        path: PathBuf,
        temp_path: PathBuf,
        uid: u32,
        gid: u32,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to rename {} onto {}: {source}", temp_path.display(), target.display())]
    Commit {
        temp_path: PathBuf,
        target: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to sync {}: {source}", path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("invalid {encoding} content for {}: {message}", path.display())]
    InvalidContent {
        path: PathBuf,
        encoding: String,
        message: String,
    },

    #[error("unknown encoding: {name}")]
    InvalidEncoding { name: String },

    #[error("write task failed: {message}")]
    Task { message: String },
}

impl WriteError {
    pub fn resolve(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Resolve {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn metadata(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Metadata {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn stage(path: impl Into<PathBuf>, temp_path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Stage {
            path: path.into(),
            temp_path: temp_path.into(),
            source: Arc::new(source),
        }
    }

    pub fn ownership(
        path: impl Into<PathBuf>,
        temp_path: impl Into<PathBuf>,
        uid: u32,
        gid: u32,
        source: io::Error,
    ) -> Self {
        Self::Ownership {
            path: path.into(),
            temp_path: temp_path.into(),
            uid,
            gid,
            source: Arc::new(source),
        }
    }

    pub fn commit(
        temp_path: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Commit {
            temp_path: temp_path.into(),
            target: target.into(),
            source: Arc::new(source),
        }
    }

    pub fn sync(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Sync {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The underlying filesystem error, when there is one.
    #[must_use]
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Resolve { source, .. }
            | Self::Metadata { source, .. }
            | Self::Stage { source, .. }
            | Self::Ownership { source, .. }
            | Self::Commit { source, .. }
            | Self::Sync { source, .. } => Some(source.as_ref()),
            Self::InvalidContent { .. } | Self::InvalidEncoding { .. } | Self::Task { .. } => None,
        }
    }

    /// Kind of the underlying filesystem error, `Other` when there is none.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidContent { .. } | Self::InvalidEncoding { .. } => {
                io::ErrorKind::InvalidInput
            }
            _ => self.io_error().map_or(io::ErrorKind::Other, io::Error::kind),
        }
    }

    /// OS error code of the root cause (`ENOENT`, `EXDEV`, ...).
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Resolve { .. } | Self::Metadata { .. } | Self::InvalidEncoding { .. } => {
                Phase::Resolve
            }
            Self::Stage { .. }
            | Self::Ownership { .. }
            | Self::InvalidContent { .. }
            | Self::Task { .. } => Phase::Stage,
            Self::Commit { .. } | Self::Sync { .. } => Phase::Commit,
        }
    }
}

impl UserFacingError for WriteError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self.kind() {
            io::ErrorKind::PermissionDenied => {
                Some("Adjust filesystem permissions or retry with elevated privileges.")
            }
            io::ErrorKind::CrossesDevices => {
                Some("Stage temp files on the target volume (sibling staging).")
            }
            io::ErrorKind::NotFound if matches!(self, Self::Commit { .. }) => {
                Some("Create the target directory before writing into it.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Resolve { .. } => "write.resolve_failed",
            Self::Metadata { .. } => "write.metadata_failed",
            Self::Stage { .. } => "write.stage_failed",
            Self::Ownership { .. } => "write.ownership_failed",
            Self::Commit { .. } => "write.commit_failed",
            Self::Sync { .. } => "write.sync_failed",
            Self::InvalidContent { .. } => "write.invalid_content",
            Self::InvalidEncoding { .. } => "write.invalid_encoding",
            Self::Task { .. } => "write.task_failed",
        };
        Some(code)
    }
}
