use std::path::PathBuf;

use batchwrite_errors::UserFacingError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured failure information attached to failed batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(Into::into),
        }
    }
}

/// Lifecycle of a batch, one event per observable step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WriteEvent {
    BatchStarted {
        batch_id: Uuid,
        files: usize,
    },

    /// Target resolved through symlinks; `inherited_mode` is set when the
    /// mode was copied from an existing file
    FileResolved {
        batch_id: Uuid,
        target: PathBuf,
        resolved: PathBuf,
        inherited_mode: Option<u32>,
    },

    FileStaged {
        batch_id: Uuid,
        target: PathBuf,
        bytes: u64,
    },

    FileCommitted {
        batch_id: Uuid,
        target: PathBuf,
    },

    BatchCompleted {
        batch_id: Uuid,
        files: usize,
        duration_ms: u64,
    },

    BatchFailed {
        batch_id: Uuid,
        phase: String,
        failure: FailureContext,
    },

    /// Registered temp files were unlinked after a failure or at exit
    CleanupSwept {
        removed: usize,
    },
}

impl WriteEvent {
    /// Batch this event belongs to; sweeps are process-wide
    #[must_use]
    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            Self::BatchStarted { batch_id, .. }
            | Self::FileResolved { batch_id, .. }
            | Self::FileStaged { batch_id, .. }
            | Self::FileCommitted { batch_id, .. }
            | Self::BatchCompleted { batch_id, .. }
            | Self::BatchFailed { batch_id, .. } => Some(*batch_id),
            Self::CleanupSwept { .. } => None,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::BatchFailed { .. } => Level::ERROR,
            Self::CleanupSwept { removed } if *removed > 0 => Level::WARN,
            Self::BatchStarted { .. } | Self::BatchCompleted { .. } => Level::INFO,
            Self::FileResolved { .. } | Self::FileStaged { .. } | Self::FileCommitted { .. } => {
                Level::TRACE
            }
            Self::CleanupSwept { .. } => Level::DEBUG,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::BatchStarted { .. } | Self::BatchCompleted { .. } | Self::BatchFailed { .. } => {
                "batchwrite::events::batch"
            }
            Self::FileResolved { .. } | Self::FileStaged { .. } | Self::FileCommitted { .. } => {
                "batchwrite::events::file"
            }
            Self::CleanupSwept { .. } => "batchwrite::events::cleanup",
        }
    }
}
