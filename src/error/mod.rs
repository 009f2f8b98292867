//! Unified error type for the cadence engine.
//!
//! Every failure surfaced to callers carries enough structure (run id, stage
//! name, kind) to decide whether a retry is safe. The engine itself never
//! retries; that policy belongs to the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The unified error type for the cadence application
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Artifact store error: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Update mode requested without the reusable artifacts from a prior
    /// full run. Reported before any stage executes.
    #[error("missing prerequisite artifacts: {}", missing.join(", "))]
    MissingPrerequisites { missing: Vec<String> },

    #[error("stage '{stage}' failed in run {run_id}: {message}")]
    StageFailed {
        run_id: Uuid,
        stage: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("stage '{stage}' exceeded its {deadline:?} deadline in run {run_id}")]
    StageTimeout {
        run_id: Uuid,
        stage: String,
        deadline: Duration,
    },

    #[error("interrupt protocol violation: {reason}")]
    InterruptProtocol { reason: String },

    #[error("workflow graph is invalid: {message}")]
    Graph { message: String },

    #[error("reasoning call failed: {message}")]
    Reasoning {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Coarse classification used by callers to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Storage,
    Precondition,
    StageExecution,
    Timeout,
    InterruptProtocol,
    Graph,
    Reasoning,
}

impl CoachError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn config_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
            source: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn storage_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            path: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn stage_failed(
        run_id: Uuid,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StageFailed {
            run_id,
            stage: stage.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn interrupt_protocol(reason: impl Into<String>) -> Self {
        Self::InterruptProtocol {
            reason: reason.into(),
        }
    }

    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
        }
    }

    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::Reasoning {
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::MissingPrerequisites { .. } => ErrorKind::Precondition,
            Self::StageFailed { .. } => ErrorKind::StageExecution,
            Self::StageTimeout { .. } => ErrorKind::Timeout,
            Self::InterruptProtocol { .. } => ErrorKind::InterruptProtocol,
            Self::Graph { .. } => ErrorKind::Graph,
            Self::Reasoning { .. } => ErrorKind::Reasoning,
        }
    }

    /// Retrying is only safe when the failure was transient execution, not a
    /// precondition or protocol violation the caller must correct first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StageExecution | ErrorKind::Timeout | ErrorKind::Reasoning
        )
    }

    /// Process exit code for the CLI surface. Four distinct outcomes:
    /// 0 success (not represented here), 1 stage failure, 2 validation,
    /// 3 prerequisites missing.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config | ErrorKind::Graph => 2,
            ErrorKind::Precondition => 3,
            _ => 1,
        }
    }

    /// The stage this error is attached to, when there is one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. } | Self::StageTimeout { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;
