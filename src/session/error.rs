//! Session-specific error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while running a compiler process.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to spawn the compiler process.
    #[error("failed to spawn compiler process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Talking to the compiler process failed.
    #[error("compiler process I/O failed: {0}")]
    Io(#[source] io::Error),

    /// The compiler reported diagnostics for the root.
    #[error("Could not compile source file {root}")]
    CompilationFailed {
        root: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// The compiler lost its bridge to this process.
    #[error("compiler for {root} lost its source bridge: {message}")]
    BridgeFailed { root: String, message: String },

    /// The compiler exited with an unexpected status.
    #[error("compiler for {root} exited with status {code}: {stderr}")]
    ChildFailed {
        root: String,
        code: i32,
        stderr: String,
    },

    /// The compiler was killed by a signal.
    #[error("compiler for {root} was terminated by a signal")]
    Aborted { root: String },

    /// The session ran longer than the configured bound.
    #[error("compiler for {root} timed out after {limit:?}")]
    Timeout { root: String, limit: Duration },
}

impl SessionError {
    /// Diagnostics carried by a compilation failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::CompilationFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Check if the compiler process ended abnormally.
    pub fn is_abnormal_exit(&self) -> bool {
        matches!(
            self,
            Self::Aborted { .. } | Self::ChildFailed { .. } | Self::Timeout { .. }
        )
    }
}
