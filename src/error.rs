//! Error taxonomy for the process engine.
//!
//! Mirrors the five error *kinds* the engine distinguishes: a caller can
//! match on the variant to decide whether a failure was their own misuse
//! (`InvalidArgument`, `Logic`), an operational failure of the OS/child
//! (`Runtime`), or an expected outcome of running something (`ProcessTimedOut`,
//! `ProcessFailed`).

use crate::process::ProcessSnapshot;

/// Which clock expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The overall wall-clock `timeout` elapsed.
    General,
    /// No output was seen on either stream for `idleTimeout`.
    Idle,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::General => write!(f, "general"),
            TimeoutKind::Idle => write!(f, "idle"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// Bad input to a setter: negative timeout, non-scalar/non-stream input, etc.
    #[error("invalid argument to '{caller}': {message}")]
    InvalidArgument { caller: &'static str, message: String },

    /// Misuse: operation requires a precondition the caller didn't satisfy.
    #[error("logic error: {0}")]
    Logic(String),

    /// External/operational failure: spawn failed, signal failed, tty
    /// unavailable, child died by an unexpected signal, etc.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A wall-clock or idle timeout elapsed and the child was stopped.
    #[error("process timed out ({kind})")]
    ProcessTimedOut {
        kind: TimeoutKind,
        process: Box<ProcessSnapshot>,
    },

    /// `must_run` observed a non-zero exit code.
    #[error("process failed with exit code {exit_code}")]
    ProcessFailed {
        exit_code: i32,
        process: Box<ProcessSnapshot>,
    },
}

pub type Result<T> = std::result::Result<T, ProcessError>;

impl ProcessError {
    pub(crate) fn invalid_argument(caller: &'static str, message: impl Into<String>) -> Self {
        ProcessError::InvalidArgument {
            caller,
            message: message.into(),
        }
    }

    pub(crate) fn logic(message: impl Into<String>) -> Self {
        ProcessError::Logic(message.into())
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        ProcessError::Runtime(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_argument() {
        let err = ProcessError::invalid_argument("set_timeout", "timeout must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid argument to 'set_timeout': timeout must be non-negative"
        );
    }

    #[test]
    fn display_timeout_kind() {
        assert_eq!(TimeoutKind::General.to_string(), "general");
        assert_eq!(TimeoutKind::Idle.to_string(), "idle");
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProcessError>();
    }
}
