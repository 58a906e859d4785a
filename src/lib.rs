//! Cross-platform subprocess execution: spawn a command line, feed it
//! stdin, drain its stdout/stderr without blocking, enforce wall-clock and
//! idle timeouts, and reap it with an accurate exit code.
//!
//! [`Process`] is the single entry point: it owns the lifecycle state
//! machine (`Ready -> Started -> Terminated`) and delegates the
//! platform-specific descriptor plumbing to a [`pipe::PipeBackend`].

pub mod error;
pub mod escape;
pub mod exec_finder;
pub mod exit_code;
pub mod input;
pub mod pipe;
pub mod process;
pub mod spawn;

use std::time::Duration;

pub use error::{ProcessError, Result, TimeoutKind};
pub use input::{Input, RawInput, Scalar};
pub use process::{OutputStream, PopenOptions, PopenStatus, Process, ProcessInformation, ProcessSnapshot};

/// Stream key for stdout in incremental/output accessors.
pub const OUT: &str = "out";
/// Stream key for stderr in incremental/output accessors.
pub const ERR: &str = "err";

/// Lifecycle status labels, for display and logging.
pub const STATUS_READY: &str = "ready";
pub const STATUS_STARTED: &str = "started";
pub const STATUS_TERMINATED: &str = "terminated";

/// Standard descriptor numbers, used when mapping extra files/redirections.
pub const STDIN: i32 = 0;
pub const STDOUT: i32 = 1;
pub const STDERR: i32 = 2;

/// Upper bound on how long any single non-blocking I/O step waits for
/// readiness before the engine re-checks timeouts (spec §6).
pub const TIMEOUT_PRECISION: Duration = Duration::from_millis(200);
