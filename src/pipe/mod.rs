//! Pipe Backend: the platform-specific object that owns the child's three
//! standard descriptors and moves bytes between them and the engine.
//!
//! Both platform variants share one contract (this module) and differ only
//! in how `getDescriptors`/`readAndWrite` are implemented: [`unix`] uses
//! pipes/tty/pty plus non-blocking readiness, [`windows`] redirects output
//! to temp files to dodge the pipe-hang bug and streams them back
//! incrementally.

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::input::Input;

/// Bytes read per drain iteration (spec §4.3).
pub const READ_CHUNK: usize = 16 * 1024;
/// Bytes written per write attempt (spec §4.3).
pub const WRITE_BURST: usize = 512 * 1024;

/// Stream identifiers used as keys in `readAndWrite`'s result map.
pub const STREAM_STDOUT: u8 = 1;
pub const STREAM_STDERR: u8 = 2;
/// Fourth channel used only by the sigchild-compatibility wrapper to echo `$?`.
pub const STREAM_SIGCHILD_FALLBACK: u8 = 3;

/// How a backend wires up each of the child's three standard descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// stdin is a pipe the child reads, stdout/stderr are pipes the child
    /// writes (the default).
    Piped,
    /// output is discarded: stdout/stderr connect to the platform null
    /// device; stdin is still a real pipe so callers can still feed input.
    OutputDisabled,
    /// all three descriptors are `/dev/tty` (POSIX only).
    Tty,
    /// all three descriptors are a freshly allocated pty (POSIX only).
    Pty,
}

impl StdioMode {
    /// Resolve which mode applies, in the priority order spec §4.4 lists:
    /// output-disabled beats tty beats pty beats the plain pipe default.
    pub fn select(output_disabled: bool, tty: bool, pty: bool, pty_supported: bool) -> Self {
        if output_disabled {
            StdioMode::OutputDisabled
        } else if tty {
            StdioMode::Tty
        } else if pty && pty_supported {
            StdioMode::Pty
        } else {
            StdioMode::Piped
        }
    }
}

/// Drains the caller-supplied [`Input`] into an internal buffer and hands
/// out at most [`WRITE_BURST`] bytes per attempt, shared by both backends'
/// write half (spec §4.3 (c)/(d)).
pub struct InputFeed {
    input: Input,
    buffer: Vec<u8>,
    stream_eof: bool,
}

impl InputFeed {
    pub fn new(input: Input) -> Self {
        let (input, buffer, stream_eof) = match input {
            Input::None => (Input::None, Vec::new(), true),
            Input::Bytes(b) => (Input::None, b, true),
            stream @ Input::Stream(_) => (stream, Vec::new(), false),
        };
        InputFeed {
            input,
            buffer,
            stream_eof,
        }
    }

    /// Pull more bytes from a stream source into the internal buffer,
    /// non-blocking: reads whatever is immediately available, or nothing.
    pub async fn refill(&mut self) {
        if let Input::Stream(stream) = &mut self.input {
            let mut chunk = [0u8; READ_CHUNK];
            match stream.read(&mut chunk).await {
                Ok(0) => self.stream_eof = true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(_) => self.stream_eof = true,
            }
        }
    }

    /// True once the stream source is drained (or was never a stream) and
    /// the internal buffer is empty: the signal to close stdin (spec §4.4).
    pub fn is_exhausted(&self) -> bool {
        self.stream_eof && self.buffer.is_empty()
    }

    /// Take up to [`WRITE_BURST`] bytes for one write attempt.
    pub fn take_burst(&mut self) -> Vec<u8> {
        let n = self.buffer.len().min(WRITE_BURST);
        self.buffer.drain(..n).collect()
    }

    /// Return unwritten bytes from a partial write back to the front of the buffer.
    pub fn return_unwritten(&mut self, unwritten: &[u8]) {
        let mut rest = unwritten.to_vec();
        rest.extend_from_slice(&self.buffer);
        self.buffer = rest;
    }
}

/// Result of one `read_and_write` step: bytes read, keyed by stream id.
pub type ReadResult = HashMap<u8, Vec<u8>>;

/// Common contract every Pipe Backend variant implements (spec §4.3).
#[async_trait::async_trait]
pub trait PipeBackend: Send {
    /// Extra files the backend needs the child to know about, e.g. the
    /// Windows backend's stdout/stderr temp file paths for `N>file`
    /// redirections. Empty on POSIX.
    fn extra_files(&self) -> &[(i32, PathBuf)];

    /// Perform one step of I/O. `blocking` controls whether the backend
    /// waits up to [`crate::TIMEOUT_PRECISION`] for readiness or returns
    /// immediately; `closing` requests that fully-drained handles be closed.
    async fn read_and_write(
        &mut self,
        feed: &mut InputFeed,
        blocking: bool,
        closing: bool,
    ) -> anyhow::Result<ReadResult>;

    /// True while any handle remains open to the child.
    fn are_open(&self) -> bool;

    /// Release all handles.
    fn close(&mut self);
}

/// True if `err`'s message indicates the underlying syscall was interrupted
/// (spec §4.3 (e) / §5): the step is a no-op, not a failure, and backend
/// state must be preserved so the next call retries cleanly.
pub(crate) fn is_interrupted(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::Interrupted
}

fn _assert_object_safe(_: &dyn PipeBackend) {}

#[allow(dead_code)]
fn _assert_read_bound<T: AsyncRead>() {}
