//! POSIX Pipe Backend: pipe/tty/pty/null descriptor allocation plus
//! non-blocking, interleaved read/write using tokio's reactor as the
//! readiness primitive (the async translation of select/poll, spec §4.4).

use std::collections::HashMap;
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use tokio::io::unix::AsyncFd;
use tracing::debug;

use super::{
    InputFeed, PipeBackend, ReadResult, StdioMode, STREAM_SIGCHILD_FALLBACK, STREAM_STDERR,
    STREAM_STDOUT, WRITE_BURST, is_interrupted,
};
use crate::TIMEOUT_PRECISION;

/// True if the platform can allocate a pty, probed once and cached for the
/// process lifetime (spec §4.4, §9 note 4).
pub fn is_pty_supported() -> bool {
    static SUPPORTED: OnceLock<bool> = OnceLock::new();
    *SUPPORTED.get_or_init(probe_pty_support)
}

fn probe_pty_support() -> bool {
    let Ok((master, slave)) = allocate_pty() else {
        return false;
    };
    let slave_file = File::from(slave);
    let spawned = std::process::Command::new("echo")
        .arg("1")
        .stdin(dup_stdio(&slave_file))
        .stdout(dup_stdio(&slave_file))
        .stderr(dup_stdio(&slave_file))
        .spawn();
    drop(master);
    match spawned {
        Ok(mut child) => child.wait().is_ok(),
        Err(_) => false,
    }
}

fn dup_stdio(file: &File) -> std::process::Stdio {
    file.try_clone()
        .map(std::process::Stdio::from)
        .unwrap_or_else(|_| std::process::Stdio::null())
}

fn allocate_pty() -> anyhow::Result<(OwnedFd, OwnedFd)> {
    let result = nix::pty::openpty(None, None).context("openpty failed")?;
    Ok((result.master, result.slave))
}

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    use nix::fcntl::{FcntlArg, OFlag, fcntl};
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(nix_to_io_err)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(nix_to_io_err)?;
    Ok(())
}

fn nix_to_io_err(e: nix::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

/// Shared non-blocking fd (used for the pty master, read and write sides).
#[derive(Clone)]
struct SharedFd(Arc<AsyncFd<File>>);

impl SharedFd {
    fn new(fd: OwnedFd) -> std::io::Result<Self> {
        set_nonblocking(fd.as_raw_fd())?;
        let file = File::from(fd);
        Ok(SharedFd(Arc::new(AsyncFd::new(file)?)))
    }
}

/// Any handle the engine can wait-then-drain for readability.
#[async_trait::async_trait]
trait NonBlockingReader: Send + Sync {
    async fn readable(&self) -> std::io::Result<()>;
    fn try_read(&self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Any handle the engine can wait-then-write to.
#[async_trait::async_trait]
trait NonBlockingWriter: Send + Sync {
    async fn writable(&self) -> std::io::Result<()>;
    fn try_write(&self, buf: &[u8]) -> std::io::Result<usize>;
}

#[async_trait::async_trait]
impl NonBlockingReader for tokio::process::ChildStdout {
    async fn readable(&self) -> std::io::Result<()> {
        tokio::process::ChildStdout::readable(self).await
    }
    fn try_read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        tokio::process::ChildStdout::try_read(self, buf)
    }
}

#[async_trait::async_trait]
impl NonBlockingReader for tokio::process::ChildStderr {
    async fn readable(&self) -> std::io::Result<()> {
        tokio::process::ChildStderr::readable(self).await
    }
    fn try_read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        tokio::process::ChildStderr::try_read(self, buf)
    }
}

#[async_trait::async_trait]
impl NonBlockingWriter for tokio::process::ChildStdin {
    async fn writable(&self) -> std::io::Result<()> {
        tokio::process::ChildStdin::writable(self).await
    }
    fn try_write(&self, buf: &[u8]) -> std::io::Result<usize> {
        tokio::process::ChildStdin::try_write(self, buf)
    }
}

#[async_trait::async_trait]
impl NonBlockingReader for SharedFd {
    async fn readable(&self) -> std::io::Result<()> {
        let guard = self.0.readable().await?;
        guard.retain_ready();
        Ok(())
    }
    fn try_read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::io::Read;
        (&*self.0.get_ref()).read(buf)
    }
}

#[async_trait::async_trait]
impl NonBlockingWriter for SharedFd {
    async fn writable(&self) -> std::io::Result<()> {
        let guard = self.0.writable().await?;
        guard.retain_ready();
        Ok(())
    }
    fn try_write(&self, buf: &[u8]) -> std::io::Result<usize> {
        use std::io::Write;
        (&*self.0.get_ref()).write(buf)
    }
}

enum DrainOutcome {
    Eof(Vec<u8>),
    More(Vec<u8>),
}

/// Drain everything currently available from `reader` — looping until a
/// read returns empty (EOF) or would block — so no bytes are left pending
/// in the kernel buffer after a step (spec §4.4).
async fn drain_reader(reader: &dyn NonBlockingReader) -> anyhow::Result<DrainOutcome> {
    let mut collected = Vec::new();
    let mut buf = [0u8; super::READ_CHUNK];
    loop {
        match reader.try_read(&mut buf) {
            Ok(0) => return Ok(DrainOutcome::Eof(collected)),
            Ok(n) => collected.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Ok(DrainOutcome::More(collected));
            }
            Err(e) if is_interrupted(&e) => return Ok(DrainOutcome::More(collected)),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write as much of `feed`'s buffer as fits, looping until the buffer is
/// empty or a write would block (spec §4.4).
async fn drain_writes(writer: &dyn NonBlockingWriter, feed: &mut InputFeed) -> anyhow::Result<()> {
    loop {
        if feed.buffer.is_empty() {
            return Ok(());
        }
        let burst = feed.take_burst();
        match writer.try_write(&burst) {
            Ok(n) if n == burst.len() => continue,
            Ok(n) => {
                feed.return_unwritten(&burst[n..]);
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                feed.return_unwritten(&burst);
                return Ok(());
            }
            Err(e) if is_interrupted(&e) => {
                feed.return_unwritten(&burst);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// The three child-side descriptors to hand to `tokio::process::Command`,
/// plus whatever the parent keeps for its own side (pty master, if any).
pub struct ChildStdio {
    pub stdin: std::process::Stdio,
    pub stdout: std::process::Stdio,
    pub stderr: std::process::Stdio,
    pty_master: Option<OwnedFd>,
}

/// Build the child-side descriptor spec for `mode` (spec §4.4 priority list).
pub fn build_child_stdio(mode: StdioMode) -> anyhow::Result<ChildStdio> {
    match mode {
        StdioMode::OutputDisabled => Ok(ChildStdio {
            stdin: std::process::Stdio::piped(),
            stdout: std::process::Stdio::null(),
            stderr: std::process::Stdio::null(),
            pty_master: None,
        }),
        StdioMode::Tty => {
            let tty_in = File::options()
                .read(true)
                .write(true)
                .open("/dev/tty")
                .context("unable to open /dev/tty for reading")?;
            let tty_out = tty_in.try_clone().context("unable to dup /dev/tty")?;
            let tty_err = tty_in.try_clone().context("unable to dup /dev/tty")?;
            Ok(ChildStdio {
                stdin: tty_in.into(),
                stdout: tty_out.into(),
                stderr: tty_err.into(),
                pty_master: None,
            })
        }
        StdioMode::Pty => {
            let (master, slave) = allocate_pty()?;
            let slave_file = File::from(slave);
            let stdin = dup_stdio(&slave_file);
            let stdout = dup_stdio(&slave_file);
            let stderr = dup_stdio(&slave_file);
            Ok(ChildStdio {
                stdin,
                stdout,
                stderr,
                pty_master: Some(master),
            })
        }
        StdioMode::Piped => Ok(ChildStdio {
            stdin: std::process::Stdio::piped(),
            stdout: std::process::Stdio::piped(),
            stderr: std::process::Stdio::piped(),
            pty_master: None,
        }),
    }
}

/// The POSIX Pipe Backend: owns the parent-side ends of whatever
/// descriptors [`build_child_stdio`] handed to the child.
pub struct UnixPipeBackend {
    mode: StdioMode,
    stdin: Option<Box<dyn NonBlockingWriter>>,
    stdout: Option<Box<dyn NonBlockingReader>>,
    stderr: Option<Box<dyn NonBlockingReader>>,
    sigchild: Option<Box<dyn NonBlockingReader>>,
}

impl UnixPipeBackend {
    /// Build the parent side from a spawned child and the descriptor spec
    /// used to launch it. `sigchild_fd` is the read end of the side-channel
    /// pipe when sigchild-compatibility is enabled (spec §4.6.1).
    pub fn from_child(
        mode: StdioMode,
        child: &mut tokio::process::Child,
        pty_master: Option<OwnedFd>,
        sigchild_fd: Option<OwnedFd>,
    ) -> anyhow::Result<Self> {
        let sigchild = sigchild_fd
            .map(SharedFd::new)
            .transpose()?
            .map(|fd| Box::new(fd) as Box<dyn NonBlockingReader>);

        match mode {
            StdioMode::Piped => Ok(UnixPipeBackend {
                mode,
                stdin: child
                    .stdin
                    .take()
                    .map(|s| Box::new(s) as Box<dyn NonBlockingWriter>),
                stdout: child
                    .stdout
                    .take()
                    .map(|s| Box::new(s) as Box<dyn NonBlockingReader>),
                stderr: child
                    .stderr
                    .take()
                    .map(|s| Box::new(s) as Box<dyn NonBlockingReader>),
                sigchild,
            }),
            StdioMode::OutputDisabled => Ok(UnixPipeBackend {
                mode,
                stdin: child
                    .stdin
                    .take()
                    .map(|s| Box::new(s) as Box<dyn NonBlockingWriter>),
                stdout: None,
                stderr: None,
                sigchild,
            }),
            StdioMode::Tty => Ok(UnixPipeBackend {
                mode,
                stdin: None,
                stdout: None,
                stderr: None,
                sigchild: None,
            }),
            StdioMode::Pty => {
                let master =
                    pty_master.context("pty mode selected but no master fd was allocated")?;
                let shared = SharedFd::new(master)?;
                Ok(UnixPipeBackend {
                    mode,
                    stdin: Some(Box::new(shared.clone())),
                    stdout: Some(Box::new(shared)),
                    stderr: None,
                    sigchild,
                })
            }
        }
    }

    /// True when this backend never performs engine-driven I/O at all (tty
    /// mode: the terminal talks to the child directly, per spec §4.6.1).
    pub fn is_passthrough(&self) -> bool {
        self.mode == StdioMode::Tty
    }
}

#[async_trait::async_trait]
impl PipeBackend for UnixPipeBackend {
    fn extra_files(&self) -> &[(i32, PathBuf)] {
        &[]
    }

    async fn read_and_write(
        &mut self,
        feed: &mut InputFeed,
        blocking: bool,
        closing: bool,
    ) -> anyhow::Result<ReadResult> {
        let mut result: ReadResult = HashMap::new();
        let timeout = if blocking {
            TIMEOUT_PRECISION
        } else {
            Duration::from_millis(0)
        };

        if matches!(feed.input, crate::input::Input::Stream(_)) && !feed.is_exhausted() {
            feed.refill().await;
        }

        let woke = tokio::select! {
            biased;
            res = wait_readable(self.stdout.as_deref()), if self.stdout.is_some() => res.map(|_| STREAM_STDOUT),
            res = wait_readable(self.stderr.as_deref()), if self.stderr.is_some() => res.map(|_| STREAM_STDERR),
            res = wait_readable(self.sigchild.as_deref()), if self.sigchild.is_some() => res.map(|_| STREAM_SIGCHILD_FALLBACK),
            _ = tokio::time::sleep(timeout) => Ok(0),
        };

        match woke {
            Ok(0) => {}
            Ok(_) => {
                self.drain_stream(STREAM_STDOUT, closing, &mut result).await?;
                self.drain_stream(STREAM_STDERR, closing, &mut result).await?;
                self.drain_stream(STREAM_SIGCHILD_FALLBACK, closing, &mut result)
                    .await?;
            }
            Err(e) if is_interrupted(&e) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(stdin) = self.stdin.as_deref() {
            drain_writes(stdin, feed).await?;
        }
        if feed.is_exhausted() && self.stdin.is_some() {
            debug!("closing stdin: input drained");
            self.stdin = None;
        }

        Ok(result)
    }

    fn are_open(&self) -> bool {
        self.stdin.is_some() || self.stdout.is_some() || self.stderr.is_some()
    }

    fn close(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        self.sigchild = None;
    }
}

impl UnixPipeBackend {
    async fn drain_stream(
        &mut self,
        stream_id: u8,
        closing: bool,
        result: &mut ReadResult,
    ) -> anyhow::Result<()> {
        let slot = match stream_id {
            STREAM_STDOUT => &mut self.stdout,
            STREAM_STDERR => &mut self.stderr,
            STREAM_SIGCHILD_FALLBACK => &mut self.sigchild,
            _ => return Ok(()),
        };
        let Some(reader) = slot.as_deref() else {
            return Ok(());
        };
        match drain_reader(reader).await? {
            DrainOutcome::More(bytes) => {
                if !bytes.is_empty() {
                    result.insert(stream_id, bytes);
                }
            }
            DrainOutcome::Eof(bytes) => {
                if !bytes.is_empty() {
                    result.insert(stream_id, bytes);
                }
                if closing {
                    *slot = None;
                }
            }
        }
        Ok(())
    }
}

async fn wait_readable(reader: Option<&dyn NonBlockingReader>) -> std::io::Result<()> {
    match reader {
        Some(r) => r.readable().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "unix_tests.rs"]
mod tests;
