//! The Process engine: the state machine governing one external command
//! invocation from creation to reaping.
//!
//! [`Process`] owns the lifecycle (`Ready -> Started -> Terminated`), the
//! output buffers, and the two timeout clocks; it delegates descriptor
//! plumbing to whichever [`crate::pipe::PipeBackend`] [`crate::spawn::spawn`]
//! selects for the platform.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{ProcessError, Result, TimeoutKind};
use crate::exit_code::resolve_exit_code;
use crate::input::{Input, RawInput};
use crate::pipe::{InputFeed, PipeBackend, STREAM_SIGCHILD_FALLBACK, STREAM_STDERR, STREAM_STDOUT, StdioMode};

/// Lifecycle state (spec invariant: monotonically `Ready -> Started ->
/// Terminated`; a restarted process is a distinct `Process` back at `Ready`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopenStatus {
    Ready,
    Started,
    Terminated,
}

/// Last OS-reported status snapshot.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProcessInformation {
    pub running: bool,
    pub pid: Option<u32>,
    pub signaled: bool,
    pub termsig: Option<i32>,
    pub stopped: bool,
    pub stopsig: Option<i32>,
    pub exitcode: Option<i32>,
}

/// Which of the child's streams a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Out,
    Err,
}

/// A caller-supplied sink invoked synchronously as output arrives. Never
/// re-entered: the engine calls it only from inside `read_pipes`.
pub type OutputCallback = Box<dyn FnMut(OutputStream, &[u8]) + Send>;

/// Platform spawn hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopenOptions {
    /// Suppress the engine's own warning-level logging for this process.
    pub suppress_errors: bool,
    /// Treat output as opaque bytes rather than attempting any text handling.
    pub binary_pipes: bool,
    /// Exec the command line directly with no shell layer. Forced off
    /// automatically when sigchild-compatibility wraps the command, since
    /// that wrapper relies on shell syntax.
    pub bypass_shell: bool,
    /// Request the sigchild-compatibility side channel even though
    /// [`crate::spawn::is_sigchild_enabled`] always reports `false` on this
    /// platform; useful for exercising the fallback path in tests.
    pub force_sigchild_compat: bool,
}

/// A read-only snapshot of a [`Process`], embedded in [`ProcessError`]
/// variants for diagnostics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessSnapshot {
    pub command_line: String,
    pub status: &'static str,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// One external command invocation.
pub struct Process {
    command_line: String,
    cwd: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
    inherit_env: bool,
    input: Input,
    timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    options: PopenOptions,

    status: PopenStatus,
    exit_code: Option<i32>,
    fallback_exit_code: Option<i32>,
    process_information: ProcessInformation,

    stdout_buffer: Vec<u8>,
    stderr_buffer: Vec<u8>,
    incremental_output_offset: usize,
    incremental_error_output_offset: usize,

    start_time: Option<Instant>,
    last_output_time: Option<Instant>,

    tty: bool,
    pty: bool,
    output_disabled: bool,
    latest_signal: Option<i32>,

    child: Option<tokio::process::Child>,
    pipes: Option<Box<dyn PipeBackend>>,
    input_feed: Option<InputFeed>,
    is_passthrough: bool,
    sigchild_compat: bool,

    user_callback: Option<OutputCallback>,
}

impl Process {
    pub fn new(command_line: impl Into<String>) -> Self {
        Process {
            command_line: command_line.into(),
            cwd: None,
            env: None,
            inherit_env: true,
            input: Input::None,
            timeout: None,
            idle_timeout: None,
            options: PopenOptions::default(),

            status: PopenStatus::Ready,
            exit_code: None,
            fallback_exit_code: None,
            process_information: ProcessInformation::default(),

            stdout_buffer: Vec::new(),
            stderr_buffer: Vec::new(),
            incremental_output_offset: 0,
            incremental_error_output_offset: 0,

            start_time: None,
            last_output_time: None,

            tty: false,
            pty: false,
            output_disabled: false,
            latest_signal: None,

            child: None,
            pipes: None,
            input_feed: None,
            is_passthrough: false,
            sigchild_compat: false,

            user_callback: None,
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) -> Result<()> {
        self.ensure_not_started("set_cwd")?;
        self.cwd = Some(cwd.into());
        Ok(())
    }

    pub fn set_env(&mut self, env: HashMap<String, String>) -> Result<()> {
        self.ensure_not_started("set_env")?;
        self.env = Some(env);
        Ok(())
    }

    pub fn set_inherit_env(&mut self, inherit: bool) -> Result<()> {
        self.ensure_not_started("set_inherit_env")?;
        self.inherit_env = inherit;
        Ok(())
    }

    /// Normalizes `input` through [`crate::input::validate`] (spec §4.2)
    /// before storing it: a `nil`/absent input becomes `Input::None`, a
    /// stream handle passes through unchanged, and a scalar is coerced to
    /// its string form.
    pub fn set_input(&mut self, input: RawInput) -> Result<()> {
        self.ensure_not_started("set_input")?;
        self.input = crate::input::validate("set_input", input)?;
        Ok(())
    }

    pub fn set_options(&mut self, options: PopenOptions) -> Result<()> {
        self.ensure_not_started("set_options")?;
        self.options = options;
        Ok(())
    }

    pub fn set_timeout(&mut self, secs: f64) -> Result<()> {
        if secs < 0.0 {
            return Err(ProcessError::invalid_argument(
                "set_timeout",
                "timeout must be non-negative",
            ));
        }
        self.ensure_not_started("set_timeout")?;
        self.timeout = Some(Duration::from_secs_f64(secs));
        Ok(())
    }

    pub fn set_idle_timeout(&mut self, secs: f64) -> Result<()> {
        if secs < 0.0 {
            return Err(ProcessError::invalid_argument(
                "set_idle_timeout",
                "timeout must be non-negative",
            ));
        }
        self.ensure_not_started("set_idle_timeout")?;
        if self.output_disabled {
            return Err(ProcessError::logic(
                "idleTimeout requires visible output; output is disabled",
            ));
        }
        self.idle_timeout = Some(Duration::from_secs_f64(secs));
        Ok(())
    }

    pub fn set_tty(&mut self, tty: bool) -> Result<()> {
        self.ensure_not_started("set_tty")?;
        self.tty = tty;
        Ok(())
    }

    pub fn set_pty(&mut self, pty: bool) -> Result<()> {
        self.ensure_not_started("set_pty")?;
        self.pty = pty;
        Ok(())
    }

    /// Fails `Runtime` while running; fails `Logic` if an idle timeout is
    /// set (the two are mutually exclusive: idle timeout requires visible
    /// output).
    pub fn disable_output(&mut self) -> Result<()> {
        if self.status == PopenStatus::Started {
            return Err(ProcessError::runtime(
                "cannot disable output while the process is running",
            ));
        }
        if self.idle_timeout.is_some() {
            return Err(ProcessError::logic(
                "outputDisabled and idleTimeout are mutually exclusive",
            ));
        }
        self.output_disabled = true;
        Ok(())
    }

    pub fn enable_output(&mut self) -> Result<()> {
        if self.status == PopenStatus::Started {
            return Err(ProcessError::runtime(
                "cannot enable output while the process is running",
            ));
        }
        self.output_disabled = false;
        Ok(())
    }

    pub fn status(&self) -> PopenStatus {
        self.status
    }

    pub fn is_started(&self) -> bool {
        self.status != PopenStatus::Ready
    }

    pub fn is_terminated(&self) -> bool {
        self.status == PopenStatus::Terminated
    }

    /// Refreshes the cached OS status before answering (spec: "derive from
    /// `status` plus a lazy status refresh").
    pub fn is_running(&mut self) -> bool {
        if self.status != PopenStatus::Started {
            return false;
        }
        self.poll_status()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn is_successful(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn exit_code_text(&self) -> &'static str {
        crate::exit_code::exit_code_text(self.exit_code.unwrap_or(-1))
    }

    fn ensure_not_started(&self, caller: &'static str) -> Result<()> {
        if self.status == PopenStatus::Started {
            return Err(ProcessError::logic(format!(
                "cannot call {caller} while the process is running"
            )));
        }
        Ok(())
    }

    /// Start the child. Fails `Runtime` if already running, `Logic` if
    /// output is disabled and a callback was supplied.
    #[tracing::instrument(skip(self, callback), fields(command = %self.command_line))]
    pub async fn start(&mut self, callback: Option<OutputCallback>) -> Result<()> {
        if self.status == PopenStatus::Started {
            return Err(ProcessError::runtime("process is already running"));
        }
        if self.output_disabled && callback.is_some() {
            return Err(ProcessError::logic(
                "cannot supply an output callback while output is disabled",
            ));
        }
        #[cfg(windows)]
        if self.tty || self.pty {
            return Err(ProcessError::runtime(
                "TTY/PTY mode is not supported on this platform",
            ));
        }

        self.exit_code = None;
        self.fallback_exit_code = None;
        self.process_information = ProcessInformation::default();
        self.stdout_buffer.clear();
        self.stderr_buffer.clear();
        self.incremental_output_offset = 0;
        self.incremental_error_output_offset = 0;
        self.latest_signal = None;
        self.user_callback = callback;

        let now = Instant::now();
        self.start_time = Some(now);
        self.last_output_time = Some(now);

        self.sigchild_compat =
            self.options.force_sigchild_compat && crate::spawn::is_sigchild_enabled();

        #[cfg(unix)]
        let pty_supported = crate::pipe::unix::is_pty_supported();
        #[cfg(windows)]
        let pty_supported = false;

        let mode = StdioMode::select(self.output_disabled, self.tty, self.pty, pty_supported);

        let outcome = crate::spawn::spawn(
            &self.command_line,
            self.cwd.as_deref(),
            self.env.as_ref(),
            self.inherit_env,
            mode,
            &self.options,
            self.sigchild_compat,
        )
        .await
        .map_err(|e| ProcessError::runtime(format!("Unable to launch a new process: {e}")))?;

        self.process_information.pid = outcome.child.id();
        self.process_information.running = true;
        self.is_passthrough = outcome.is_passthrough;
        self.child = Some(outcome.child);
        self.pipes = Some(outcome.backend);
        self.input_feed = Some(self.build_input_feed());
        self.status = PopenStatus::Started;

        if self.is_passthrough {
            return Ok(());
        }

        self.poll_status();
        self.check_timeout().await?;
        Ok(())
    }

    fn build_input_feed(&mut self) -> InputFeed {
        match &self.input {
            Input::None => InputFeed::new(Input::None),
            Input::Bytes(bytes) => InputFeed::new(Input::Bytes(bytes.clone())),
            Input::Stream(_) => {
                let owned = std::mem::replace(&mut self.input, Input::None);
                InputFeed::new(owned)
            }
        }
    }

    /// Fails `Logic` if not started. Drives the read/write loop until the
    /// child exits, enforcing both timeout clocks on every iteration.
    pub async fn wait(&mut self, callback: Option<OutputCallback>) -> Result<i32> {
        if self.status != PopenStatus::Started {
            return Err(ProcessError::logic(
                "cannot wait on a process that has not been started",
            ));
        }
        if callback.is_some() {
            self.user_callback = callback;
        }

        if self.is_passthrough {
            if let Some(child) = self.child.as_mut() {
                let _ = child.wait().await;
            }
        } else {
            loop {
                self.check_timeout().await?;

                let running = if cfg!(windows) {
                    self.poll_status()
                } else {
                    self.pipes.as_ref().map(|p| p.are_open()).unwrap_or(false)
                };
                let closing = if cfg!(windows) { true } else { !running };

                self.read_pipes(true, closing).await?;

                if !running {
                    break;
                }
            }

            while self.poll_status() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        let requested_signal = self.latest_signal;
        self.close().await?;

        if self.process_information.signaled {
            let termsig = self.process_information.termsig;
            // Preserve the quirk: signaling with SIGTERM and dying naturally
            // of that same signal does not raise; any other signal does.
            if termsig != requested_signal {
                return Err(ProcessError::runtime(format!(
                    "The process has been signaled with signal {}",
                    termsig.unwrap_or_default()
                )));
            }
        }

        Ok(self.exit_code.unwrap_or(-1))
    }

    pub async fn run(&mut self, callback: Option<OutputCallback>) -> Result<i32> {
        self.start(callback).await?;
        self.wait(None).await
    }

    pub async fn must_run(&mut self, callback: Option<OutputCallback>) -> Result<i32> {
        let code = self.run(callback).await?;
        if code != 0 {
            return Err(ProcessError::ProcessFailed {
                exit_code: code,
                process: Box::new(self.snapshot()),
            });
        }
        Ok(code)
    }

    /// Send SIGTERM (or `taskkill` on Windows), wait up to `grace_period`,
    /// then escalate to `escalation_signal` (default SIGKILL) if still
    /// running. Closes the pipes and reaps the child once it exits.
    pub async fn stop(
        &mut self,
        grace_period: Duration,
        escalation_signal: Option<i32>,
    ) -> Result<i32> {
        if self.status != PopenStatus::Started {
            return Ok(self.exit_code.unwrap_or(-1));
        }

        if self.poll_status() {
            #[cfg(windows)]
            if let Some(pid) = self.process_information.pid {
                let _ = tokio::process::Command::new("taskkill")
                    .args(["/F", "/T", "/PID", &pid.to_string()])
                    .status()
                    .await;
            }

            let _ = self.do_signal(15, false);

            let deadline = Instant::now() + grace_period;
            while Instant::now() < deadline && self.poll_status() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            if self.poll_status() {
                let sig = escalation_signal.unwrap_or(9);
                let _ = self.do_signal(sig, false);
            }
        }

        self.poll_status();
        if !self.process_information.running {
            self.close().await?;
        }

        Ok(self.exit_code.unwrap_or(-1))
    }

    pub fn signal(&mut self, sig: i32) -> Result<()> {
        self.do_signal(sig, true).map(|_| ())
    }

    /// Clone the configuration into a fresh `Process` at `Ready` and start
    /// it. The original is never mutated.
    pub async fn restart(&self, callback: Option<OutputCallback>) -> Result<Process> {
        let mut clone = self.fork_for_restart();
        clone.start(callback).await?;
        Ok(clone)
    }

    fn fork_for_restart(&self) -> Process {
        Process {
            command_line: self.command_line.clone(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            inherit_env: self.inherit_env,
            input: self.input.fork_for_restart(),
            timeout: self.timeout,
            idle_timeout: self.idle_timeout,
            options: self.options,

            status: PopenStatus::Ready,
            exit_code: None,
            fallback_exit_code: None,
            process_information: ProcessInformation::default(),

            stdout_buffer: Vec::new(),
            stderr_buffer: Vec::new(),
            incremental_output_offset: 0,
            incremental_error_output_offset: 0,

            start_time: None,
            last_output_time: None,

            tty: self.tty,
            pty: self.pty,
            output_disabled: self.output_disabled,
            latest_signal: None,

            child: None,
            pipes: None,
            input_feed: None,
            is_passthrough: false,
            sigchild_compat: false,

            user_callback: None,
        }
    }

    fn ensure_output_readable(&self, caller: &'static str) -> Result<()> {
        if self.output_disabled {
            return Err(ProcessError::logic(format!("{caller}: output is disabled")));
        }
        if self.status == PopenStatus::Ready {
            return Err(ProcessError::logic(format!(
                "{caller}: process has not been started"
            )));
        }
        Ok(())
    }

    pub async fn get_output(&mut self) -> Result<Vec<u8>> {
        self.ensure_output_readable("get_output")?;
        let closing = self.read_pipes_closing_hint();
        self.read_pipes(false, closing).await?;
        Ok(self.stdout_buffer.clone())
    }

    pub async fn get_error_output(&mut self) -> Result<Vec<u8>> {
        self.ensure_output_readable("get_error_output")?;
        let closing = self.read_pipes_closing_hint();
        self.read_pipes(false, closing).await?;
        Ok(self.stderr_buffer.clone())
    }

    fn read_pipes_closing_hint(&self) -> bool {
        if cfg!(windows) {
            return true;
        }
        !self.pipes.as_ref().map(|p| p.are_open()).unwrap_or(false)
    }

    pub fn get_incremental_output(&mut self) -> Vec<u8> {
        let slice = self.stdout_buffer[self.incremental_output_offset..].to_vec();
        self.incremental_output_offset = self.stdout_buffer.len();
        slice
    }

    pub fn get_incremental_error_output(&mut self) -> Vec<u8> {
        let slice = self.stderr_buffer[self.incremental_error_output_offset..].to_vec();
        self.incremental_error_output_offset = self.stderr_buffer.len();
        slice
    }

    pub fn clear_output(&mut self) {
        self.stdout_buffer.clear();
        self.incremental_output_offset = 0;
    }

    pub fn clear_error_output(&mut self) {
        self.stderr_buffer.clear();
        self.incremental_error_output_offset = 0;
    }

    /// If `timeout`/`idleTimeout` has elapsed, stops the child and raises
    /// `ProcessTimedOut`. A no-op otherwise.
    pub async fn check_timeout(&mut self) -> Result<()> {
        let now = Instant::now();

        if let (Some(timeout), Some(start)) = (self.timeout, self.start_time) {
            if now.duration_since(start) > timeout {
                self.stop(Duration::ZERO, None).await?;
                return Err(ProcessError::ProcessTimedOut {
                    kind: TimeoutKind::General,
                    process: Box::new(self.snapshot()),
                });
            }
        }

        if let (Some(idle), Some(last)) = (self.idle_timeout, self.last_output_time) {
            if now.duration_since(last) > idle {
                self.stop(Duration::ZERO, None).await?;
                return Err(ProcessError::ProcessTimedOut {
                    kind: TimeoutKind::Idle,
                    process: Box::new(self.snapshot()),
                });
            }
        }

        Ok(())
    }

    async fn read_pipes(&mut self, blocking: bool, closing: bool) -> Result<()> {
        let Some(pipes) = self.pipes.as_mut() else {
            return Ok(());
        };
        let Some(feed) = self.input_feed.as_mut() else {
            return Ok(());
        };

        let result = pipes
            .read_and_write(feed, blocking, closing)
            .await
            .map_err(|e| ProcessError::runtime(e.to_string()))?;

        for (stream_id, bytes) in result {
            match stream_id {
                STREAM_STDOUT => self.dispatch_output(OutputStream::Out, &bytes),
                STREAM_STDERR => self.dispatch_output(OutputStream::Err, &bytes),
                STREAM_SIGCHILD_FALLBACK => {
                    if let Ok(code) = std::str::from_utf8(&bytes)
                        .unwrap_or_default()
                        .trim()
                        .parse::<i32>()
                    {
                        self.fallback_exit_code = Some(code);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn dispatch_output(&mut self, stream: OutputStream, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match stream {
            OutputStream::Out => self.stdout_buffer.extend_from_slice(bytes),
            OutputStream::Err => self.stderr_buffer.extend_from_slice(bytes),
        }
        self.last_output_time = Some(Instant::now());
        if let Some(callback) = self.user_callback.as_mut() {
            callback(stream, bytes);
        }
    }

    fn do_signal(&mut self, sig: i32, throw_on_error: bool) -> Result<bool> {
        let running = self.poll_status();
        if !running {
            return if throw_on_error {
                Err(ProcessError::logic(
                    "cannot send a signal to a process that is not running",
                ))
            } else {
                Ok(false)
            };
        }
        if self.sigchild_compat {
            return if throw_on_error {
                Err(ProcessError::runtime(
                    "cannot signal a process whose pid is unknown under sigchild compatibility",
                ))
            } else {
                Ok(false)
            };
        }

        #[cfg(unix)]
        let result: std::io::Result<()> = match self.process_information.pid {
            Some(pid) => {
                // SAFETY: kill() is async-signal-safe; the negative pid
                // targets the whole process group the child was placed in
                // via setsid() at spawn time.
                let rc = unsafe { libc::kill(-(pid as i32), sig) };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(std::io::Error::last_os_error())
                }
            }
            None => Err(std::io::Error::other("process has no known pid")),
        };
        #[cfg(windows)]
        let result: std::io::Result<()> = match self.child.as_mut() {
            Some(child) => child.start_kill(),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                self.latest_signal = Some(sig);
                Ok(true)
            }
            Err(e) => {
                if throw_on_error {
                    Err(ProcessError::runtime(format!(
                        "failed to send signal {sig}: {e}"
                    )))
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Non-blocking status refresh via `try_wait`, mirroring a `proc_get_status` poll.
    fn poll_status(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.process_information.running = false;
                self.apply_exit_status(&status);
                false
            }
            Ok(None) => {
                self.process_information.running = true;
                true
            }
            Err(_) => {
                self.process_information.running = false;
                false
            }
        }
    }

    fn apply_exit_status(&mut self, status: &std::process::ExitStatus) {
        self.process_information.exitcode = status.code();
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.process_information.termsig = status.signal();
            self.process_information.signaled = status.signal().is_some();
            self.process_information.stopsig = status.stopped_signal();
            self.process_information.stopped = status.stopped_signal().is_some();
        }
    }

    /// Close the pipes, reap the child, and resolve the final exit code
    /// (spec precedence: reaped code, then last known, then the sigchild
    /// fallback channel, then `128 + termsig`, else `-1`).
    async fn close(&mut self) -> Result<()> {
        if let Some(pipes) = self.pipes.as_mut() {
            pipes.close();
        }
        self.pipes = None;

        let reaped = if let Some(mut child) = self.child.take() {
            match child.wait().await {
                Ok(status) => {
                    self.apply_exit_status(&status);
                    self.process_information.running = false;
                    status.code()
                }
                Err(e) => {
                    debug!(error = %e, "failed to reap child");
                    None
                }
            }
        } else {
            None
        };

        let resolved = resolve_exit_code(
            reaped,
            self.exit_code,
            self.fallback_exit_code,
            self.process_information.termsig,
        );
        self.exit_code = Some(resolved);
        self.status = PopenStatus::Terminated;
        Ok(())
    }

    fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            command_line: self.command_line.clone(),
            status: match self.status {
                PopenStatus::Ready => crate::STATUS_READY,
                PopenStatus::Started => crate::STATUS_STARTED,
                PopenStatus::Terminated => crate::STATUS_TERMINATED,
            },
            exit_code: self.exit_code,
            stdout: String::from_utf8_lossy(&self.stdout_buffer).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr_buffer).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_timeout_rejects_negative() {
        let mut process = Process::new("echo hi");
        let err = process.set_timeout(-1.0).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArgument { .. }));
    }

    #[test]
    fn disable_output_conflicts_with_idle_timeout() {
        let mut process = Process::new("echo hi");
        process.set_idle_timeout(1.0).unwrap();
        let err = process.disable_output().unwrap_err();
        assert!(matches!(err, ProcessError::Logic(_)));
    }

    #[test]
    fn idle_timeout_conflicts_with_disabled_output() {
        let mut process = Process::new("echo hi");
        process.disable_output().unwrap();
        let err = process.set_idle_timeout(1.0).unwrap_err();
        assert!(matches!(err, ProcessError::Logic(_)));
    }

    #[test]
    fn setters_reject_mutation_once_started() {
        let mut process = Process::new("echo hi");
        process.status = PopenStatus::Started;
        assert!(process.set_cwd("/tmp").is_err());
        assert!(process.set_timeout(1.0).is_err());
    }

    #[test]
    fn fork_for_restart_resets_runtime_state_but_keeps_config() {
        let mut original = Process::new("echo hi");
        original.set_timeout(5.0).unwrap();
        original.status = PopenStatus::Terminated;
        original.exit_code = Some(0);
        original.stdout_buffer = b"hello".to_vec();

        let clone = original.fork_for_restart();

        assert_eq!(clone.status, PopenStatus::Ready);
        assert_eq!(clone.exit_code, None);
        assert!(clone.stdout_buffer.is_empty());
        assert_eq!(clone.command_line, original.command_line);
        assert_eq!(clone.timeout, original.timeout);

        // the original is untouched
        assert_eq!(original.status, PopenStatus::Terminated);
        assert_eq!(original.exit_code, Some(0));
    }

    #[test]
    fn snapshot_reports_configured_command_line() {
        let process = Process::new("echo hi");
        let snapshot = process.snapshot();
        assert_eq!(snapshot.command_line, "echo hi");
        assert_eq!(snapshot.status, crate::STATUS_READY);
    }
}
