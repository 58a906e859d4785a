//! Turns a `Process`'s configuration into a running OS process: assembles
//! the final command line (shell wrap, sigchild-compatibility wrap, Windows
//! temp-file redirection wrap), applies environment/cwd, and builds the
//! matching [`pipe::PipeBackend`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::pipe::{self, PipeBackend, StdioMode};
use crate::process::PopenOptions;

/// Whether the platform's libc reports child termination through `SIGCHLD`
/// in a way this engine needs to special-case. Always `false`: every target
/// this engine runs on reports exit status reliably through `wait()`, so the
/// side-channel pipe is only ever exercised when a caller explicitly opts
/// into it via [`PopenOptions::force_sigchild_compat`] (e.g. in tests).
pub fn is_sigchild_enabled() -> bool {
    false
}

/// Everything the engine needs after a successful spawn.
pub struct SpawnOutcome {
    pub child: tokio::process::Child,
    pub backend: Box<dyn PipeBackend>,
    /// True when the backend performs no engine-driven I/O at all (tty mode).
    pub is_passthrough: bool,
}

/// Spawn `command_line` under `mode`, returning the child and its backend.
pub async fn spawn(
    command_line: &str,
    cwd: Option<&Path>,
    env: Option<&HashMap<String, String>>,
    inherit_env: bool,
    mode: StdioMode,
    options: &PopenOptions,
    sigchild_compat: bool,
) -> anyhow::Result<SpawnOutcome> {
    #[cfg(unix)]
    {
        spawn_unix(
            command_line,
            cwd,
            env,
            inherit_env,
            mode,
            options,
            sigchild_compat,
        )
        .await
    }
    #[cfg(windows)]
    {
        spawn_windows(command_line, cwd, env, inherit_env, options).await
    }
}

/// Build the `tokio::process::Command` that will run `command_line`,
/// through a shell unless `bypass_shell` asks for a direct exec.
fn build_shell_command(command_line: &str, bypass_shell: bool) -> tokio::process::Command {
    if bypass_shell {
        return tokio::process::Command::new(command_line);
    }
    #[cfg(unix)]
    {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }
}

fn apply_env_and_cwd(
    cmd: &mut tokio::process::Command,
    cwd: Option<&Path>,
    env: Option<&HashMap<String, String>>,
    inherit_env: bool,
) {
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    if !inherit_env {
        cmd.env_clear();
    }
    if let Some(env) = env {
        cmd.envs(env);
    }
    // `kill_on_drop(false)`: the engine owns the child's lifecycle explicitly
    // through `stop`/`signal`/`close`, not through the `Child` handle's drop.
    cmd.kill_on_drop(false);
}

#[cfg(unix)]
async fn spawn_unix(
    command_line: &str,
    cwd: Option<&Path>,
    env: Option<&HashMap<String, String>>,
    inherit_env: bool,
    mode: StdioMode,
    options: &PopenOptions,
    sigchild_compat: bool,
) -> anyhow::Result<SpawnOutcome> {
    use std::os::fd::AsRawFd;

    let stdio = pipe::unix::build_child_stdio(mode)?;

    let (final_command, sigchild_pipe) = if sigchild_compat {
        let (read_fd, write_fd) =
            nix::unistd::pipe().context("failed to create sigchild-compat pipe")?;
        let wrapped = format!("({command_line}) 3>/dev/null; code=$?; echo $code >&3; exit $code");
        (wrapped, Some((read_fd, write_fd)))
    } else {
        (command_line.to_string(), None)
    };

    // The sigchild-compat wrapper relies on shell syntax (`;`, `$?`,
    // redirection), so it always goes through a shell regardless of the
    // caller's `bypass_shell` preference.
    let bypass_shell = options.bypass_shell && sigchild_pipe.is_none();
    let mut cmd = build_shell_command(&final_command, bypass_shell);

    let pty_master = stdio.pty_master;
    cmd.stdin(stdio.stdin).stdout(stdio.stdout).stderr(stdio.stderr);
    apply_env_and_cwd(&mut cmd, cwd, env, inherit_env);

    // SAFETY: setsid() is async-signal-safe and runs before exec, isolating
    // the child (and anything it forks) into its own process group so a
    // later `stop`/`signal` call can target the whole group.
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    if let Some((_, write_fd)) = &sigchild_pipe {
        let write_raw = write_fd.as_raw_fd();
        // SAFETY: dup2 is async-signal-safe; this gives the child fd 3
        // bound to the write end of the pipe we keep the read end of.
        unsafe {
            cmd.pre_exec(move || {
                if libc::dup2(write_raw, 3) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let mut child = cmd.spawn().context("Unable to launch a new process")?;

    let sigchild_read_fd = sigchild_pipe.map(|(read_fd, _write_fd)| read_fd);
    // the pipe's write end (the local variable above) drops here, leaving
    // only the child's dup'd copy of it open.

    let backend = pipe::unix::UnixPipeBackend::from_child(mode, &mut child, pty_master, sigchild_read_fd)?;
    let is_passthrough = backend.is_passthrough();

    Ok(SpawnOutcome {
        child,
        backend: Box::new(backend),
        is_passthrough,
    })
}

#[cfg(windows)]
async fn spawn_windows(
    command_line: &str,
    cwd: Option<&Path>,
    env: Option<&HashMap<String, String>>,
    inherit_env: bool,
    options: &PopenOptions,
) -> anyhow::Result<SpawnOutcome> {
    let mut backend = pipe::windows::WindowsPipeBackend::new()?;
    let redirected = backend.redirected_command_line(command_line);
    let _ = options.bypass_shell; // the cmd wrap below always supplies the shell layer

    // Build the `cmd /V:ON /E:ON /C <redirected>` invocation directly, with
    // the redirected command as a single final argument, rather than
    // rendering it to a string and handing that to a second `cmd /C` layer
    // (which would double-parse the embedded quoting).
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/V:ON").arg("/E:ON").arg("/C").arg(&redirected);
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());
    apply_env_and_cwd(&mut cmd, cwd, env, inherit_env);

    let mut child = cmd.spawn().context("Unable to launch a new process")?;
    if let Some(stdin) = child.stdin.take() {
        backend.attach_stdin(stdin);
    }

    Ok(SpawnOutcome {
        child,
        backend: Box::new(backend),
        is_passthrough: false,
    })
}
