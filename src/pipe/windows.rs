//! Windows Pipe Backend: stdout/stderr are redirected to temp files at the
//! shell level (to dodge the kernel pipe-hang bug) and streamed back
//! incrementally; stdin remains a real pipe (spec §4.5).

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use super::{InputFeed, PipeBackend, ReadResult, STREAM_STDERR, STREAM_STDOUT, is_interrupted};
use crate::TIMEOUT_PRECISION;

struct OutputFile {
    file: Option<tempfile::NamedTempFile>,
    cursor: u64,
    done: bool,
}

impl OutputFile {
    fn new(prefix: &str) -> anyhow::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile()
            .map_err(anyhow::Error::from)?;
        Ok(OutputFile {
            file: Some(file),
            cursor: 0,
            done: false,
        })
    }

    fn path(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|f| f.path().to_path_buf())
    }

    /// Read whatever has been appended since `cursor`, advancing it.
    fn read_new_bytes(&mut self) -> std::io::Result<Vec<u8>> {
        let Some(file) = &mut self.file else {
            return Ok(Vec::new());
        };
        let mut handle = file.reopen()?;
        handle.seek(SeekFrom::Start(self.cursor))?;
        let mut buf = Vec::new();
        handle.read_to_end(&mut buf)?;
        self.cursor += buf.len() as u64;
        Ok(buf)
    }
}

/// The Windows Pipe Backend. Stdin is a genuine pipe to the child; stdout
/// and stderr are read back from temp files the wrapped shell command
/// writes into via `1>file 2>file` redirection.
pub struct WindowsPipeBackend {
    stdin: Option<tokio::process::ChildStdin>,
    stdout: OutputFile,
    stderr: OutputFile,
    extra_files: Vec<(i32, PathBuf)>,
}

impl WindowsPipeBackend {
    pub fn new() -> anyhow::Result<Self> {
        let stdout = OutputFile::new("procengine-stdout-")?;
        let stderr = OutputFile::new("procengine-stderr-")?;
        let mut extra_files = Vec::new();
        if let Some(path) = stdout.path() {
            extra_files.push((1, path));
        }
        if let Some(path) = stderr.path() {
            extra_files.push((2, path));
        }
        Ok(WindowsPipeBackend {
            stdin: None,
            stdout,
            stderr,
            extra_files,
        })
    }

    pub fn attach_stdin(&mut self, stdin: tokio::process::ChildStdin) {
        self.stdin = Some(stdin);
    }

    /// Build `(inner) 1>stdout_path 2>stderr_path` — the command that must be
    /// passed as the single final argument to `cmd /V:ON /E:ON /C` (spec
    /// §4.5 / §6). This is *not* itself wrapped in an outer `cmd /C "..."`:
    /// the caller hands it to `Command` as one argument, so the process
    /// spawn layer (not a second round of shell parsing) owns the quoting.
    pub fn redirected_command_line(&self, inner: &str) -> String {
        let stdout_path = self
            .stdout
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let stderr_path = self
            .stderr
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!(
            "({inner}) 1>{} 2>{}",
            crate::escape::windows_quote(&stdout_path),
            crate::escape::windows_quote(&stderr_path)
        )
    }
}

#[async_trait::async_trait]
impl PipeBackend for WindowsPipeBackend {
    fn extra_files(&self) -> &[(i32, PathBuf)] {
        &self.extra_files
    }

    async fn read_and_write(
        &mut self,
        feed: &mut InputFeed,
        blocking: bool,
        closing: bool,
    ) -> anyhow::Result<ReadResult> {
        let mut result: ReadResult = HashMap::new();

        // Step 1: drain the caller's input into stdin, same shape as the
        // POSIX write half (spec §4.5 (1)).
        if let Some(stdin) = self.stdin.as_ref() {
            loop {
                if feed.buffer.is_empty() {
                    break;
                }
                let burst = feed.take_burst();
                match stdin.try_write(&burst) {
                    Ok(n) if n == burst.len() => continue,
                    Ok(n) => {
                        feed.return_unwritten(&burst[n..]);
                        break;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        feed.return_unwritten(&burst);
                        break;
                    }
                    Err(e) if is_interrupted(&e) => {
                        feed.return_unwritten(&burst);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        if matches!(feed.input, crate::input::Input::Stream(_)) && !feed.is_exhausted() {
            feed.refill().await;
        }
        if feed.is_exhausted() && self.stdin.is_some() {
            self.stdin = None;
        }

        // Steps 2-3: pull new bytes from each temp file, closing once the
        // process has exited and a round finds nothing new (spec §4.5 (2)-(3)).
        let mut new_data = false;
        for (stream_id, output) in [(STREAM_STDOUT, &mut self.stdout), (STREAM_STDERR, &mut self.stderr)]
        {
            if output.done {
                continue;
            }
            match output.read_new_bytes() {
                Ok(bytes) if !bytes.is_empty() => {
                    new_data = true;
                    result.insert(stream_id, bytes);
                }
                Ok(_) => {
                    if closing {
                        output.done = true;
                    }
                }
                Err(e) => {
                    warn!(stream = stream_id, error = %e, "failed reading output temp file");
                    output.done = true;
                }
            }
        }

        if blocking && !new_data && self.stdin.is_some() {
            tokio::time::sleep(TIMEOUT_PRECISION).await;
        }

        Ok(result)
    }

    fn are_open(&self) -> bool {
        self.stdin.is_some() || !self.stdout.done || !self.stderr.done
    }

    fn close(&mut self) {
        self.stdin = None;
        self.stdout.done = true;
        self.stderr.done = true;
        self.stdout.file = None;
        self.stderr.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirected_command_line_shape() {
        let backend = WindowsPipeBackend::new().expect("backend");
        let redirected = backend.redirected_command_line("echo hi");
        assert!(redirected.starts_with("(echo hi) 1>"));
        assert!(redirected.contains(" 2>"));
    }

    #[test]
    fn extra_files_maps_fd_one_and_two() {
        let backend = WindowsPipeBackend::new().expect("backend");
        let fds: Vec<i32> = backend.extra_files().iter().map(|(fd, _)| *fd).collect();
        assert_eq!(fds, vec![1, 2]);
    }

    #[test]
    fn output_file_reads_incrementally() {
        use std::io::Write;
        let mut output = OutputFile::new("test-").expect("output file");
        {
            let file = output.file.as_mut().expect("file");
            file.write_all(b"hello ").expect("write");
            file.flush().expect("flush");
        }
        let first = output.read_new_bytes().expect("read");
        assert_eq!(first, b"hello ");

        {
            let file = output.file.as_mut().expect("file");
            file.write_all(b"world").expect("write");
            file.flush().expect("flush");
        }
        let second = output.read_new_bytes().expect("read");
        assert_eq!(second, b"world");
    }
}
