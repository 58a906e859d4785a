//! Locate a binary by name on PATH with platform-appropriate suffixes.
//!
//! Delegates the actual suffix/executable-bit handling to the `which` crate
//! (the same crate `cli-sub-agent`/`csa-config`/`csa-executor` reach for
//! whenever they need to resolve a tool name against PATH) rather than
//! hand-rolling PATHEXT and permission checks.

use std::ffi::OsString;
use std::path::PathBuf;

/// Search directories to consult, in priority order.
///
/// When `restricted_dirs` is `Some` (an `open_basedir`-style restriction),
/// only those directories are searched; otherwise the PATH-equivalent
/// environment variable is combined with `extra_dirs`.
fn search_path(extra_dirs: &[PathBuf], restricted_dirs: Option<&[PathBuf]>) -> OsString {
    let dirs: Vec<PathBuf> = if let Some(restricted) = restricted_dirs {
        restricted.to_vec()
    } else {
        let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        dirs.extend_from_slice(extra_dirs);
        dirs
    };
    std::env::join_paths(dirs).unwrap_or_default()
}

/// Find `name` on the search path, returning the first `<dir>/<name><suffix>`
/// that is a regular (and on POSIX, executable) file. Falls back to
/// `default` (coerced to a `PathBuf`) if nothing matches.
pub fn find_executable(name: &str, default: &str, extra_dirs: &[PathBuf]) -> PathBuf {
    find_executable_with_restriction(name, default, extra_dirs, None)
}

/// As [`find_executable`], but restricted to `restricted_dirs` when given
/// (mirrors an `open_basedir`-style sandbox restriction).
pub fn find_executable_with_restriction(
    name: &str,
    default: &str,
    extra_dirs: &[PathBuf],
    restricted_dirs: Option<&[PathBuf]>,
) -> PathBuf {
    let path = search_path(extra_dirs, restricted_dirs);
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(name, Some(path), &cwd).unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[cfg(unix)]
    #[test]
    fn finds_executable_in_extra_dir() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("mytool");
        {
            let mut f = fs::File::create(&bin).unwrap();
            f.write_all(b"#!/bin/sh\necho hi\n").unwrap();
        }
        let mut perms = fs::metadata(&bin).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        fs::set_permissions(&bin, perms).unwrap();

        let found = find_executable("mytool", "/usr/bin/false", &[dir.path().to_path_buf()]);
        assert_eq!(found, bin);
    }

    #[cfg(unix)]
    #[test]
    fn skips_non_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("mytool");
        fs::File::create(&bin).unwrap();

        let found = find_executable("mytool", "/usr/bin/false", &[dir.path().to_path_buf()]);
        assert_eq!(found, PathBuf::from("/usr/bin/false"));
    }

    #[test]
    fn falls_back_to_default_when_not_found() {
        let found = find_executable(
            "definitely-not-a-real-binary-xyz",
            "/bin/true",
            &[PathBuf::from("/nonexistent")],
        );
        assert_eq!(found, PathBuf::from("/bin/true"));
    }

    #[test]
    fn restricted_dirs_override_path() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_executable_with_restriction(
            "mytool",
            "/bin/true",
            &[],
            Some(&[dir.path().to_path_buf()]),
        );
        // PATH is ignored entirely; restriction yields only this empty dir,
        // so the search fails and the default is returned.
        assert_eq!(found, PathBuf::from("/bin/true"));
    }
}
