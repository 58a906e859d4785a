//! Escape a single argument for safe insertion into a platform command line.
//!
//! POSIX uses the standard single-quote shell escape. Windows can't reuse
//! that — `cmd.exe` has no single-quote quoting — so it gets a purpose-built
//! quoter that also suppresses `%VAR%` expansion.

/// Escape `arg` for the current platform's shell.
pub fn escape(arg: &str) -> String {
    #[cfg(windows)]
    {
        windows_quote(arg)
    }
    #[cfg(not(windows))]
    {
        posix_quote(arg)
    }
}

/// Single-quote shell escape: wrap in `'...'`, escaping embedded `'` as `'\''`.
pub fn posix_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Windows `cmd.exe` argument quoting.
///
/// The native `CommandLineToArgvW`-oriented escape strips `%` and mishandles
/// a few characters, so this reimplements the escaping the engine actually
/// needs: split the input on `"` delimiters, escape each part, and wrap the
/// whole thing in quotes if any part required it.
pub fn windows_quote(arg: &str) -> String {
    if arg.is_empty() {
        return posix_quote(arg);
    }

    let mut result = String::new();
    let mut needs_quotes = false;

    for part in split_preserving_quotes(arg) {
        if part == "\"" {
            result.push_str("\\\"");
            needs_quotes = true;
            continue;
        }

        if is_percent_surrounded(&part) {
            result.push_str("^%\"");
            result.push_str(&part);
            result.push_str("\"^%");
            needs_quotes = true;
            continue;
        }

        let doubled = double_trailing_backslashes(&part);
        result.push_str(&doubled);
        needs_quotes = true;
    }

    if needs_quotes {
        format!("\"{result}\"")
    } else {
        result
    }
}

/// Split `s` on `"` characters, keeping each `"` as its own one-character part.
fn split_preserving_quotes(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for ch in s.chars() {
        if ch == '"' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.push("\"".to_string());
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// True when `part` is fully surrounded by `%` (length >= 2, first and last
/// char are `%`). The reference implementation this engine is based on
/// checks `length < 2` here, which is almost certainly an inverted
/// comparison (a one-character "%"-only part is surrounded by nothing); this
/// engine uses the corrected `>= 2` guard.
fn is_percent_surrounded(part: &str) -> bool {
    let chars: Vec<char> = part.chars().collect();
    chars.len() >= 2 && chars[0] == '%' && chars[chars.len() - 1] == '%'
}

/// Double any run of trailing backslashes (so they survive the closing quote).
fn double_trailing_backslashes(part: &str) -> String {
    let trailing = part.chars().rev().take_while(|&c| c == '\\').count();
    if trailing == 0 {
        return part.to_string();
    }
    let prefix_len = part.chars().count() - trailing;
    let prefix: String = part.chars().take(prefix_len).collect();
    format!("{prefix}{}", "\\".repeat(trailing * 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_empty() {
        assert_eq!(posix_quote(""), "''");
    }

    #[test]
    fn posix_simple() {
        assert_eq!(posix_quote("hello"), "'hello'");
    }

    #[test]
    fn posix_embedded_quote() {
        assert_eq!(posix_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn windows_empty_uses_posix_escape() {
        assert_eq!(windows_quote(""), "''");
    }

    #[test]
    fn windows_simple_gets_quoted() {
        assert_eq!(windows_quote("hello world"), "\"hello world\"");
    }

    #[test]
    fn windows_percent_surrounded_suppresses_expansion() {
        let quoted = windows_quote("%PATH%");
        assert_eq!(quoted, "\"^%\"%PATH%\"^%\"");
    }

    #[test]
    fn windows_single_percent_is_not_surrounded() {
        assert!(!is_percent_surrounded("%"));
        assert!(is_percent_surrounded("%%"));
    }

    #[test]
    fn windows_trailing_backslash_doubled() {
        assert_eq!(windows_quote("C:\\foo\\"), "\"C:\\foo\\\\\"");
    }

    #[test]
    fn windows_embedded_quote_escaped() {
        let quoted = windows_quote("say \"hi\"");
        assert!(quoted.contains("\\\""));
    }
}
