//! Exit code resolution and the human-readable exit code table.

/// Inputs available when an OS reap completes, in the precedence order the
/// final `exitCode` is resolved from (spec §4.6.5 / §9):
///
/// 1. a non-`-1` code the OS actually reaped,
/// 2. the last known `exitCode` if one was set,
/// 3. the side-channel `fallbackExitCode` (sigchild-compat),
/// 4. `128 + termsig` if the child died by a known signal.
///
/// Falls back to `-1` ("unavailable") if none of the above apply.
pub fn resolve_exit_code(
    reaped: Option<i32>,
    last_known: Option<i32>,
    fallback: Option<i32>,
    termsig: Option<i32>,
) -> i32 {
    if let Some(code) = reaped.filter(|&c| c != -1) {
        return code;
    }
    if let Some(code) = last_known {
        return code;
    }
    if let Some(code) = fallback {
        return code;
    }
    if let Some(sig) = termsig {
        return 128 + sig;
    }
    -1
}

/// Human-readable label for a raw exit code, covering the POSIX sysexits
/// range (64-78), the common shell/signal range (126-143), and the generic
/// 0/1/2 codes. Unknown codes map to `"Unknown error"`.
pub fn exit_code_text(code: i32) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error, or failure of an unspecified kind",
        2 => "Misuse of shell builtins",
        64 => "Command line usage error",
        65 => "Data format error",
        66 => "Cannot open input",
        67 => "Addressee unknown",
        68 => "Host name unknown",
        69 => "Service unavailable",
        70 => "Internal software error",
        71 => "System error (e.g., can't fork)",
        72 => "Critical OS file missing",
        73 => "Can't create (user) output file",
        74 => "Input/output error",
        75 => "Temp failure; user is invited to retry",
        76 => "Remote error in protocol",
        77 => "Permission denied",
        78 => "Configuration error",
        126 => "Command invoked cannot execute",
        127 => "Command not found",
        128 => "Invalid argument to exit",
        129 => "Hangup (SIGHUP)",
        130 => "Interrupt (SIGINT)",
        131 => "Quit and dump core (SIGQUIT)",
        132 => "Illegal instruction (SIGILL)",
        133 => "Trace/breakpoint trap (SIGTRAP)",
        134 => "Process aborted (SIGABRT)",
        135 => "Bus error (SIGBUS)",
        136 => "Floating point exception (SIGFPE)",
        137 => "Killed (SIGKILL)",
        138 => "User-defined signal 1 (SIGUSR1)",
        139 => "Segmentation fault (SIGSEGV)",
        140 => "User-defined signal 2 (SIGUSR2)",
        141 => "Broken pipe (SIGPIPE)",
        142 => "Alarm clock (SIGALRM)",
        143 => "Terminated (SIGTERM)",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaped_code_wins_when_valid() {
        assert_eq!(resolve_exit_code(Some(0), Some(7), Some(9), Some(15)), 0);
    }

    #[test]
    fn reaped_minus_one_falls_back_to_last_known() {
        assert_eq!(resolve_exit_code(Some(-1), Some(7), Some(9), Some(15)), 7);
    }

    #[test]
    fn falls_back_to_fallback_channel() {
        assert_eq!(resolve_exit_code(None, None, Some(9), Some(15)), 9);
    }

    #[test]
    fn falls_back_to_128_plus_termsig() {
        assert_eq!(resolve_exit_code(None, None, None, Some(15)), 143);
    }

    #[test]
    fn falls_back_to_minus_one_when_nothing_known() {
        assert_eq!(resolve_exit_code(None, None, None, None), -1);
    }

    #[test]
    fn text_covers_success_and_sigterm() {
        assert_eq!(exit_code_text(0), "Success");
        assert_eq!(exit_code_text(143), "Terminated (SIGTERM)");
    }

    #[test]
    fn text_unknown_code() {
        assert_eq!(exit_code_text(255), "Unknown error");
    }
}
