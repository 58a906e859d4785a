use super::*;

#[test]
fn output_disabled_wins_priority() {
    let mode = StdioMode::select(true, true, true, true);
    assert_eq!(mode, StdioMode::OutputDisabled);
}

#[test]
fn tty_wins_over_pty() {
    let mode = StdioMode::select(false, true, true, true);
    assert_eq!(mode, StdioMode::Tty);
}

#[test]
fn pty_requires_support() {
    assert_eq!(
        StdioMode::select(false, false, true, false),
        StdioMode::Piped
    );
    assert_eq!(StdioMode::select(false, false, true, true), StdioMode::Pty);
}

#[test]
fn default_is_piped() {
    assert_eq!(
        StdioMode::select(false, false, false, false),
        StdioMode::Piped
    );
}

#[tokio::test]
async fn piped_mode_stdio_is_real_pipes() {
    let stdio = build_child_stdio(StdioMode::Piped).expect("build child stdio");
    // Stdio itself has no public introspection; building it without error
    // (and without touching /dev/tty or a pty) is the observable contract.
    drop(stdio.stdin);
    drop(stdio.stdout);
    drop(stdio.stderr);
}

#[tokio::test]
async fn output_disabled_stdio_builds_without_error() {
    let stdio = build_child_stdio(StdioMode::OutputDisabled).expect("build child stdio");
    drop(stdio.stdin);
    drop(stdio.stdout);
    drop(stdio.stderr);
}
