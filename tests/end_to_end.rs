use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procengine::{OutputStream, Process};

#[tokio::test]
async fn echo_captures_stdout_and_exits_clean() {
    let mut process = Process::new("echo hello");
    let code = process.run(None).await.expect("run");
    assert_eq!(code, 0);
    assert!(process.is_successful());
    assert_eq!(process.get_output().await.unwrap(), b"hello\n");
    assert!(process.get_error_output().await.unwrap().is_empty());
}

#[tokio::test]
async fn stderr_writer_reports_failure() {
    let mut process = Process::new("echo oops 1>&2; exit 1");
    let code = process.run(None).await.expect("run");
    assert_eq!(code, 1);
    assert!(!process.is_successful());
    let stderr = process.get_error_output().await.unwrap();
    assert!(String::from_utf8_lossy(&stderr).contains("oops"));
}

#[tokio::test]
async fn cat_echoes_supplied_input() {
    let mut process = Process::new("cat");
    process
        .set_input(procengine::RawInput::Scalar(procengine::Scalar::Str(
            "ping".to_string(),
        )))
        .unwrap();
    let code = process.run(None).await.expect("run");
    assert_eq!(code, 0);
    assert_eq!(process.get_output().await.unwrap(), b"ping");
}

#[tokio::test]
async fn large_output_is_captured_without_deadlock() {
    let mut process = Process::new("head -c 2097152 /dev/zero | tr '\\0' 'a'");
    let code = process.run(None).await.expect("run");
    assert_eq!(code, 0);
    let output = process.get_output().await.unwrap();
    assert_eq!(output.len(), 2 * 1024 * 1024);
}

#[tokio::test]
async fn timeout_raises_process_timed_out_general() {
    let mut process = Process::new("sleep 10");
    process.set_timeout(0.5).unwrap();

    let started = std::time::Instant::now();
    let err = process.run(None).await.expect_err("should time out");
    assert!(matches!(
        err,
        procengine::ProcessError::ProcessTimedOut {
            kind: procengine::TimeoutKind::General,
            ..
        }
    ));
    assert!(started.elapsed() < Duration::from_millis(500 + 2 * 200));
    assert!(process.exit_code().is_some());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!process.is_running());
}

#[tokio::test]
async fn idle_timeout_raises_after_initial_output() {
    let mut process = Process::new("echo starting; sleep 10");
    process.set_idle_timeout(0.5).unwrap();

    let err = process.run(None).await.expect_err("should idle out");
    assert!(matches!(
        err,
        procengine::ProcessError::ProcessTimedOut {
            kind: procengine::TimeoutKind::Idle,
            ..
        }
    ));
}

#[tokio::test]
async fn signal_kills_sleeping_child() {
    let mut process = Process::new("sleep 10");
    process.start(None).await.expect("start");
    process.signal(15).expect("signal");
    let result = process.wait(None).await;
    // Preserves the documented quirk: the requested signal (15) matches the
    // reported termsig, so this does not raise.
    assert!(result.is_ok());
}

#[tokio::test]
async fn must_run_fails_on_nonzero_exit() {
    let mut process = Process::new("false");
    let err = process.must_run(None).await.expect_err("should fail");
    match err {
        procengine::ProcessError::ProcessFailed { exit_code, process } => {
            assert_eq!(exit_code, 1);
            assert_eq!(process.exit_code, Some(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn callback_receives_the_same_bytes_as_get_output() {
    let collected: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();

    let mut process = Process::new("printf 'a%.0sb%.0sc%.0s' 1 2 3");
    let code = process
        .run(Some(Box::new(move |stream, bytes| {
            if stream == OutputStream::Out {
                sink.lock().unwrap().extend_from_slice(bytes);
            }
        })))
        .await
        .expect("run");
    assert_eq!(code, 0);

    let output = process.get_output().await.unwrap();
    assert_eq!(*collected.lock().unwrap(), output);
}

#[tokio::test]
async fn incremental_output_concatenates_to_full_output() {
    let mut process = Process::new("printf 'one two three'");
    process.start(None).await.expect("start");

    let mut collected = Vec::new();
    loop {
        // `get_output()` is what actually drives a `read_pipes` step;
        // `get_incremental_output()` is a pure buffer slice with no I/O of
        // its own, so each iteration must pump a read before taking the
        // incremental delta.
        process.get_output().await.unwrap();
        collected.extend(process.get_incremental_output());
        if !process.is_running() {
            process.get_output().await.unwrap();
            collected.extend(process.get_incremental_output());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let _ = process.wait(None).await;

    assert_eq!(collected, process.get_output().await.unwrap());
}

#[tokio::test]
async fn start_twice_fails_runtime() {
    let mut process = Process::new("sleep 1");
    process.start(None).await.expect("start");
    let err = process.start(None).await.expect_err("already running");
    assert!(matches!(err, procengine::ProcessError::Runtime(_)));
    let _ = process.stop(Duration::from_millis(100), None).await;
}

#[tokio::test]
async fn restart_does_not_mutate_original() {
    let mut original = Process::new("echo hello");
    original.run(None).await.expect("run");
    let original_output = original.get_output().await.unwrap();
    let original_exit = original.exit_code();

    let mut restarted = original.restart(None).await.expect("restart");
    restarted.wait(None).await.expect("wait");

    assert_eq!(original.exit_code(), original_exit);
    assert_eq!(original.get_output().await.unwrap(), original_output);
}

#[tokio::test]
async fn custom_working_directory_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut process = Process::new("pwd");
    process.set_cwd(dir.path()).unwrap();
    process.run(None).await.expect("run");

    let output = process.get_output().await.unwrap();
    let printed = String::from_utf8_lossy(&output);
    assert_eq!(printed.trim(), dir.path().to_string_lossy());
}

#[tokio::test]
async fn custom_environment_variable_is_visible_to_child() {
    let mut env = HashMap::new();
    env.insert("PROCENGINE_TEST_VAR".to_string(), "marker-123".to_string());

    let mut process = Process::new("echo $PROCENGINE_TEST_VAR");
    process.set_env(env).unwrap();
    process.run(None).await.expect("run");

    let output = process.get_output().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output).trim(), "marker-123");
}
