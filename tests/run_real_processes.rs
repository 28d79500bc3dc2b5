#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use taskwarden::exec::{ClassifiedError, ErrorKind, SpawnFailureReason};
use taskwarden::{Invocation, run_until_finished};
use taskwarden_test_utils::fixtures::{
    ECHO_MESSAGE, HELLO_WORLD, MESSAGE_KEY, MESSAGE_TEXT, sh_invocation, sh_snippet, write_script,
};
use taskwarden_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn spawn_reason(err: &ClassifiedError) -> Option<SpawnFailureReason> {
    match err {
        ClassifiedError::SpawnFailed { reason, .. } => Some(*reason),
        _ => None,
    }
}

#[tokio::test]
async fn hello_world_script_succeeds() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "hello_world.sh", HELLO_WORLD);

    let outcome = with_timeout(run_until_finished(sh_invocation(&script))).await?;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(outcome.stdout_str().starts_with("Hello World"));
    Ok(())
}

#[tokio::test]
async fn environment_overlay_reaches_child() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "echo_message.sh", ECHO_MESSAGE);

    let inv = sh_invocation(&script).env(MESSAGE_KEY, MESSAGE_TEXT);
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(outcome.stdout_str().starts_with(MESSAGE_TEXT));
    Ok(())
}

#[tokio::test]
async fn overlay_keeps_inherited_environment() -> TestResult {
    init_tracing();

    let inv = sh_snippet("echo \"$PATH\"").env(MESSAGE_KEY, MESSAGE_TEXT);
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert!(outcome.is_success());
    assert!(!outcome.stdout_str().trim().is_empty());
    Ok(())
}

#[tokio::test]
async fn cat_returns_file_contents_exactly() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let data_path = dir.path().join("data.txt");
    let data: String = (0..5000)
        .map(|i| format!("line {i}: the quick brown fox jumps over the lazy dög\n"))
        .collect();
    fs::write(&data_path, &data)?;

    let inv = Invocation::new("/bin/cat").arg(data_path.to_string_lossy());
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert!(outcome.is_success());
    assert_eq!(outcome.stdout.as_deref(), Some(data.as_str()));
    Ok(())
}

#[tokio::test]
async fn silent_command_reports_absent_output() -> TestResult {
    init_tracing();

    let outcome = with_timeout(run_until_finished(sh_snippet("exit 0"))).await?;

    assert!(outcome.is_success());
    assert!(outcome.stdout.is_none());
    assert!(outcome.stderr.is_none());
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_carries_code_and_stderr() -> TestResult {
    init_tracing();

    let inv = sh_snippet("echo out; echo oops >&2; exit 3");
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert_eq!(outcome.stdout.as_deref(), Some("out\n"));
    assert_eq!(outcome.stderr.as_deref(), Some("oops\n"));
    let err = outcome.error.expect("expected failure");
    assert_eq!(err.kind(), ErrorKind::NonzeroExit);
    assert_eq!(err.exit_code(), Some(3));
    assert!(err.to_string().contains("nonzero exit status 3"));
    assert!(err.to_string().contains("stderr: oops"));
    Ok(())
}

#[tokio::test]
async fn nonexistent_path_fails_to_spawn() -> TestResult {
    init_tracing();

    let outcome = with_timeout(run_until_finished(Invocation::new("invalid path"))).await?;

    assert!(outcome.stdout.is_none());
    let err = outcome.error.expect("expected failure");
    assert_eq!(err.kind(), ErrorKind::SpawnFailed);
    assert_eq!(spawn_reason(&err), Some(SpawnFailureReason::Unexecutable));
    Ok(())
}

#[tokio::test]
async fn empty_command_path_fails_to_spawn() -> TestResult {
    init_tracing();

    let outcome = with_timeout(run_until_finished(Invocation::new(""))).await?;

    let err = outcome.error.expect("expected failure");
    assert_eq!(spawn_reason(&err), Some(SpawnFailureReason::EmptyCommandPath));
    Ok(())
}

#[tokio::test]
async fn runs_in_requested_working_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let inv = Invocation::new("/bin/pwd").working_directory(dir.path());
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert!(outcome.is_success());
    let reported = Path::new(outcome.stdout_str().trim()).canonicalize()?;
    assert_eq!(reported, dir.path().canonicalize()?);
    Ok(())
}

#[tokio::test]
async fn missing_working_directory_fails_to_spawn() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let inv = Invocation::new("/bin/pwd").working_directory(dir.path().join("missing"));
    let outcome = with_timeout(run_until_finished(inv)).await?;

    let err = outcome.error.expect("expected failure");
    assert_eq!(
        spawn_reason(&err),
        Some(SpawnFailureReason::InvalidWorkingDirectory)
    );
    assert!(err.context().working_directory.is_some());
    Ok(())
}

#[tokio::test]
async fn concurrent_runs_do_not_share_output() -> TestResult {
    init_tracing();

    let mut tasks = Vec::new();
    for i in 0..4 {
        tasks.push(tokio::spawn(run_until_finished(sh_snippet(&format!(
            "echo run-{i}"
        )))));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let outcome = with_timeout(task).await??;
        assert_eq!(outcome.stdout, Some(format!("run-{i}\n")));
    }
    Ok(())
}

#[tokio::test]
async fn unrepresentable_timeout_runs_to_completion() -> TestResult {
    init_tracing();

    let inv = Invocation::new("/bin/echo")
        .arg("hi")
        .timeout(Duration::from_secs(u64::MAX / 2));
    let outcome = with_timeout(run_until_finished(inv)).await?;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.stdout.as_deref(), Some("hi\n"));
    Ok(())
}
