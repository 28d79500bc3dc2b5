#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskwarden::exec::{ClassifiedError, ErrorKind, NoopObserver, Supervisor};
use taskwarden::Invocation;
use taskwarden_test_utils::fixtures::sh_snippet;
use taskwarden_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const GRACE: Duration = Duration::from_millis(300);

fn supervisor() -> Supervisor {
    Supervisor::new().with_interrupt_grace(GRACE)
}

fn yes_path() -> &'static str {
    if Path::new("/usr/bin/yes").exists() {
        "/usr/bin/yes"
    } else {
        "yes"
    }
}

fn signal_of(err: &ClassifiedError) -> Option<i32> {
    match err {
        ClassifiedError::UncaughtSignal { signal, .. } => Some(*signal),
        _ => None,
    }
}

#[tokio::test]
async fn infinite_output_with_zero_timeout_is_stopped_by_signal() -> TestResult {
    init_tracing();

    let inv = Invocation::new(yes_path()).timeout(Duration::ZERO);
    let outcome =
        with_timeout(supervisor().run_until_finished(inv, Arc::new(NoopObserver))).await?;

    let err = outcome.error.as_ref().expect("expected failure");
    assert_eq!(err.kind(), ErrorKind::UncaughtSignal);
    assert!(err.to_string().contains("uncaught signal"));
    Ok(())
}

#[tokio::test]
async fn process_ignoring_interrupt_is_terminated_after_grace() -> TestResult {
    init_tracing();

    // The trap must be installed before the deadline fires.
    let inv = sh_snippet("trap '' INT; echo ready; while :; do sleep 0.05; done")
        .timeout(Duration::from_millis(500));

    let started = Instant::now();
    let outcome =
        with_timeout(supervisor().run_until_finished(inv, Arc::new(NoopObserver))).await?;
    let elapsed = started.elapsed();

    let err = outcome.error.as_ref().expect("expected failure");
    assert_eq!(signal_of(err), Some(15));
    assert!(elapsed >= Duration::from_millis(500) + GRACE, "{elapsed:?}");
    assert!(outcome.stdout_str().starts_with("ready"));
    Ok(())
}

#[tokio::test]
async fn partial_output_survives_forced_stop() -> TestResult {
    init_tracing();

    let inv = sh_snippet("echo started; exec sleep 30").timeout(Duration::from_millis(300));
    let outcome =
        with_timeout(supervisor().run_until_finished(inv, Arc::new(NoopObserver))).await?;

    let err = outcome.error.as_ref().expect("expected failure");
    assert_eq!(err.kind(), ErrorKind::UncaughtSignal);
    assert_eq!(outcome.stdout.as_deref(), Some("started\n"));
    Ok(())
}

#[tokio::test]
async fn quick_exit_wins_over_long_deadline() -> TestResult {
    init_tracing();

    let inv = sh_snippet("echo done").timeout(Duration::from_secs(5));
    let started = Instant::now();
    let outcome =
        with_timeout(supervisor().run_until_finished(inv, Arc::new(NoopObserver))).await?;

    assert!(outcome.is_success());
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn stop_interrupts_running_process() -> TestResult {
    init_tracing();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = supervisor().supervise(
        sh_snippet("exec sleep 30").timeout(Duration::from_secs(60)),
        Arc::new(NoopObserver),
        move |_, _, error| {
            let _ = tx.send(error);
        },
    );
    assert!(handle.pid().is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop();

    let error = with_timeout(rx).await?;
    assert_eq!(error.map(|e| e.kind()), Some(ErrorKind::UncaughtSignal));
    with_timeout(handle.wait()).await?;
    Ok(())
}
