// src/lib.rs

//! Supervised execution of external commands.
//!
//! A caller describes a command as an [`Invocation`], hands it to
//! [`Supervisor::supervise`] (or [`run_until_finished`]) and receives its
//! output and a single classified [`Outcome`]. If the command overruns its
//! timeout it is interrupted, and terminated if the interrupt does not
//! take.

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod invocation;
pub mod logging;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::exec::ClassifiedError;

pub use crate::exec::{
    NoopObserver, Outcome, RunHandle, StreamObserver, Supervisor, run_until_finished, supervise,
};
pub use crate::invocation::{DEFAULT_TIMEOUT, Invocation};

/// Exit code used when the command could not be started at all.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// High-level entry point used by `main.rs`.
///
/// Loads config, builds the invocation from CLI flags, runs it and maps the
/// outcome onto a process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = config::load_or_default(args.config.as_deref())?;

    let mut invocation = cfg.invocation(args.command.clone(), args.args.iter().cloned());
    if let Some(secs) = args.timeout {
        let timeout = std::time::Duration::try_from_secs_f64(secs)
            .map_err(|e| anyhow::anyhow!("invalid --timeout {secs}: {e}"))?;
        invocation = invocation.timeout(timeout);
    }
    if let Some(dir) = &args.cwd {
        invocation = invocation.working_directory(dir);
    }
    if !args.env.is_empty() {
        invocation = invocation.environment(args.env.iter().cloned());
    }
    debug!(?invocation, "running invocation");

    let observer: Arc<dyn StreamObserver> = if args.quiet {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ConsoleObserver)
    };

    let outcome = Supervisor::new()
        .with_interrupt_grace(cfg.interrupt_grace())
        .run_until_finished(invocation, observer)
        .await?;

    if args.quiet {
        print!("{}", outcome.stdout_str());
        eprint!("{}", outcome.stderr_str());
    }
    if let Some(err) = &outcome.error {
        eprintln!("taskwarden: {err}");
    }

    Ok(exit_code_for(&outcome))
}

/// Map an outcome onto a shell-style exit code.
pub fn exit_code_for(outcome: &Outcome) -> i32 {
    match &outcome.error {
        None => 0,
        Some(ClassifiedError::SpawnFailed { .. }) => EXIT_SPAWN_FAILED,
        Some(ClassifiedError::NonzeroExit { exit_code, .. }) => *exit_code,
        Some(ClassifiedError::UncaughtSignal { signal, .. }) => 128 + signal,
    }
}

/// Streams the child's output straight to this process's stdout/stderr.
struct ConsoleObserver;

impl StreamObserver for ConsoleObserver {
    fn on_stdout(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn on_stderr(&self, text: &str) {
        let _ = std::io::stderr().lock().write_all(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{RunContext, SpawnFailure, SpawnFailureReason};

    fn outcome(error: Option<ClassifiedError>) -> Outcome {
        Outcome {
            stdout: None,
            stderr: None,
            error,
        }
    }

    #[test]
    fn exit_codes_follow_shell_conventions() {
        let inv = Invocation::new("/bin/false");
        let ctx = RunContext::new(&inv, None);

        assert_eq!(exit_code_for(&outcome(None)), 0);
        assert_eq!(
            exit_code_for(&outcome(Some(ClassifiedError::NonzeroExit {
                exit_code: 3,
                context: ctx.clone(),
            }))),
            3
        );
        assert_eq!(
            exit_code_for(&outcome(Some(ClassifiedError::UncaughtSignal {
                signal: 15,
                context: ctx,
            }))),
            143
        );
        assert_eq!(
            exit_code_for(&outcome(Some(ClassifiedError::spawn_failed(
                SpawnFailure::new(SpawnFailureReason::Unexecutable),
                &inv,
            )))),
            EXIT_SPAWN_FAILED
        );
    }
}
