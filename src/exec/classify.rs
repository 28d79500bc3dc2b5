// src/exec/classify.rs

//! Termination classifier: turns a raw exit status into success or a typed
//! [`ClassifiedError`]. Pure; no IO, no Tokio.

use std::process::ExitStatus;

use crate::exec::outcome::{ClassifiedError, RunContext};
use crate::invocation::Invocation;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Exit,
    UncaughtSignal,
}

/// Raw termination report from a spawner.
///
/// For [`TerminationReason::UncaughtSignal`], `code` is the signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationStatus {
    pub code: i32,
    pub reason: TerminationReason,
}

impl TerminationStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            code,
            reason: TerminationReason::Exit,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: signal,
            reason: TerminationReason::UncaughtSignal,
        }
    }

    /// Status reported when the real one could not be observed.
    pub fn lost() -> Self {
        Self::exited(-1)
    }
}

impl From<ExitStatus> for TerminationStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return TerminationStatus::exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return TerminationStatus::signaled(signal);
            }
        }

        TerminationStatus::lost()
    }
}

/// Classify a finished run.
///
/// - normal exit with code 0 → `Ok(())`
/// - uncaught signal → [`ClassifiedError::UncaughtSignal`]
/// - normal exit with any other code → [`ClassifiedError::NonzeroExit`]
pub fn classify(
    status: TerminationStatus,
    stderr: Option<&str>,
    invocation: &Invocation,
) -> Result<(), ClassifiedError> {
    match status.reason {
        TerminationReason::Exit if status.code == 0 => Ok(()),
        TerminationReason::UncaughtSignal => Err(ClassifiedError::UncaughtSignal {
            signal: status.code,
            context: RunContext::new(invocation, stderr),
        }),
        TerminationReason::Exit => Err(ClassifiedError::NonzeroExit {
            exit_code: status.code,
            context: RunContext::new(invocation, stderr),
        }),
    }
}
