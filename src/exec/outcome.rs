// src/exec/outcome.rs

//! Terminal values handed to the caller: [`Outcome`] and the typed
//! [`ClassifiedError`] it may carry.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::invocation::Invocation;

/// Coarse discriminant of a [`ClassifiedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SpawnFailed,
    UncaughtSignal,
    NonzeroExit,
}

/// Why a process could not be started at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnFailureReason {
    EmptyCommandPath,
    InvalidWorkingDirectory,
    /// The OS refused to execute the path (missing, or not executable).
    Unexecutable,
    Unknown,
}

impl fmt::Display for SpawnFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SpawnFailureReason::EmptyCommandPath => "command path is empty",
            SpawnFailureReason::InvalidWorkingDirectory => {
                "working directory does not exist or is not a directory"
            }
            SpawnFailureReason::Unexecutable => "command path is not executable",
            SpawnFailureReason::Unknown => "unknown error starting process",
        };
        f.write_str(msg)
    }
}

/// Error returned by a [`crate::exec::ProcessSpawner`] when nothing was
/// launched.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct SpawnFailure {
    pub reason: SpawnFailureReason,
    #[source]
    pub source: Option<std::io::Error>,
}

impl SpawnFailure {
    pub fn new(reason: SpawnFailureReason) -> Self {
        Self {
            reason,
            source: None,
        }
    }

    /// Map an OS spawn error onto a reason, keeping the error as source.
    pub fn from_io(err: std::io::Error) -> Self {
        let reason = match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SpawnFailureReason::Unexecutable
            }
            _ => SpawnFailureReason::Unknown,
        };
        Self {
            reason,
            source: Some(err),
        }
    }
}

/// Diagnostic fields attached to every classified error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub command_path: String,
    pub arguments: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub stderr: Option<String>,
}

impl RunContext {
    pub fn new(invocation: &Invocation, stderr: Option<&str>) -> Self {
        Self {
            command_path: invocation.command_path().to_string(),
            arguments: invocation.arguments().to_vec(),
            working_directory: invocation.working_dir().map(PathBuf::from),
            stderr: stderr.map(str::to_string),
        }
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "running command path: {}", self.command_path)?;
        if !self.arguments.is_empty() {
            write!(f, ", with arguments: {:?}", self.arguments)?;
        }
        if let Some(dir) = &self.working_directory {
            write!(f, ", in directory: {}", dir.display())?;
        }
        if let Some(stderr) = &self.stderr {
            write!(f, ", stderr: {}", stderr.trim_end())?;
        }
        Ok(())
    }
}

/// A run that did not succeed, classified by how it ended.
#[derive(Debug, Error)]
pub enum ClassifiedError {
    #[error("failed to start process ({reason}) {context}")]
    SpawnFailed {
        reason: SpawnFailureReason,
        context: RunContext,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("an uncaught signal ({signal}) terminated the process {context}")]
    UncaughtSignal { signal: i32, context: RunContext },

    #[error("terminated with a nonzero exit status {exit_code} {context}")]
    NonzeroExit { exit_code: i32, context: RunContext },
}

impl ClassifiedError {
    pub fn spawn_failed(failure: SpawnFailure, invocation: &Invocation) -> Self {
        ClassifiedError::SpawnFailed {
            reason: failure.reason,
            context: RunContext::new(invocation, None),
            source: failure.source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifiedError::SpawnFailed { .. } => ErrorKind::SpawnFailed,
            ClassifiedError::UncaughtSignal { .. } => ErrorKind::UncaughtSignal,
            ClassifiedError::NonzeroExit { .. } => ErrorKind::NonzeroExit,
        }
    }

    /// Exit code of a normally exited process; `None` for the other kinds.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ClassifiedError::NonzeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn context(&self) -> &RunContext {
        match self {
            ClassifiedError::SpawnFailed { context, .. }
            | ClassifiedError::UncaughtSignal { context, .. }
            | ClassifiedError::NonzeroExit { context, .. } => context,
        }
    }
}

/// The single terminal result of one invocation.
///
/// `stdout` / `stderr` are `None` when the stream never produced a chunk,
/// and `Some("")` only if an empty chunk was delivered.
#[derive(Debug)]
pub struct Outcome {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<ClassifiedError>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn stdout_str(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    pub fn stderr_str(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_unexecutable() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let failure = SpawnFailure::from_io(err);
        assert_eq!(failure.reason, SpawnFailureReason::Unexecutable);
        assert!(failure.source.is_some());
    }

    #[test]
    fn context_renders_only_present_fields() {
        let inv = Invocation::new("/usr/bin/yes");
        let ctx = RunContext::new(&inv, None);
        assert_eq!(ctx.to_string(), "running command path: /usr/bin/yes");

        let inv = Invocation::new("/bin/ls").arg("-l").working_directory("/tmp");
        let ctx = RunContext::new(&inv, Some("boom\n"));
        let rendered = ctx.to_string();
        assert!(rendered.contains("with arguments: [\"-l\"]"));
        assert!(rendered.contains("in directory: /tmp"));
        assert!(rendered.ends_with("stderr: boom"));
    }

    #[test]
    fn spawn_failed_carries_invocation_context() {
        let inv = Invocation::new("/no/such/binary").arg("x");
        let err = ClassifiedError::spawn_failed(
            SpawnFailure::new(SpawnFailureReason::Unexecutable),
            &inv,
        );
        assert_eq!(err.kind(), ErrorKind::SpawnFailed);
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.context().command_path, "/no/such/binary");
        assert!(err.to_string().contains("not executable"));
    }
}
