// src/invocation.rs

//! The immutable description of one command to run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timeout applied when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// One command to supervise: path, arguments, working directory, optional
/// environment overlay and the deadline after which escalation starts.
///
/// Built with a consuming builder:
///
/// ```
/// use std::time::Duration;
/// use taskwarden::Invocation;
///
/// let inv = Invocation::new("/bin/echo")
///     .arg("hello")
///     .env("MESSAGE", "A message")
///     .timeout(Duration::from_secs(5));
/// assert_eq!(inv.arguments(), ["hello"]);
/// ```
///
/// A zero timeout is legal and means "escalate as soon as the supervisor
/// gets scheduled".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    command_path: String,
    arguments: Vec<String>,
    working_directory: Option<PathBuf>,
    environment: Option<BTreeMap<String, String>>,
    timeout: Duration,
}

impl Invocation {
    pub fn new(command_path: impl Into<String>) -> Self {
        Self {
            command_path: command_path.into(),
            arguments: Vec::new(),
            working_directory: None,
            environment: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add a single variable to the environment overlay.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Merge a set of variables into the environment overlay.
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let overlay = self.environment.get_or_insert_with(BTreeMap::new);
        for (k, v) in vars {
            overlay.insert(k.into(), v.into());
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_path(&self) -> &str {
        &self.command_path
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// `None` means the child inherits the caller's environment untouched.
    pub fn environment_overlay(&self) -> Option<&BTreeMap<String, String>> {
        self.environment.as_ref()
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }
}
