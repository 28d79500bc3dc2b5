// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::DEFAULT_INTERRUPT_GRACE;
use crate::invocation::{DEFAULT_TIMEOUT, Invocation};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// timeout_secs = 20.0
/// interrupt_grace_secs = 2.0
///
/// [environment]
/// MESSAGE = "A message"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,

    /// Environment overlay applied to every invocation built from this
    /// config. Empty means "inherit the caller's environment".
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Seconds before escalation starts. `0` escalates immediately.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Seconds an interrupted process gets before it is terminated.
    #[serde(default = "default_interrupt_grace_secs")]
    pub interrupt_grace_secs: f64,
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_interrupt_grace_secs() -> f64 {
    DEFAULT_INTERRUPT_GRACE.as_secs_f64()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interrupt_grace_secs: default_interrupt_grace_secs(),
        }
    }
}

impl ConfigFile {
    /// Falls back to the default if the value was never validated.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.runner.timeout_secs).unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::try_from_secs_f64(self.runner.interrupt_grace_secs)
            .unwrap_or(DEFAULT_INTERRUPT_GRACE)
    }

    /// Build an invocation carrying this config's timeout and environment.
    pub fn invocation<I, S>(&self, command_path: impl Into<String>, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inv = Invocation::new(command_path)
            .args(args)
            .timeout(self.timeout());
        if self.environment.is_empty() {
            inv
        } else {
            inv.environment(self.environment.clone())
        }
    }
}
