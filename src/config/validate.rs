// src/config/validate.rs

use crate::config::model::ConfigFile;
use crate::errors::{Result, TaskwardenError};

/// Check invariants serde cannot express.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_duration("[runner].timeout_secs", cfg.runner.timeout_secs)?;
    validate_duration("[runner].interrupt_grace_secs", cfg.runner.interrupt_grace_secs)?;
    validate_environment(cfg)?;
    Ok(())
}

fn validate_duration(field: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(TaskwardenError::ConfigError(format!(
            "{field} must be a finite, non-negative number of seconds (got {secs})"
        )));
    }
    Ok(())
}

fn validate_environment(cfg: &ConfigFile) -> Result<()> {
    for key in cfg.environment.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(TaskwardenError::ConfigError(format!(
                "[environment] has an invalid variable name {key:?}"
            )));
        }
    }
    Ok(())
}
