// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! These cover configuration and wiring problems. Failures of a supervised
//! process are never reported through this type; they are delivered as
//! [`crate::exec::ClassifiedError`] through the completion callback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskwardenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskwardenError>;
