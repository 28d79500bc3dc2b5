// src/exec/mod.rs

//! Process supervision layer.
//!
//! - [`spawner`] launches processes and streams their events
//!   (`ProcessSpawner` / `ProcessControl`, production `TokioSpawner`).
//! - [`decode`] turns raw pipe reads into text chunks.
//! - [`collector`] accumulates output and fires the completion callback
//!   exactly once.
//! - [`escalation`] is the interrupt-then-terminate timeout policy.
//! - [`classify`] maps a raw exit status onto success or a typed error.
//! - [`outcome`] holds the values handed back to callers.
//! - [`supervisor`] wires all of the above into one aggregator task per run.

pub mod classify;
pub mod collector;
pub mod decode;
pub mod escalation;
pub mod outcome;
pub mod spawner;
pub mod supervisor;

pub use classify::{TerminationReason, TerminationStatus, classify};
pub use collector::{CompletionHandler, ResultCollector, Run};
pub use escalation::{DEFAULT_INTERRUPT_GRACE, EscalationController, EscalationState};
pub use outcome::{
    ClassifiedError, ErrorKind, Outcome, RunContext, SpawnFailure, SpawnFailureReason,
};
pub use spawner::{ProcessControl, ProcessEvent, ProcessSpawner, TokioSpawner};
pub use supervisor::{
    NoopObserver, RunHandle, StreamObserver, Supervisor, run_until_finished, stop_all, supervise,
};
