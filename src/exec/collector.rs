// src/exec/collector.rs

//! Result collector: the single owner of one run's captured output and the
//! only code path that fires the completion callback.
//!
//! The collector is driven from one aggregator task, so its handlers never
//! run concurrently. Once the callback has fired the collector is
//! finalized and every further notification is ignored.

use std::fmt;

use tracing::{debug, info};

use crate::exec::classify::{TerminationReason, TerminationStatus, classify};
use crate::exec::outcome::{ClassifiedError, Outcome, SpawnFailure};
use crate::invocation::Invocation;

/// Completion callback: `(stdout, stderr, error)`, invoked exactly once.
pub type CompletionHandler =
    Box<dyn FnOnce(Option<String>, Option<String>, Option<ClassifiedError>) + Send + 'static>;

/// Live or terminated state of one invocation's execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Run {
    pub running: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub termination: Option<TerminationStatus>,
}

impl Run {
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination.map(|t| t.reason)
    }
}

pub struct ResultCollector {
    invocation: Invocation,
    run: Run,
    completion: Option<CompletionHandler>,
}

impl fmt::Debug for ResultCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCollector")
            .field("invocation", &self.invocation)
            .field("run", &self.run)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl ResultCollector {
    pub fn new(invocation: Invocation, completion: CompletionHandler) -> Self {
        Self {
            invocation,
            run: Run {
                running: true,
                ..Run::default()
            },
            completion: Some(completion),
        }
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn is_finalized(&self) -> bool {
        self.completion.is_none()
    }

    pub fn on_stdout(&mut self, chunk: &str) {
        if self.is_finalized() {
            return;
        }
        self.run.stdout.get_or_insert_with(String::new).push_str(chunk);
    }

    pub fn on_stderr(&mut self, chunk: &str) {
        if self.is_finalized() {
            return;
        }
        self.run.stderr.get_or_insert_with(String::new).push_str(chunk);
    }

    /// Record the termination, classify it and fire the callback.
    pub fn on_terminated(&mut self, status: TerminationStatus) {
        let Some(completion) = self.completion.take() else {
            debug!(?status, "termination reported after finalization; ignoring");
            return;
        };

        self.run.running = false;
        self.run.termination = Some(status);

        let error = classify(status, self.run.stderr.as_deref(), &self.invocation).err();

        info!(
            cmd = %self.invocation.command_path(),
            exit_code = status.code,
            reason = ?status.reason,
            success = error.is_none(),
            "run finished"
        );

        completion(self.run.stdout.take(), self.run.stderr.take(), error);
    }

    /// The process never started; report straight away.
    pub fn on_spawn_failure(&mut self, failure: SpawnFailure) {
        let Some(completion) = self.completion.take() else {
            debug!(error = %failure, "spawn failure reported after finalization; ignoring");
            return;
        };

        self.run.running = false;
        let error = ClassifiedError::spawn_failed(failure, &self.invocation);

        info!(
            cmd = %self.invocation.command_path(),
            error = %error,
            "run could not be started"
        );

        completion(None, None, Some(error));
    }
}

/// Adapt a callback that takes an [`Outcome`] into a [`CompletionHandler`].
pub fn outcome_handler<F>(f: F) -> CompletionHandler
where
    F: FnOnce(Outcome) + Send + 'static,
{
    Box::new(move |stdout, stderr, error| {
        f(Outcome {
            stdout,
            stderr,
            error,
        })
    })
}
