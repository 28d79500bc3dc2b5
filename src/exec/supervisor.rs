// src/exec/supervisor.rs

//! Supervision entry point.
//!
//! One call to [`Supervisor::supervise`] launches one process and spawns
//! one aggregator task for it. The aggregator is the single consumer of the
//! spawner's event channel: it forwards chunks to the optional
//! [`StreamObserver`], feeds the [`ResultCollector`], and races the
//! [`EscalationController`]'s deadline against the process. The task ends
//! right after the completion callback has fired, which also drops any
//! pending deadline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Result, TaskwardenError};
use crate::exec::classify::TerminationStatus;
use crate::exec::collector::{ResultCollector, outcome_handler};
use crate::exec::escalation::{DEFAULT_INTERRUPT_GRACE, EscalationController};
use crate::exec::outcome::{ClassifiedError, Outcome};
use crate::exec::spawner::{ProcessControl, ProcessEvent, ProcessSpawner, TokioSpawner};
use crate::invocation::Invocation;

/// Capacity of the per-run event channel between spawner and aggregator.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Longest single sleep of the run timer; far deadlines are re-armed.
const IDLE_TIMER: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Live view of a run's output, delivered before the completion callback.
///
/// All methods default to no-ops. They are called from the run's
/// aggregator task and should not block.
pub trait StreamObserver: Send + Sync {
    fn on_started(&self, _invocation: &Invocation, _pid: Option<u32>) {}
    fn on_stdout(&self, _text: &str) {}
    fn on_stderr(&self, _text: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

/// Handle to one supervised run.
///
/// Dropping the handle does not stop the run; the aggregator task keeps
/// itself alive until the completion callback has fired.
pub struct RunHandle {
    pid: Option<u32>,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("pid", &self.pid)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    /// OS process id, if the process was started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Start interrupt-then-terminate escalation now instead of at the
    /// deadline. No-op once escalation has begun or the run has finished.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// True once the completion callback has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the completion callback has returned.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| TaskwardenError::Other(anyhow::anyhow!("supervisor task failed: {e}")))
    }
}

/// Stop several runs at once (each escalates independently).
pub fn stop_all(handles: &[RunHandle]) {
    for handle in handles {
        handle.stop();
    }
}

/// Launches invocations through a [`ProcessSpawner`] and supervises them.
pub struct Supervisor<S: ProcessSpawner = TokioSpawner> {
    spawner: Arc<S>,
    interrupt_grace: Duration,
}

impl<S: ProcessSpawner> fmt::Debug for Supervisor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("interrupt_grace", &self.interrupt_grace)
            .finish_non_exhaustive()
    }
}

impl Default for Supervisor<TokioSpawner> {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor<TokioSpawner> {
    pub fn new() -> Self {
        Self::with_spawner(TokioSpawner)
    }
}

impl<S: ProcessSpawner + 'static> Supervisor<S> {
    pub fn with_spawner(spawner: S) -> Self {
        Self {
            spawner: Arc::new(spawner),
            interrupt_grace: DEFAULT_INTERRUPT_GRACE,
        }
    }

    /// How long an interrupted process may take to exit before terminate.
    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    pub fn interrupt_grace(&self) -> Duration {
        self.interrupt_grace
    }

    /// Launch `invocation` and report its single outcome to `completion`.
    ///
    /// Must be called from within a Tokio runtime. The callback runs on the
    /// run's aggregator task, also when the process could not be started.
    pub fn supervise<F>(
        &self,
        invocation: Invocation,
        observer: Arc<dyn StreamObserver>,
        completion: F,
    ) -> RunHandle
    where
        F: FnOnce(Option<String>, Option<String>, Option<ClassifiedError>) + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = Arc::new(Notify::new());
        let mut collector = ResultCollector::new(invocation.clone(), Box::new(completion));

        match self.spawner.spawn(&invocation, events_tx) {
            Err(failure) => {
                warn!(
                    cmd = %invocation.command_path(),
                    error = %failure,
                    "failed to start process"
                );
                let task = tokio::spawn(async move {
                    collector.on_spawn_failure(failure);
                });
                RunHandle {
                    pid: None,
                    stop,
                    task,
                }
            }
            Ok(process) => {
                let pid = process.pid();
                observer.on_started(&invocation, pid);

                let controller = EscalationController::new(
                    Instant::now(),
                    invocation.timeout_duration(),
                    self.interrupt_grace,
                );
                let task = tokio::spawn(aggregate(
                    collector,
                    controller,
                    process,
                    events_rx,
                    observer,
                    Arc::clone(&stop),
                ));
                RunHandle { pid, stop, task }
            }
        }
    }

    /// Supervise `invocation` and wait for its [`Outcome`].
    pub async fn run_until_finished(
        &self,
        invocation: Invocation,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<Outcome> {
        let (tx, rx) = oneshot::channel();
        let handler = outcome_handler(move |outcome| {
            let _ = tx.send(outcome);
        });
        let _handle = self.supervise(invocation, observer, handler);

        rx.await.map_err(|_| {
            TaskwardenError::Other(anyhow::anyhow!(
                "supervisor task ended without delivering an outcome"
            ))
        })
    }
}

/// Supervise `invocation` with the default [`TokioSpawner`].
pub fn supervise<F>(
    invocation: Invocation,
    observer: Arc<dyn StreamObserver>,
    completion: F,
) -> RunHandle
where
    F: FnOnce(Option<String>, Option<String>, Option<ClassifiedError>) + Send + 'static,
{
    Supervisor::new().supervise(invocation, observer, completion)
}

/// Run `invocation` with the default [`TokioSpawner`] and no live observer.
pub async fn run_until_finished(invocation: Invocation) -> Result<Outcome> {
    Supervisor::new()
        .run_until_finished(invocation, Arc::new(NoopObserver))
        .await
}

/// Timer target for `deadline`, capped at [`IDLE_TIMER`] from now.
fn park_until(deadline: Option<Instant>) -> Instant {
    let cap = Instant::now() + IDLE_TIMER;
    deadline.map_or(cap, |deadline| deadline.min(cap))
}

/// Aggregator loop for one run.
async fn aggregate(
    mut collector: ResultCollector,
    mut controller: EscalationController,
    process: Arc<dyn ProcessControl>,
    mut events: mpsc::Receiver<ProcessEvent>,
    observer: Arc<dyn StreamObserver>,
    stop: Arc<Notify>,
) {
    let timer = tokio::time::sleep_until(park_until(controller.next_deadline()));
    tokio::pin!(timer);

    loop {
        let timer_armed = controller.next_deadline().is_some();

        // Deadline first: a process flooding its pipes must not starve it.
        tokio::select! {
            biased;

            () = &mut timer, if timer_armed => {
                let now = Instant::now();
                if controller.next_deadline().is_some_and(|deadline| deadline <= now) {
                    controller.on_deadline(process.as_ref(), now);
                }
                timer.as_mut().reset(park_until(controller.next_deadline()));
            }

            () = stop.notified() => {
                controller.escalate_now(process.as_ref(), Instant::now());
                timer.as_mut().reset(park_until(controller.next_deadline()));
            }

            event = events.recv() => match event {
                Some(ProcessEvent::Stdout(text)) => {
                    observer.on_stdout(&text);
                    collector.on_stdout(&text);
                }
                Some(ProcessEvent::Stderr(text)) => {
                    observer.on_stderr(&text);
                    collector.on_stderr(&text);
                }
                Some(ProcessEvent::Terminated(status)) => {
                    controller.resolve();
                    collector.on_terminated(status);
                    break;
                }
                None => {
                    warn!(
                        pid = ?process.pid(),
                        "event stream closed without a termination report"
                    );
                    controller.resolve();
                    collector.on_terminated(TerminationStatus::lost());
                    break;
                }
            },
        }
    }

    debug!(pid = ?process.pid(), "aggregator finished");
}
