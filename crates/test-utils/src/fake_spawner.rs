use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use taskwarden::Invocation;
use taskwarden::exec::{
    ProcessControl, ProcessEvent, ProcessSpawner, SpawnFailure, SpawnFailureReason,
    TerminationStatus,
};

/// Which stop request reached the fake process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeSignal {
    Interrupt,
    Terminate,
}

/// How the fake process reacts to a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalResponse {
    /// The request is refused (`false`).
    Reject,
    /// Accepted, but the process keeps running.
    Ignore,
    /// Accepted, and the process dies from the signal.
    Die,
}

/// Script for one fake run.
#[derive(Debug, Clone)]
pub struct FakePlan {
    /// Emitted in order right after spawn. A `Terminated` event marks the
    /// process as no longer running before it is sent.
    pub events: Vec<ProcessEvent>,
    pub interrupt: SignalResponse,
    pub terminate: SignalResponse,
    pub spawn_failure: Option<SpawnFailureReason>,
    /// Drop every event sender after `events`, without reporting termination.
    pub close_after_events: bool,
}

impl FakePlan {
    /// Emits `events` and otherwise never finishes on its own.
    pub fn new(events: Vec<ProcessEvent>) -> Self {
        Self {
            events,
            interrupt: SignalResponse::Die,
            terminate: SignalResponse::Die,
            spawn_failure: None,
            close_after_events: false,
        }
    }

    pub fn failing(reason: SpawnFailureReason) -> Self {
        Self {
            spawn_failure: Some(reason),
            ..Self::new(Vec::new())
        }
    }

    pub fn on_interrupt(mut self, response: SignalResponse) -> Self {
        self.interrupt = response;
        self
    }

    pub fn on_terminate(mut self, response: SignalResponse) -> Self {
        self.terminate = response;
        self
    }

    pub fn close_after_events(mut self) -> Self {
        self.close_after_events = true;
        self
    }
}

/// A fake spawner that:
/// - records every stop request it receives
/// - replays the scripted events of its [`FakePlan`] instead of running anything.
#[derive(Clone)]
pub struct FakeSpawner {
    plan: FakePlan,
    signals: Arc<Mutex<Vec<FakeSignal>>>,
    spawned: Arc<AtomicUsize>,
}

impl FakeSpawner {
    pub fn new(plan: FakePlan) -> Self {
        Self {
            plan,
            signals: Arc::new(Mutex::new(Vec::new())),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared log of stop requests, usable after the spawner is moved.
    pub fn signals(&self) -> Arc<Mutex<Vec<FakeSignal>>> {
        Arc::clone(&self.signals)
    }

    pub fn spawn_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.spawned)
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(
        &self,
        _invocation: &Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<Arc<dyn ProcessControl>, SpawnFailure> {
        if let Some(reason) = self.plan.spawn_failure {
            return Err(SpawnFailure::new(reason));
        }
        self.spawned.fetch_add(1, Ordering::SeqCst);

        let process = Arc::new(FakeProcess {
            running: AtomicBool::new(true),
            interrupt: self.plan.interrupt,
            terminate: self.plan.terminate,
            signals: Arc::clone(&self.signals),
            events: Mutex::new(Some(events.clone())),
        });

        let scripted = self.plan.events.clone();
        let close = self.plan.close_after_events;
        let task_process = Arc::clone(&process);
        tokio::spawn(async move {
            for event in scripted {
                if matches!(event, ProcessEvent::Terminated(_)) {
                    task_process.running.store(false, Ordering::SeqCst);
                }
                if events.send(event).await.is_err() {
                    return;
                }
            }
            if close {
                task_process.running.store(false, Ordering::SeqCst);
                task_process.events.lock().unwrap().take();
            }
        });

        Ok(process)
    }
}

struct FakeProcess {
    running: AtomicBool,
    interrupt: SignalResponse,
    terminate: SignalResponse,
    signals: Arc<Mutex<Vec<FakeSignal>>>,
    events: Mutex<Option<mpsc::Sender<ProcessEvent>>>,
}

impl FakeProcess {
    fn deliver(&self, signal: FakeSignal, response: SignalResponse, signo: i32) -> bool {
        if !self.is_running() {
            return false;
        }
        self.signals.lock().unwrap().push(signal);
        match response {
            SignalResponse::Reject => false,
            SignalResponse::Ignore => true,
            SignalResponse::Die => {
                self.running.store(false, Ordering::SeqCst);
                if let Some(events) = self.events.lock().unwrap().as_ref() {
                    let _ = events
                        .try_send(ProcessEvent::Terminated(TerminationStatus::signaled(signo)));
                }
                true
            }
        }
    }
}

impl ProcessControl for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn request_interrupt(&self) -> bool {
        self.deliver(FakeSignal::Interrupt, self.interrupt, 2)
    }

    fn request_terminate(&self) -> bool {
        self.deliver(FakeSignal::Terminate, self.terminate, 15)
    }
}
