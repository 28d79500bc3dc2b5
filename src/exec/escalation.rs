// src/exec/escalation.rs

//! Timeout-driven escalation: interrupt first, terminate as a last resort.
//!
//! State machine:
//!
//! ```text
//! Armed --deadline--> Interrupting --rejected / grace expired--> Terminating
//!   \                     |                                        |
//!    `----------------- termination reported ------------------> Resolved
//! ```
//!
//! The controller owns no timer itself. The supervisor asks for
//! [`EscalationController::next_deadline`], sleeps until then and calls
//! [`EscalationController::on_deadline`]. It never touches captured output;
//! it only queries and signals the process through [`ProcessControl`].
//! Nothing stronger than terminate is ever sent.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::exec::spawner::ProcessControl;

/// Grace period between an accepted interrupt and the terminate fallback.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Armed,
    Interrupting,
    Terminating,
    Resolved,
}

#[derive(Debug)]
pub struct EscalationController {
    state: EscalationState,
    /// Pending while `Armed`; cleared once it has fired. `None` from the
    /// start when the timeout lies beyond what `Instant` can represent.
    timeout_deadline: Option<Instant>,
    /// Pending while `Interrupting` after an accepted interrupt.
    grace_deadline: Option<Instant>,
    interrupt_grace: Duration,
}

impl EscalationController {
    pub fn new(started_at: Instant, timeout: Duration, interrupt_grace: Duration) -> Self {
        Self {
            state: EscalationState::Armed,
            timeout_deadline: started_at.checked_add(timeout),
            grace_deadline: None,
            interrupt_grace,
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// When the supervisor should next call [`Self::on_deadline`].
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            EscalationState::Armed => self.timeout_deadline,
            EscalationState::Interrupting => self.grace_deadline,
            EscalationState::Terminating | EscalationState::Resolved => None,
        }
    }

    /// A deadline returned by [`Self::next_deadline`] has elapsed.
    pub fn on_deadline(&mut self, process: &dyn ProcessControl, now: Instant) {
        match self.state {
            EscalationState::Armed => {
                self.timeout_deadline = None;
                if !process.is_running() {
                    debug!(pid = ?process.pid(), "deadline reached after process finished; no signal sent");
                    return;
                }
                warn!(pid = ?process.pid(), "deadline reached; interrupting process");
                self.interrupt(process, now);
            }
            EscalationState::Interrupting => {
                self.grace_deadline = None;
                if !process.is_running() {
                    debug!(pid = ?process.pid(), "process ended during interrupt grace period");
                    return;
                }
                warn!(pid = ?process.pid(), "process ignored interrupt; terminating");
                self.terminate(process);
            }
            EscalationState::Terminating | EscalationState::Resolved => {}
        }
    }

    /// Start escalation now instead of waiting for the timeout.
    ///
    /// Has no effect once escalation has started or the run is resolved.
    pub fn escalate_now(&mut self, process: &dyn ProcessControl, now: Instant) {
        if self.state != EscalationState::Armed {
            return;
        }
        self.timeout_deadline = None;
        if !process.is_running() {
            return;
        }
        info!(pid = ?process.pid(), "stop requested; interrupting process");
        self.interrupt(process, now);
    }

    /// The spawner reported termination; any pending deadline is dropped.
    pub fn resolve(&mut self) {
        self.state = EscalationState::Resolved;
        self.timeout_deadline = None;
        self.grace_deadline = None;
    }

    fn interrupt(&mut self, process: &dyn ProcessControl, now: Instant) {
        self.state = EscalationState::Interrupting;
        if process.request_interrupt() {
            self.grace_deadline = now.checked_add(self.interrupt_grace);
        } else {
            warn!(pid = ?process.pid(), "interrupt rejected; terminating as last resort");
            self.terminate(process);
        }
    }

    fn terminate(&mut self, process: &dyn ProcessControl) {
        self.state = EscalationState::Terminating;
        self.grace_deadline = None;
        let accepted = process.request_terminate();
        info!(pid = ?process.pid(), accepted, "terminate requested");
    }
}
