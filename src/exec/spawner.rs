// src/exec/spawner.rs

//! Pluggable process spawner abstraction.
//!
//! The supervisor talks to a `ProcessSpawner` instead of
//! `tokio::process::Command` directly, so tests can swap in a fake that
//! scripts output and termination events without launching anything.
//!
//! - [`TokioSpawner`] is the production implementation. It launches the
//!   process, pumps stdout/stderr chunks and the exit status into one
//!   channel, and signals the process with SIGINT / SIGTERM on request.
//! - Every event for a run travels over the same bounded `mpsc` channel, so
//!   chunks read before the process exited always precede `Terminated`.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::exec::classify::TerminationStatus;
use crate::exec::decode::Utf8ChunkDecoder;
use crate::exec::outcome::{SpawnFailure, SpawnFailureReason};
use crate::invocation::Invocation;

/// How long pipe readers may keep draining after the child has exited.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// How often the waiter checks whether the child has exited.
pub const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Notification emitted by a spawner for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Terminated(TerminationStatus),
}

/// Control surface of one launched process.
///
/// Both stop requests are non-blocking and must return `false` (not fail)
/// once the process has terminated.
pub trait ProcessControl: Send + Sync {
    fn pid(&self) -> Option<u32>;
    fn is_running(&self) -> bool;
    /// Cooperative stop (SIGINT). Returns whether the signal was accepted.
    fn request_interrupt(&self) -> bool;
    /// Forceful fallback (SIGTERM). Returns whether the signal was accepted.
    fn request_terminate(&self) -> bool;
}

/// Trait abstracting how processes are launched.
///
/// Production code uses [`TokioSpawner`]; tests provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessSpawner: Send + Sync {
    /// Launch `invocation`, delivering its events on `events`.
    ///
    /// Must be called from within a Tokio runtime. On error nothing was
    /// launched and no event will be sent.
    fn spawn(
        &self,
        invocation: &Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<Arc<dyn ProcessControl>, SpawnFailure>;
}

/// Real spawner used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(
        &self,
        invocation: &Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<Arc<dyn ProcessControl>, SpawnFailure> {
        if invocation.command_path().is_empty() {
            return Err(SpawnFailure::new(SpawnFailureReason::EmptyCommandPath));
        }
        if let Some(dir) = invocation.working_dir() {
            if !dir.is_dir() {
                return Err(SpawnFailure::new(SpawnFailureReason::InvalidWorkingDirectory));
            }
        }

        let mut cmd = Command::new(invocation.command_path());
        cmd.args(invocation.arguments());
        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }
        if let Some(overlay) = invocation.environment_overlay() {
            cmd.envs(overlay);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(SpawnFailure::from_io)?;

        let pid = child.id();
        info!(
            cmd = %invocation.command_path(),
            pid = ?pid,
            "process started"
        );

        let stdout_reader = child
            .stdout
            .take()
            .map(|out| spawn_reader(out, events.clone(), ProcessEvent::Stdout));
        let stderr_reader = child
            .stderr
            .take()
            .map(|err| spawn_reader(err, events.clone(), ProcessEvent::Stderr));

        let process = Arc::new(OsProcess {
            pid,
            reaper: Mutex::new(Reaper {
                child,
                status: None,
            }),
        });

        let waiter_process = Arc::clone(&process);
        tokio::spawn(async move {
            let status = loop {
                match waiter_process.poll_exit() {
                    Ok(Some(status)) => break TerminationStatus::from(status),
                    Ok(None) => tokio::time::sleep(REAP_POLL_INTERVAL).await,
                    Err(e) => {
                        warn!(pid = ?waiter_process.pid, error = %e, "waiting for process failed");
                        break TerminationStatus::lost();
                    }
                }
            };
            debug!(pid = ?waiter_process.pid, ?status, "process exited; draining pipes");

            drain_readers(stdout_reader, stderr_reader).await;

            if events.send(ProcessEvent::Terminated(status)).await.is_err() {
                debug!(pid = ?waiter_process.pid, "supervisor gone before termination was reported");
            }
        });

        Ok(process)
    }
}

/// Give readers [`PIPE_DRAIN_GRACE`] to reach EOF, then abort the rest.
async fn drain_readers(stdout: Option<JoinHandle<()>>, stderr: Option<JoinHandle<()>>) {
    let mut readers: Vec<JoinHandle<()>> = stdout.into_iter().chain(stderr).collect();

    let drained = tokio::time::timeout(PIPE_DRAIN_GRACE, async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    })
    .await;

    if drained.is_err() {
        debug!("pipe still open after process exit; abandoning remaining output");
        for reader in &readers {
            reader.abort();
        }
    }
}

/// Pump one pipe into the event channel as decoded text chunks.
fn spawn_reader<R>(
    mut pipe: R,
    events: mpsc::Sender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = Utf8ChunkDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "pipe read failed; treating as EOF");
                    break;
                }
            };

            let text = decoder.decode(&buf[..n]);
            if text.is_empty() {
                continue;
            }
            trace!(bytes = n, "read chunk");
            if events.send(wrap(text)).await.is_err() {
                return;
            }
        }

        if let Some(rest) = decoder.finish() {
            let _ = events.send(wrap(rest)).await;
        }
    })
}

/// Handle to a process launched by [`TokioSpawner`].
///
/// The child is only ever reaped under `reaper`'s lock, and signals are sent
/// under the same lock after checking it has not exited. A pid is therefore
/// never signalled once the OS is free to reuse it.
#[derive(Debug)]
struct OsProcess {
    pid: Option<u32>,
    reaper: Mutex<Reaper>,
}

#[derive(Debug)]
struct Reaper {
    child: Child,
    /// Set once the child has been reaped.
    status: Option<ExitStatus>,
}

impl Reaper {
    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }
}

impl OsProcess {
    /// Exit status if the child has exited, reaping it if needed.
    fn poll_exit(&self) -> io::Result<Option<ExitStatus>> {
        let mut reaper = self
            .reaper
            .lock()
            .map_err(|_| io::Error::other("process state lock poisoned"))?;
        reaper.try_reap()
    }

    #[cfg(unix)]
    fn send_signal(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return false;
        };
        let Ok(mut reaper) = self.reaper.lock() else {
            return false;
        };
        match reaper.try_reap() {
            Ok(None) => {}
            Ok(Some(_)) => return false,
            Err(e) => {
                debug!(pid, error = %e, "cannot check process state; not signalling");
                return false;
            }
        }

        // The lock is still held: the child cannot be reaped before `kill`.
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => true,
            Err(e) => {
                debug!(pid, ?signal, error = %e, "signal rejected");
                false
            }
        }
    }
}

impl ProcessControl for OsProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_running(&self) -> bool {
        matches!(self.poll_exit(), Ok(None))
    }

    #[cfg(unix)]
    fn request_interrupt(&self) -> bool {
        self.send_signal(nix::sys::signal::Signal::SIGINT)
    }

    #[cfg(unix)]
    fn request_terminate(&self) -> bool {
        self.send_signal(nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    fn request_interrupt(&self) -> bool {
        false
    }

    #[cfg(not(unix))]
    fn request_terminate(&self) -> bool {
        warn!(pid = ?self.pid, "terminate is not supported on this platform");
        false
    }
}
