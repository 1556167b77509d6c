// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Process supervisor: keep N worker processes alive.
//!
//! ```text
//! Idle -> Spawning(N) -> Steady(N)
//!             ^               |
//!             |   worker exit |
//!             +-- Spawning(1) +
//!
//! any state -- shutdown --> Stopped
//! ```
//!
//! Replacement is unconditional: no backoff, no restart ceiling, no look at
//! why the worker died. A worker that crashes on startup will be restarted
//! in a tight loop.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ENV_WORKER_SLOT;
use crate::errors::SupervisorError;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Spawning(usize),
    Steady(usize),
    Stopped,
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl WorkerExit {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => write!(f, "signal {}", sig),
            (None, None) => write!(f, "unknown cause"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Spawned { slot: usize, pid: Option<u32> },
    Exited { slot: usize, pid: Option<u32>, exit: WorkerExit },
}

/// A started worker. `exited` resolves once the process is gone.
pub struct LaunchedWorker {
    pub pid: Option<u32>,
    pub exited: oneshot::Receiver<WorkerExit>,
}

#[async_trait]
pub trait WorkerLauncher: Send {
    async fn launch(&mut self, slot: usize) -> io::Result<LaunchedWorker>;
}

/// Starts workers as child processes.
///
/// Children inherit environment and stdio. Cancelling `shutdown` sends every
/// child this launcher started SIGTERM, then SIGKILL once `kill_grace` runs
/// out.
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
    shutdown: CancellationToken,
    kill_grace: Duration,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, shutdown: CancellationToken) -> Self {
        Self {
            program: program.into(),
            args,
            shutdown,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// How long a terminated child gets to finish in-flight requests.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Re-run this binary with the `worker` subcommand.
    pub fn current_exe(shutdown: CancellationToken) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, vec!["worker".to_string()], shutdown))
    }
}

#[async_trait]
impl WorkerLauncher for CommandLauncher {
    async fn launch(&mut self, slot: usize) -> io::Result<LaunchedWorker> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(ENV_WORKER_SLOT, slot.to_string())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let (tx, rx) = oneshot::channel();
        let shutdown = self.shutdown.clone();
        let kill_grace = self.kill_grace;

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = shutdown.cancelled() => {
                    let stopped = if terminate(pid) {
                        tokio::time::timeout(kill_grace, child.wait()).await.ok()
                    } else {
                        None
                    };
                    match stopped {
                        Some(status) => status,
                        None => {
                            tracing::warn!(?pid, "Worker did not stop in time, killing");
                            if let Err(e) = child.start_kill() {
                                tracing::warn!(?pid, "Failed to kill worker: {}", e);
                            }
                            child.wait().await
                        }
                    }
                }
            };

            let exit = match status {
                Ok(status) => WorkerExit::from_status(status),
                Err(e) => {
                    tracing::error!(?pid, "Failed to reap worker: {}", e);
                    WorkerExit::default()
                }
            };
            let _ = tx.send(exit);
        });

        Ok(LaunchedWorker { pid, exited: rx })
    }
}

/// Ask a child to stop. `false` if no signal was delivered.
#[cfg(unix)]
fn terminate(pid: Option<u32>) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(pid = raw, "Failed to send SIGTERM: {}", e);
            false
        }
    }
}

#[cfg(not(unix))]
fn terminate(_pid: Option<u32>) -> bool {
    false
}

type ExitFuture = BoxFuture<'static, (usize, Option<u32>, WorkerExit)>;

pub struct Supervisor<L> {
    launcher: L,
    target: usize,
    state: watch::Sender<SupervisorState>,
    events: Option<mpsc::UnboundedSender<SupervisorEvent>>,
    shutdown_grace: Duration,
    restarts: u64,
}

impl<L: WorkerLauncher> Supervisor<L> {
    pub fn new(launcher: L, target: usize) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            launcher,
            target,
            state,
            events: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            restarts: 0,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// How long to wait for children to be reaped after shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Run until `shutdown` is cancelled. Returns the number of restarts.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<u64, SupervisorError> {
        if self.target == 0 {
            return Err(SupervisorError::NoWorkers);
        }

        let mut exits: FuturesUnordered<ExitFuture> = FuturesUnordered::new();

        self.transition(SupervisorState::Spawning(self.target));
        for slot in 0..self.target {
            let exit = self.spawn(slot).await?;
            exits.push(exit);
        }
        self.transition(SupervisorState::Steady(self.target));
        tracing::info!(workers = self.target, "Worker pool ready");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some((slot, pid, exit)) = exits.next() => {
                    tracing::warn!(slot, ?pid, "Worker died ({}), replacing", exit);
                    self.emit(SupervisorEvent::Exited { slot, pid, exit });

                    self.transition(SupervisorState::Spawning(1));
                    let replacement = self.spawn(slot).await?;
                    exits.push(replacement);
                    self.restarts += 1;
                    self.transition(SupervisorState::Steady(self.target));
                }
            }
        }

        tracing::info!(restarts = self.restarts, "Supervisor shutting down");
        let drain = async {
            while let Some((slot, pid, exit)) = exits.next().await {
                tracing::debug!(slot, ?pid, "Worker stopped ({})", exit);
                self.emit(SupervisorEvent::Exited { slot, pid, exit });
            }
        };
        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            tracing::warn!("Workers still running after shutdown grace period");
        }

        self.transition(SupervisorState::Stopped);
        Ok(self.restarts)
    }

    async fn spawn(&mut self, slot: usize) -> Result<ExitFuture, SupervisorError> {
        let launched = self
            .launcher
            .launch(slot)
            .await
            .map_err(|source| SupervisorError::Spawn { slot, source })?;

        let pid = launched.pid;
        tracing::info!(slot, ?pid, "Worker spawned");
        self.emit(SupervisorEvent::Spawned { slot, pid });

        let exited = launched.exited;
        Ok(async move {
            let exit = exited.await.unwrap_or_default();
            (slot, pid, exit)
        }
        .boxed())
    }

    fn transition(&self, next: SupervisorState) {
        self.state.send_replace(next);
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
