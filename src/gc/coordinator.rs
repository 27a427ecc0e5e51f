//! Reclamation pass scheduling.
//!
//! ## How it works
//!
//! 1. `trigger()` flips the state from `Idle` to `Scheduled` with a single
//!    compare-and-swap and posts a command to the worker thread. Any trigger
//!    that loses the swap is coalesced into the pass already in flight.
//! 2. The worker acquires the exclusivity lock, runs the native reclamation
//!    step and drains `poll_reclaimed()`, removing each reported object from
//!    the registry.
//! 3. The lock is released and the state returns to `Idle` on every exit
//!    path, including a failed step or a panic in native code. Statistics
//!    are published afterwards through a `watch` channel.
//!
//! A pass that never returns stalls every later pass; there is no timeout.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use tokio::sync::watch;

use super::exclusive_lock::ExclusiveLock;
use crate::error::NativeError;
use crate::native::NativeOps;
use crate::registry::HandleRegistry;

const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;

/// Where the coordinator is in its pass cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Scheduled,
    Running,
}

impl PassState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            SCHEDULED => PassState::Scheduled,
            RUNNING => PassState::Running,
            _ => PassState::Idle,
        }
    }
}

/// Cumulative reclamation statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Passes that drained the native side successfully
    pub passes_completed: u64,
    /// Passes that ended with a native error or panic
    pub passes_failed: u64,
    /// Registry entries removed across all passes
    pub objects_reclaimed: u64,
    /// Triggers absorbed by a pass already in flight
    pub triggers_coalesced: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl PassStats {
    /// Total passes that ran, successful or not.
    pub fn passes_run(&self) -> u64 {
        self.passes_completed + self.passes_failed
    }
}

enum Command {
    RunPass,
    Shutdown,
}

struct Shared {
    state: AtomicU8,
    coalesced: AtomicU64,
    registry: Arc<HandleRegistry>,
    lock: Arc<ExclusiveLock>,
    ops: Arc<dyn NativeOps>,
    stats: watch::Sender<PassStats>,
}

impl Shared {
    fn run_pass(&self) {
        self.state.store(RUNNING, Ordering::Release);
        tracing::debug!("Reclamation pass started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.reclaim()));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(NativeError::Panic(panic_message(payload.as_ref()))),
        };

        // Clear before publishing so observers of the new stats can trigger again
        self.state.store(IDLE, Ordering::Release);
        let coalesced = self.coalesced.load(Ordering::Relaxed);

        match result {
            Ok(reclaimed) => {
                tracing::debug!("Reclamation pass finished: {} objects reclaimed", reclaimed);
                self.stats.send_modify(|stats| {
                    stats.passes_completed += 1;
                    stats.objects_reclaimed += reclaimed;
                    stats.triggers_coalesced = coalesced;
                });
            }
            Err(err) => {
                tracing::error!("Reclamation pass failed: {}", err);
                self.stats.send_modify(|stats| {
                    stats.passes_failed += 1;
                    stats.triggers_coalesced = coalesced;
                    stats.last_error = Some(err.to_string());
                });
            }
        }
    }

    /// One pass body. The lock guard is released on every return path.
    fn reclaim(&self) -> Result<u64, NativeError> {
        let _guard = self.lock.acquire();

        self.ops.run_reclamation_step()?;

        let mut reclaimed = 0;
        while let Some(object) = self.ops.poll_reclaimed() {
            match self.registry.lookup(&object) {
                Some(handle) if handle.is_sentinel() => {
                    tracing::warn!(
                        "Native side reported sentinel {} as reclaimed, keeping it",
                        handle.native_id()
                    );
                }
                Some(_) => {
                    self.registry.remove(&object);
                    reclaimed += 1;
                }
                None => {
                    tracing::trace!("Reclaimed object {} was not registered", object.key());
                }
            }
        }

        Ok(reclaimed)
    }
}

/// Cheap, clonable handle for requesting a pass.
#[derive(Clone)]
pub struct GcTrigger {
    shared: Arc<Shared>,
    tx: mpsc::Sender<Command>,
}

impl GcTrigger {
    /// Request a reclamation pass.
    ///
    /// No-op when a pass is already scheduled or running. Never blocks and
    /// never fails; a trigger after shutdown is dropped.
    pub fn trigger(&self) {
        match self
            .shared
            .state
            .compare_exchange(IDLE, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                if self.tx.send(Command::RunPass).is_err() {
                    self.shared.state.store(IDLE, Ordering::Release);
                    tracing::debug!("Reclamation worker stopped, trigger ignored");
                } else {
                    tracing::trace!("Reclamation pass scheduled");
                }
            }
            Err(_) => {
                self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Reclamation pass already in flight, trigger coalesced");
            }
        }
    }

    pub fn state(&self) -> PassState {
        PassState::from_raw(self.shared.state.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for GcTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcTrigger")
            .field("state", &self.state())
            .finish()
    }
}

/// Owns the reclamation worker thread.
///
/// Dropping the coordinator stops the worker after any pass in progress.
pub struct GcCoordinator {
    trigger: GcTrigger,
    worker: Option<thread::JoinHandle<()>>,
}

impl GcCoordinator {
    /// Spawn the worker thread.
    pub fn start(
        registry: Arc<HandleRegistry>,
        lock: Arc<ExclusiveLock>,
        ops: Arc<dyn NativeOps>,
        thread_name: &str,
    ) -> std::io::Result<Self> {
        let (stats, _) = watch::channel(PassStats::default());
        let shared = Arc::new(Shared {
            state: AtomicU8::new(IDLE),
            coalesced: AtomicU64::new(0),
            registry,
            lock,
            ops,
            stats,
        });

        let (tx, rx) = mpsc::channel::<Command>();
        let worker_shared = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        Command::RunPass => worker_shared.run_pass(),
                        Command::Shutdown => break,
                    }
                }
                tracing::debug!("Reclamation worker exiting");
            })?;

        tracing::debug!("Reclamation worker '{}' started", thread_name);

        Ok(Self {
            trigger: GcTrigger { shared, tx },
            worker: Some(worker),
        })
    }

    /// Request a reclamation pass. See [`GcTrigger::trigger`].
    pub fn trigger(&self) {
        self.trigger.trigger();
    }

    /// Handle that other components use to request passes.
    pub fn trigger_handle(&self) -> GcTrigger {
        self.trigger.clone()
    }

    pub fn state(&self) -> PassState {
        self.trigger.state()
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> PassStats {
        self.trigger.shared.stats.borrow().clone()
    }

    /// Receive a notification after every pass.
    pub fn subscribe(&self) -> watch::Receiver<PassStats> {
        self.trigger.shared.stats.subscribe()
    }

    /// Stop the worker and wait for it. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Ignore error if the worker already exited
            let _ = self.trigger.tx.send(Command::Shutdown);

            if worker.join().is_err() {
                tracing::error!("Reclamation worker panicked");
            }
        }
    }
}

impl Drop for GcCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GcCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcCoordinator")
            .field("state", &self.state())
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
