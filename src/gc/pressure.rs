//! Memory pressure detection.
//!
//! Applications that never release native resources explicitly would grow
//! the registry without bound. This module gives the bridge an
//! opportunistic cleanup path that does not depend on native code asking
//! for one.
//!
//! ## How it works
//!
//! [`MemoryPressure`] is the allocator-side signal. It owns the only strong
//! reference to each armed [`PressureSentinel`]; a [`PressureReaper`] keeps a
//! `Weak` one. When pressure is detected the signal drops its sentinels, and
//! each sentinel's `Drop` notifies its reaper, which:
//!
//! 1. clears its armed slot so a fresh sentinel can be armed
//! 2. requests a reclamation pass
//!
//! Pressure is detected when the external memory tracked through
//! [`ExternalMemoryGuard`](super::ExternalMemoryGuard) reaches the soft
//! limit, or when the embedder calls [`MemoryPressure::signal`] (for example
//! from a near-heap-limit callback).
//!
//! A reaper fires at most once per armed sentinel. Re-arming happens when a
//! native scope is exited, so every clear is followed by a fresh sentinel as
//! soon as native code runs again.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::coordinator::GcTrigger;

/// Allocator-side pressure signal.
pub struct MemoryPressure {
    /// Bytes of native memory currently reported
    tracked: AtomicI64,
    /// Tracked total at which sentinels are cleared (0 = never)
    soft_limit: u64,
    /// Strong references to armed sentinels
    held: Mutex<Vec<Arc<PressureSentinel>>>,
    /// Number of pressure events that cleared at least one sentinel
    events: AtomicU64,
}

impl MemoryPressure {
    pub fn new(soft_limit_bytes: u64) -> Self {
        Self {
            tracked: AtomicI64::new(0),
            soft_limit: soft_limit_bytes,
            held: Mutex::new(Vec::new()),
            events: AtomicU64::new(0),
        }
    }

    /// Record a change in tracked native memory.
    ///
    /// Growth that reaches the soft limit signals pressure.
    pub fn adjust(&self, delta: i64) {
        if delta == 0 {
            return;
        }

        let total = self
            .tracked
            .fetch_add(delta, Ordering::AcqRel)
            .saturating_add(delta);
        tracing::trace!("Adjusted tracked native memory by {} (total: {})", delta, total);

        // Limits beyond i64::MAX are never reached
        let reached = i64::try_from(self.soft_limit).is_ok_and(|limit| total >= limit);

        if delta > 0 && self.soft_limit > 0 && reached {
            tracing::warn!(
                "Tracked native memory {} MB reached soft limit {} MB",
                total / (1024 * 1024),
                self.soft_limit / (1024 * 1024)
            );
            self.signal();
        }
    }

    /// Clear every armed sentinel.
    ///
    /// Returns the number of sentinels cleared.
    pub fn signal(&self) -> usize {
        let cleared = {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *held)
        };

        let count = cleared.len();
        if count > 0 {
            self.events.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Memory pressure: clearing {} sentinel(s)", count);
        }

        // Sentinel drops run reaper callbacks; keep them outside the lock
        drop(cleared);

        count
    }

    /// Bytes of native memory currently reported.
    pub fn tracked_bytes(&self) -> i64 {
        self.tracked.load(Ordering::Acquire)
    }

    pub fn soft_limit(&self) -> u64 {
        self.soft_limit
    }

    /// Number of sentinels waiting for the next pressure event.
    pub fn armed_sentinels(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Pressure events that cleared at least one sentinel.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    fn hold(&self, sentinel: Arc<PressureSentinel>) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sentinel);
    }
}

impl std::fmt::Debug for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPressure")
            .field("tracked", &self.tracked_bytes())
            .field("soft_limit", &self.soft_limit)
            .field("armed", &self.armed_sentinels())
            .finish()
    }
}

/// Marker whose destruction means "memory is under pressure".
pub struct PressureSentinel {
    reaper: Weak<ReaperShared>,
}

impl Drop for PressureSentinel {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.upgrade() {
            reaper.reap(self as *const PressureSentinel);
        }
    }
}

struct ReaperShared {
    armed: Mutex<Option<Weak<PressureSentinel>>>,
    pressure: Arc<MemoryPressure>,
    trigger: GcTrigger,
    fired: AtomicU64,
}

impl ReaperShared {
    fn reap(&self, sentinel: *const PressureSentinel) {
        {
            let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
            // Only de-register if the slot still refers to this sentinel
            if armed
                .as_ref()
                .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), sentinel))
            {
                *armed = None;
            }
        }

        let fired = self.fired.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!("Pressure sentinel cleared (fired: {}), requesting pass", fired);
        self.trigger.trigger();
    }
}

/// Requests a reclamation pass when its pressure sentinel is cleared.
pub struct PressureReaper {
    shared: Arc<ReaperShared>,
}

impl PressureReaper {
    /// Create an unarmed reaper.
    pub fn new(pressure: Arc<MemoryPressure>, trigger: GcTrigger) -> Self {
        Self {
            shared: Arc::new(ReaperShared {
                armed: Mutex::new(None),
                pressure,
                trigger,
                fired: AtomicU64::new(0),
            }),
        }
    }

    /// Arm a fresh sentinel unless one is already armed.
    ///
    /// Returns true if a new sentinel was armed.
    pub fn arm(&self) -> bool {
        let mut armed = self
            .shared
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // strong_count, not upgrade: a temporary strong ref could become the
        // last one and run the sentinel's drop while `armed` is locked
        if armed.as_ref().is_some_and(|weak| weak.strong_count() > 0) {
            return false;
        }

        let sentinel = Arc::new(PressureSentinel {
            reaper: Arc::downgrade(&self.shared),
        });
        *armed = Some(Arc::downgrade(&sentinel));
        self.shared.pressure.hold(sentinel);

        tracing::trace!("Pressure sentinel armed");
        true
    }

    /// Check whether a sentinel is currently armed.
    pub fn is_armed(&self) -> bool {
        self.shared
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of times a cleared sentinel requested a pass.
    pub fn fired(&self) -> u64 {
        self.shared.fired.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PressureReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureReaper")
            .field("armed", &self.is_armed())
            .field("fired", &self.fired())
            .finish()
    }
}
