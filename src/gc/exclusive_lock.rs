//! ExclusiveLock - RAII exclusivity for native code.
//!
//! Native code is not safe to run concurrently with managed-heap mutation or
//! with a reclamation pass. Every native-sensitive operation therefore runs
//! while holding this lock. It is never taken for plain lookups or
//! insertions in the registry.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use super::deferred_free::DeferredFreeQueue;
use crate::handle::NativeId;
use crate::native::NativeOps;

thread_local! {
    /// Lock currently held by this thread (if any), by address.
    /// Used by `ExclusiveLock::is_held_by_current_thread()`.
    static CURRENT_LOCK: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Process-wide (per bridge) mutual exclusion for native work.
///
/// On acquisition:
/// - Applies any deferred native frees
/// - Registers the lock in thread-local state for `is_held_by_current_thread()`
///
/// The lock is not re-entrant.
pub struct ExclusiveLock {
    mutex: Mutex<()>,
    deferred: DeferredFreeQueue,
    ops: Arc<dyn NativeOps>,
}

impl ExclusiveLock {
    pub fn new(ops: Arc<dyn NativeOps>) -> Self {
        Self {
            mutex: Mutex::new(()),
            deferred: DeferredFreeQueue::new(),
            ops,
        }
    }

    /// Block until the lock is available.
    ///
    /// A poisoned mutex (a panic while the lock was held) is recovered: the
    /// lock protects no data of its own.
    pub fn acquire(&self) -> ExclusiveGuard<'_> {
        debug_assert!(
            !self.is_held_by_current_thread(),
            "exclusivity lock is not re-entrant"
        );

        let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.enter(guard)
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<ExclusiveGuard<'_>> {
        let guard = match self.mutex.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(self.enter(guard))
    }

    fn enter<'a>(&'a self, guard: MutexGuard<'a, ()>) -> ExclusiveGuard<'a> {
        let previous = CURRENT_LOCK.with(|c| c.replace(Some(self.addr())));

        // Built before flushing so its Drop restores CURRENT_LOCK if a free unwinds
        let exclusive = ExclusiveGuard {
            lock: self,
            previous,
            _guard: guard,
        };

        let flushed = self.deferred.process_all(&*self.ops);
        if flushed > 0 {
            tracing::trace!("Applied {} deferred frees on lock acquisition", flushed);
        }

        exclusive
    }

    /// Check whether the calling thread holds this lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        CURRENT_LOCK.with(|c| c.get() == Some(self.addr()))
    }

    /// Release a native identifier.
    ///
    /// Runs immediately when the caller holds the lock or the lock is free;
    /// otherwise the identifier is queued until the next acquisition.
    pub fn free(&self, id: NativeId) {
        if self.is_held_by_current_thread() {
            self.ops.free(id);
            return;
        }

        match self.try_acquire() {
            Some(_guard) => self.ops.free(id),
            None => self.deferred.defer(id),
        }
    }

    /// Queue of frees waiting for the lock.
    pub fn deferred(&self) -> &DeferredFreeQueue {
        &self.deferred
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }
}

impl std::fmt::Debug for ExclusiveLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveLock")
            .field("held_here", &self.is_held_by_current_thread())
            .field("deferred", &self.deferred)
            .finish()
    }
}

/// Proof that the exclusivity lock is held by the current thread.
///
/// Operations that must not race with a reclamation pass (`mark`, `unmark`,
/// native calls) take `&ExclusiveGuard`.
pub struct ExclusiveGuard<'a> {
    lock: &'a ExclusiveLock,
    /// Lock held before this one: a thread may hold locks of several bridges
    previous: Option<usize>,
    _guard: MutexGuard<'a, ()>,
}

impl ExclusiveGuard<'_> {
    /// Check whether this guard was issued by `lock`.
    pub fn is_for(&self, lock: &ExclusiveLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        // Restore previous value before the mutex is released
        CURRENT_LOCK.with(|c| c.set(self.previous));
    }
}
