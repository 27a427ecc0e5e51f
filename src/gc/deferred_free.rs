//! Deferred release of native identifiers.
//!
//! ## Problem
//!
//! `free` must never run concurrently with `mark`, `unmark` or a reclamation
//! step. Those only run under the exclusivity lock, but an explicit
//! `free_handle` may come from a thread that does not hold it.
//!
//! ## Solution
//!
//! Queue the identifier, then release every queued identifier the next time
//! the lock is acquired (in `ExclusiveLock::acquire()`), before any other
//! native work.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::handle::NativeId;
use crate::native::NativeOps;

/// Thread-safe queue of native identifiers awaiting `free`.
pub struct DeferredFreeQueue {
    /// Identifiers pending release
    queue: Mutex<VecDeque<NativeId>>,

    /// Fast check for pending items (avoids lock acquisition on hot path)
    pending_count: AtomicU64,
}

impl Default for DeferredFreeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredFreeQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(8)),
            pending_count: AtomicU64::new(0),
        }
    }

    /// Queue `id` for release on the next lock acquisition.
    pub fn defer(&self, id: NativeId) {
        {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.push_back(id);
            // Counted under the queue mutex so a concurrent drain never underflows it
            self.pending_count.fetch_add(1, Ordering::Release);
        }

        tracing::trace!("Deferred native free of {} (pending: {})", id, self.len());
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.pending_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Release every pending identifier, in the order they were queued.
    ///
    /// Must be called with the exclusivity lock held. Identifiers are taken
    /// one at a time, so if a `free` unwinds the rest stay queued for the
    /// next acquisition.
    pub(crate) fn process_all(&self, ops: &dyn NativeOps) -> usize {
        let mut count = 0;

        while self.has_pending() {
            let Some(id) = self.pop() else { break };
            ops.free(id);
            count += 1;
        }

        if count > 0 {
            tracing::trace!("Processed {} deferred native frees", count);
        }
        count
    }

    fn pop(&self) -> Option<NativeId> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let id = queue.pop_front()?;
        self.pending_count.fetch_sub(1, Ordering::Release);
        Some(id)
    }
}

impl std::fmt::Debug for DeferredFreeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredFreeQueue")
            .field("pending_count", &self.len())
            .finish()
    }
}
