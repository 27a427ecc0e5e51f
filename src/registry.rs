//! Identity-keyed registry of bridged objects.
//!
//! Uses DashMap so lookups and insertions from many caller threads proceed
//! without a global lock; the exclusivity lock is never taken here.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::handle::{Handle, NativeId};
use crate::object::{ObjectKey, ObjectRef};

/// Mapping from managed object identity to its [`Handle`].
///
/// At most one handle exists per object. Entries are only removed by a
/// reclamation pass, after the native side reported the object as dead.
#[derive(Default)]
pub struct HandleRegistry {
    handles: DashMap<ObjectKey, Arc<Handle>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the handle for `object`, if it is bridged.
    pub fn lookup(&self, object: &ObjectRef) -> Option<Arc<Handle>> {
        self.handles
            .get(&object.key())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Insert a handle for `object` unless one already exists.
    ///
    /// Returns the handle present in the registry afterwards. When several
    /// callers race on the same object, the first insertion wins and every
    /// caller gets that handle back.
    pub fn add_if_missing(&self, object: &ObjectRef, native_id: NativeId) -> Arc<Handle> {
        match self.handles.entry(object.key()) {
            Entry::Occupied(existing) => {
                tracing::trace!(
                    "Handle already registered for {} ({}), ignoring {}",
                    object.key(),
                    existing.get().native_id(),
                    native_id
                );
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => {
                let handle = Arc::new(Handle::new(object.clone(), native_id));
                slot.insert(Arc::clone(&handle));
                tracing::trace!("Registered handle {} for {}", native_id, object.key());
                handle
            }
        }
    }

    /// Unconditionally bind `object` to `handle`.
    ///
    /// Only used to bootstrap the singleton handles.
    pub fn register(&self, object: &ObjectRef, handle: Arc<Handle>) {
        if let Some(previous) = self.handles.insert(object.key(), handle) {
            tracing::debug!(
                "Replaced handle {} for {}",
                previous.native_id(),
                object.key()
            );
        }
    }

    /// Drop the entry for `object`. Only called from a reclamation pass.
    pub(crate) fn remove(&self, object: &ObjectRef) -> Option<Arc<Handle>> {
        self.handles
            .remove(&object.key())
            .map(|(_, handle)| handle)
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.handles.contains_key(&object.key())
    }

    /// Number of bridged objects, sentinels included.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("len", &self.len())
            .finish()
    }
}
