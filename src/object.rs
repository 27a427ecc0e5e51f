//! Managed object references with identity semantics.
//!
//! The registry must never confuse two distinct objects that happen to hold
//! equal values, so every lookup goes through [`ObjectKey`], which is derived
//! from the allocation address rather than from the payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Identity key of a managed object.
///
/// The key is the address of the shared allocation. It stays valid for as
/// long as any [`ObjectRef`] to that allocation is alive; the registry keeps
/// the object alive through the [`Handle`](crate::Handle) it stores, so a key
/// cannot be reused while an entry for it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(usize);

impl ObjectKey {
    /// Raw address value (for logging).
    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Reference to an object owned by the managed runtime.
///
/// Cloning an `ObjectRef` yields another reference to the *same* object.
/// Two references created by separate calls to [`ObjectRef::new`] are always
/// distinct objects, even if their payloads compare equal.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    /// Allocate a new managed object holding `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Identity key of this object.
    #[inline]
    pub fn key(&self) -> ObjectKey {
        ObjectKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Check whether two references point at the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.key() == other.key()
    }

    /// Borrow the payload as `T`, if it has that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Number of live references to this object.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.key()).finish()
    }
}

/// Payload of the managed `nil` singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nil;

/// The managed runtime's ubiquitous singleton values.
///
/// These are registered with fixed native ids when the bridge starts, so
/// native code never needs a reverse lookup for them.
#[derive(Debug, Clone)]
pub struct ManagedSingletons {
    pub nil: ObjectRef,
    pub true_: ObjectRef,
    pub false_: ObjectRef,
}

impl ManagedSingletons {
    /// Create a fresh set of singletons.
    ///
    /// Embedders that already own singleton objects should build the struct
    /// directly from those.
    pub fn new() -> Self {
        Self {
            nil: ObjectRef::new(Nil),
            true_: ObjectRef::new(true),
            false_: ObjectRef::new(false),
        }
    }

    /// Look up a singleton by kind.
    pub fn get(&self, kind: crate::SentinelKind) -> &ObjectRef {
        match kind {
            crate::SentinelKind::Nil => &self.nil,
            crate::SentinelKind::True => &self.true_,
            crate::SentinelKind::False => &self.false_,
        }
    }
}

impl Default for ManagedSingletons {
    fn default() -> Self {
        Self::new()
    }
}
