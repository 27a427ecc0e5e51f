//! Handles binding managed objects to native identifiers.

use std::fmt;

use crate::object::ObjectRef;

/// Opaque identifier issued by the native extension.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeId(u64);

impl NativeId {
    /// Wrap a raw identifier.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// An invalid (null) identifier.
    #[inline]
    pub const fn invalid() -> Self {
        Self(0)
    }

    /// Check if this identifier is non-zero.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Raw value, as handed to native code.
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed singleton values registered at bridge startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelKind {
    Nil,
    True,
    False,
}

impl SentinelKind {
    pub const ALL: [SentinelKind; 3] = [SentinelKind::False, SentinelKind::True, SentinelKind::Nil];
}

/// How a handle came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Created on demand when native code first wrapped the object.
    Dynamic,
    /// Registered at startup; never reclaimed.
    Sentinel(SentinelKind),
}

/// Immutable association of one managed object with one native identifier.
///
/// Holding a `Handle` keeps the managed object alive. Handles are shared as
/// `Arc<Handle>`; every caller that resolves the same registry entry gets the
/// same allocation.
pub struct Handle {
    native_id: NativeId,
    owner: ObjectRef,
    kind: HandleKind,
}

impl Handle {
    /// Handle for an object wrapped on demand.
    pub fn new(owner: ObjectRef, native_id: NativeId) -> Self {
        Self {
            native_id,
            owner,
            kind: HandleKind::Dynamic,
        }
    }

    /// Handle for one of the startup singletons.
    pub fn sentinel(owner: ObjectRef, native_id: NativeId, kind: SentinelKind) -> Self {
        Self {
            native_id,
            owner,
            kind: HandleKind::Sentinel(kind),
        }
    }

    #[inline]
    pub fn native_id(&self) -> NativeId {
        self.native_id
    }

    #[inline]
    pub fn owner(&self) -> &ObjectRef {
        &self.owner
    }

    #[inline]
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        matches!(self.kind, HandleKind::Sentinel(_))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("native_id", &self.native_id)
            .field("owner", &self.owner.key())
            .field("kind", &self.kind)
            .finish()
    }
}
