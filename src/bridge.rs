//! The bridge context: one per managed runtime instance.
//!
//! Owns the registry, the exclusivity lock, the reclamation coordinator and
//! the pressure reaper, and exposes the operations native call sites use.
//! Dropping the bridge stops the reclamation worker.

use std::ops::Deref;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::{LoadError, Result};
use crate::gc::{
    ExclusiveGuard, ExclusiveLock, ExternalMemoryGuard, GcCoordinator, MemoryPressure,
    PressureReaper,
};
use crate::handle::{Handle, NativeId, SentinelKind};
use crate::loader::{LibraryLocator, NativeLoader};
use crate::native::NativeOps;
use crate::object::{ManagedSingletons, ObjectRef};
use crate::registry::HandleRegistry;

/// Native handle bridge for one managed runtime.
pub struct Bridge {
    ops: Arc<dyn NativeOps>,
    registry: Arc<HandleRegistry>,
    lock: Arc<ExclusiveLock>,
    pressure: Arc<MemoryPressure>,
    reaper: PressureReaper,
    coordinator: GcCoordinator,
    singletons: ManagedSingletons,
}

impl Bridge {
    /// Resolve and load the native extension, then start the bridge.
    ///
    /// Fails with [`LoadError`] if no candidate path can be loaded or the
    /// native side fails to initialize. There is no retry.
    pub fn load(
        loader: &dyn NativeLoader,
        singletons: ManagedSingletons,
        config: BridgeConfig,
    ) -> Result<Self> {
        let locator = LibraryLocator::new(&config);
        let ops = locator.load_with(loader)?;
        Self::with_native(ops, singletons, config)
    }

    /// Start the bridge over an already-bound native extension.
    ///
    /// Registers the singleton handles before calling
    /// [`NativeOps::initialize`].
    pub fn with_native(
        ops: Arc<dyn NativeOps>,
        singletons: ManagedSingletons,
        config: BridgeConfig,
    ) -> Result<Self> {
        let registry = Arc::new(HandleRegistry::new());

        for kind in SentinelKind::ALL {
            let object = singletons.get(kind);
            let id = ops.sentinel_id(kind);
            registry.register(object, Arc::new(Handle::sentinel(object.clone(), id, kind)));
            log::debug!("Registered {:?} sentinel as {}", kind, id);
        }

        ops.initialize().map_err(LoadError::Init)?;

        let lock = Arc::new(ExclusiveLock::new(Arc::clone(&ops)));
        let coordinator = GcCoordinator::start(
            Arc::clone(&registry),
            Arc::clone(&lock),
            Arc::clone(&ops),
            &config.worker_thread_name,
        )?;

        let pressure = Arc::new(MemoryPressure::new(config.pressure_soft_limit_bytes));
        let reaper = PressureReaper::new(Arc::clone(&pressure), coordinator.trigger_handle());
        reaper.arm();

        log::info!(
            "Native bridge started (library: {}, pressure soft limit: {} bytes)",
            config.library_name,
            config.pressure_soft_limit_bytes
        );

        Ok(Self {
            ops,
            registry,
            lock,
            pressure,
            reaper,
            coordinator,
            singletons,
        })
    }

    /// Wrap `object` for native use.
    ///
    /// Idempotent per object: a second call returns the existing handle
    /// without creating a native identifier. If another thread registers
    /// the object first, the identifier created here is freed and the
    /// winner's handle is returned.
    pub fn create_handle(&self, object: &ObjectRef) -> Result<Arc<Handle>> {
        if let Some(handle) = self.registry.lookup(object) {
            return Ok(handle);
        }

        let id = self.ops.create(object)?;
        let handle = self.registry.add_if_missing(object, id);

        if handle.native_id() != id {
            log::debug!(
                "Lost handle creation race for {}, releasing {}",
                object.key(),
                id
            );
            self.lock.free(id);
        }

        Ok(handle)
    }

    /// Find the handle for `object`.
    pub fn lookup(&self, object: &ObjectRef) -> Option<Arc<Handle>> {
        self.registry.lookup(object)
    }

    /// Explicitly release a native identifier.
    ///
    /// Does not touch the registry; the entry goes away when the native
    /// side reports the object during a pass. Deferred until the
    /// exclusivity lock is available if another thread holds it.
    pub fn free_handle(&self, id: NativeId) {
        self.lock.free(id);
    }

    /// Mark `id` as reachable during a native traversal.
    pub fn mark_handle(&self, scope: &ExclusiveGuard<'_>, id: NativeId) {
        debug_assert!(scope.is_for(&self.lock), "guard belongs to another bridge");
        self.ops.mark(id);
    }

    /// Clear the reachability mark on `id`.
    pub fn unmark_handle(&self, scope: &ExclusiveGuard<'_>, id: NativeId) {
        debug_assert!(scope.is_for(&self.lock), "guard belongs to another bridge");
        self.ops.unmark(id);
    }

    /// Run a native initializer.
    pub fn call_init(&self, scope: &ExclusiveGuard<'_>, init: NativeId) -> Result<NativeId> {
        debug_assert!(scope.is_for(&self.lock), "guard belongs to another bridge");
        Ok(self.ops.call_init(init)?)
    }

    /// Invoke a native method.
    pub fn call_method(
        &self,
        scope: &ExclusiveGuard<'_>,
        function: NativeId,
        receiver: &ObjectRef,
        args: &[ObjectRef],
    ) -> Result<ObjectRef> {
        debug_assert!(scope.is_for(&self.lock), "guard belongs to another bridge");
        Ok(self.ops.call_method(function, receiver, args)?)
    }

    /// Enter native code: acquire the exclusivity lock.
    ///
    /// Leaving the scope re-arms the pressure reaper.
    ///
    /// The lock is not re-entrant. A native callback into managed code that
    /// calls back into native code must reuse the outer scope rather than
    /// enter again; a nested `enter_native` on the same bridge deadlocks
    /// (and panics in debug builds). Scopes of different bridges may nest.
    pub fn enter_native(&self) -> NativeScope<'_> {
        NativeScope {
            guard: self.lock.acquire(),
            reaper: &self.reaper,
        }
    }

    /// Request a reclamation pass. Never blocks.
    pub fn trigger_gc(&self) {
        self.coordinator.trigger();
    }

    /// Report `bytes` of native memory held on behalf of managed objects.
    pub fn track_external_memory(&self, bytes: i64) -> ExternalMemoryGuard {
        ExternalMemoryGuard::new(Arc::clone(&self.pressure), bytes)
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &GcCoordinator {
        &self.coordinator
    }

    pub fn pressure(&self) -> &Arc<MemoryPressure> {
        &self.pressure
    }

    pub fn reaper(&self) -> &PressureReaper {
        &self.reaper
    }

    pub fn exclusive_lock(&self) -> &ExclusiveLock {
        &self.lock
    }

    pub fn singletons(&self) -> &ManagedSingletons {
        &self.singletons
    }

    /// Stop the reclamation worker. Later triggers are ignored.
    pub fn shutdown(&mut self) {
        self.coordinator.shutdown();
        log::info!("Native bridge shut down");
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("coordinator", &self.coordinator)
            .field("reaper", &self.reaper)
            .finish()
    }
}

/// A period during which the current thread runs native code.
///
/// Holds the exclusivity lock; dereferences to the [`ExclusiveGuard`] that
/// native operations require.
pub struct NativeScope<'a> {
    guard: ExclusiveGuard<'a>,
    reaper: &'a PressureReaper,
}

impl<'a> Deref for NativeScope<'a> {
    type Target = ExclusiveGuard<'a>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl Drop for NativeScope<'_> {
    fn drop(&mut self) {
        if self.reaper.arm() {
            log::debug!("Re-armed pressure sentinel on native exit");
        }
    }
}
