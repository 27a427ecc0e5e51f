//! Interop surface implemented by the loaded native extension.
//!
//! The bridge never talks to foreign code directly. Each platform binding
//! implements [`NativeOps`] and the rest of the crate only sees the trait.

use crate::error::NativeError;
use crate::handle::{NativeId, SentinelKind};
use crate::object::ObjectRef;

/// Operations the bridge consumes from the native extension.
///
/// ## Locking contract
///
/// - `create` may be called from any thread without the exclusivity lock.
/// - `free`, `mark`, `unmark`, `run_reclamation_step` and `poll_reclaimed`
///   are only called while the exclusivity lock is held, so they never run
///   concurrently with each other.
/// - `poll_reclaimed` is only called by the reclamation pass, after
///   `run_reclamation_step` returned `Ok`.
pub trait NativeOps: Send + Sync {
    /// Allocate a native identifier for `object`.
    fn create(&self, object: &ObjectRef) -> Result<NativeId, NativeError>;

    /// Release a native identifier.
    fn free(&self, id: NativeId);

    /// Mark `id` as reachable from native roots.
    fn mark(&self, id: NativeId);

    /// Clear the reachability mark on `id`.
    fn unmark(&self, id: NativeId);

    /// Run the native side's own collection step.
    fn run_reclamation_step(&self) -> Result<(), NativeError>;

    /// Next object the native side no longer references, or `None` when
    /// the sequence is exhausted.
    fn poll_reclaimed(&self) -> Option<ObjectRef>;

    /// Fixed native identifier of a startup singleton.
    fn sentinel_id(&self, kind: SentinelKind) -> NativeId;

    /// Called once after the singleton handles are registered.
    fn initialize(&self) -> Result<(), NativeError> {
        Ok(())
    }

    /// Run a native initializer function.
    fn call_init(&self, init: NativeId) -> Result<NativeId, NativeError>;

    /// Invoke a native method on `receiver`.
    fn call_method(
        &self,
        function: NativeId,
        receiver: &ObjectRef,
        args: &[ObjectRef],
    ) -> Result<ObjectRef, NativeError>;
}
